use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "PXBOARD_LOG";

const NOISY_TARGETS: [&str; 6] = ["wgpu_core", "wgpu_hal", "naga", "tungstenite", "hyper", "reqwest"];

/// `PXBOARD_LOG` wins outright; otherwise `level` with noisy dependencies
/// capped at `warn`.
pub fn filter_directives(level: LogLevel, env_override: Option<&str>) -> String {
    if let Some(directives) = env_override.map(str::trim).filter(|value| !value.is_empty()) {
        return directives.to_string();
    }
    let mut directives = level.as_str().to_string();
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

pub fn init_tracing(level: LogLevel) -> Result<()> {
    let env_override = std::env::var(LOG_ENV).ok();
    let filter = EnvFilter::try_new(filter_directives(level, env_override.as_deref()))
        .map_err(|error| anyhow!("invalid {LOG_ENV} filter: {error}"))?;
    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow!(error))
}
