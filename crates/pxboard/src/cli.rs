use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "pxboard", about = "Live view of a collaborative pixel canvas")]
pub struct Cli {
    /// Base URL of the canvas HTTP API (`info` and `boarddata` live under it).
    #[arg(long, value_name = "URL", default_value = "http://localhost:4567/")]
    pub api_base: Url,

    /// Push channel websocket URL.
    #[arg(long, value_name = "URL", default_value = "ws://localhost:4567/ws")]
    pub socket_url: Url,

    /// JSON file for pan/scale and layer options between runs.
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Log level; `PXBOARD_LOG` overrides with a full filter directive.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
