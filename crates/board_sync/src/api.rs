use std::time::Duration;

use async_trait::async_trait;
use model::BoardInfo;
use protocol::InfoResponse;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::SyncConfig;
use crate::error::FetchError;

/// HTTP side of the canvas server.
#[async_trait]
pub trait CanvasApi: Send + Sync {
    async fn fetch_info(&self) -> Result<BoardInfo, FetchError>;

    /// Raw snapshot, one palette-index byte per pixel, row-major.
    async fn fetch_snapshot(&self) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpCanvasApi {
    client: Client,
    base: Url,
    info_timeout: Duration,
    snapshot_timeout: Duration,
}

impl HttpCanvasApi {
    pub fn new(base: Url, config: &SyncConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.info_timeout)
            .build()?;
        Ok(Self {
            client,
            base: with_trailing_slash(base),
            info_timeout: config.info_timeout,
            snapshot_timeout: config.snapshot_timeout,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    async fn get_bytes(&self, path: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let url = self.base.join(path)?;
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| classify(error, timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|error| classify(error, timeout))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl CanvasApi for HttpCanvasApi {
    async fn fetch_info(&self) -> Result<BoardInfo, FetchError> {
        let body = self.get_bytes("info", self.info_timeout).await?;
        let response = InfoResponse::decode(&body)?;
        Ok(BoardInfo::try_from(&response)?)
    }

    async fn fetch_snapshot(&self) -> Result<Vec<u8>, FetchError> {
        self.get_bytes("boarddata", self.snapshot_timeout).await
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Http(error)
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_resolve_under_base_path() {
        let api = HttpCanvasApi::new(
            Url::parse("https://canvas.example/api").expect("url"),
            &SyncConfig::default(),
        )
        .expect("client");
        assert_eq!(api.base().as_str(), "https://canvas.example/api/");
        assert_eq!(
            api.base().join("boarddata").expect("join").as_str(),
            "https://canvas.example/api/boarddata"
        );
    }
}
