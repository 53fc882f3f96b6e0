use std::time::Duration;

use protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid response: {0}")]
    Decode(#[from] ProtocolError),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("push channel is not open")]
    NotOpen,
    #[error("encode error: {0}")]
    Encode(#[from] ProtocolError),
}
