use std::time::Duration;

/// Timing knobs for the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Backoff before any retry.
    pub reconnect_delay: Duration,
    /// Silence on a running channel longer than this forces a reconnect.
    /// Slightly above the server's own keepalive period.
    pub message_timeout: Duration,
    pub watchdog_interval: Duration,
    pub keepalive_interval: Duration,
    pub info_timeout: Duration,
    pub snapshot_timeout: Duration,
    /// Upper bound on the websocket handshake.
    pub socket_connect_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(5000),
            message_timeout: Duration::from_millis(65000),
            watchdog_interval: Duration::from_millis(1000),
            keepalive_interval: Duration::from_millis(15000),
            info_timeout: Duration::from_secs(10),
            snapshot_timeout: Duration::from_secs(20),
            socket_connect_timeout: Duration::from_secs(10),
        }
    }
}
