use std::fmt;

use model::{BoardInfo, SurfaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    BeforeFirstConnect,
    FetchingInfo,
    FetchInfoError,
    ConnectingToSocket,
    SocketConnectionError,
    FetchingBoardData,
    BoardDataFetchError,
    Running,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::BeforeFirstConnect => "beforeFirstConnect",
            ConnectionState::FetchingInfo => "fetchingInfo",
            ConnectionState::FetchInfoError => "fetchInfoError",
            ConnectionState::ConnectingToSocket => "connectingToSocket",
            ConnectionState::SocketConnectionError => "socketConnectionError",
            ConnectionState::FetchingBoardData => "fetchingBoardData",
            ConnectionState::BoardDataFetchError => "boardDataFetchError",
            ConnectionState::Running => "running",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    /// A connect attempt is in flight.
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            ConnectionState::FetchingInfo
                | ConnectionState::ConnectingToSocket
                | ConnectionState::FetchingBoardData
        )
    }

    /// The last connect attempt failed and a retry is scheduled.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ConnectionState::FetchInfoError
                | ConnectionState::SocketConnectionError
                | ConnectionState::BoardDataFetchError
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live delta that changed the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelEvent {
    pub x: u32,
    pub y: u32,
    pub color_index: u32,
    pub packed_color: u32,
}

/// Notifications for everything downstream of the sync core.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    StateChanged(ConnectionState),
    /// The canvas epoch ended. Epoch-scoped state must be dropped before the
    /// following `InfoChanged`.
    BoardReset,
    InfoChanged(BoardInfo),
    /// A replica for `info` was installed in the shared board.
    BoardInit {
        info: BoardInfo,
        surface_id: SurfaceId,
    },
    Pixel(PixelEvent),
    /// Non-pixel channel message, forwarded untouched.
    Message {
        kind: String,
        body: serde_json::Value,
    },
}
