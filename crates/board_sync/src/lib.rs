//! Keeps a local board replica in step with the canvas server.
//!
//! [`SyncMachine`] owns every connection decision and performs no IO;
//! [`SyncDriver`] runs it on a tokio current-thread runtime, executing the
//! commands it returns against a [`CanvasApi`] and a [`PushChannel`].

mod api;
mod channel;
mod config;
mod driver;
mod error;
mod events;
mod machine;

pub use api::{CanvasApi, HttpCanvasApi};
pub use channel::{ChannelNotice, NoticeReceiver, PushChannel, TaggedNotice, WebSocketChannel};
pub use config::SyncConfig;
pub use driver::{EventSink, SyncDriver, SyncHandle};
pub use error::{ChannelError, FetchError};
pub use events::{ConnectionState, PixelEvent, SyncEvent};
pub use machine::{SyncCommand, SyncInput, SyncMachine};
