//! Push channel abstraction and its websocket implementation.
//!
//! Every `open` starts a new generation. Notices carry the generation they
//! belong to so the driver can drop leftovers from a connection it already
//! replaced.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::error::ChannelError;

#[derive(Debug)]
pub enum ChannelNotice {
    Opened,
    Failed(String),
    Closed,
    Message(ServerMessage),
}

#[derive(Debug)]
pub struct TaggedNotice {
    pub generation: u64,
    pub notice: ChannelNotice,
}

pub type NoticeReceiver = mpsc::UnboundedReceiver<TaggedNotice>;

pub trait PushChannel: Send {
    /// Closes any current connection and starts a new one.
    fn open(&mut self) -> u64;

    /// Closes the current connection without emitting further notices.
    fn close(&mut self);

    fn send(&mut self, message: ClientMessage) -> Result<(), ChannelError>;
}

struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

pub struct WebSocketChannel {
    url: Url,
    connect_timeout: Duration,
    notices: mpsc::UnboundedSender<TaggedNotice>,
    generation: u64,
    connection: Option<Connection>,
}

impl WebSocketChannel {
    pub fn new(url: Url, connect_timeout: Duration) -> (Self, NoticeReceiver) {
        let (notices, receiver) = mpsc::unbounded_channel();
        (
            Self {
                url,
                connect_timeout,
                notices,
                generation: 0,
                connection: None,
            },
            receiver,
        )
    }
}

impl PushChannel for WebSocketChannel {
    fn open(&mut self) -> u64 {
        self.close();
        self.generation += 1;
        let generation = self.generation;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(
            self.url.clone(),
            self.connect_timeout,
            generation,
            outbound_rx,
            self.notices.clone(),
        ));
        self.connection = Some(Connection { outbound, task });
        generation
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!(generation = self.generation, "closing push channel");
            connection.task.abort();
        }
    }

    fn send(&mut self, message: ClientMessage) -> Result<(), ChannelError> {
        let connection = self.connection.as_ref().ok_or(ChannelError::NotOpen)?;
        let text = message.encode()?;
        connection
            .outbound
            .send(text)
            .map_err(|_| ChannelError::NotOpen)
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_socket(
    url: Url,
    connect_timeout: Duration,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<String>,
    notices: mpsc::UnboundedSender<TaggedNotice>,
) {
    let notify = |notice| {
        let _ = notices.send(TaggedNotice { generation, notice });
    };

    let stream = match timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(error)) => {
            notify(ChannelNotice::Failed(error.to_string()));
            return;
        }
        Err(_) => {
            notify(ChannelNotice::Failed(format!(
                "handshake timed out after {connect_timeout:?}"
            )));
            return;
        }
    };
    debug!(generation, %url, "push channel open");
    notify(ChannelNotice::Opened);

    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(text) => {
                    if let Err(error) = sink.send(Message::Text(text)).await {
                        notify(ChannelNotice::Failed(error.to_string()));
                        return;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => match ServerMessage::decode(&text) {
                    Ok(message) => notify(ChannelNotice::Message(message)),
                    Err(error) => warn!(%error, "dropping malformed push message"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    notify(ChannelNotice::Closed);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    notify(ChannelNotice::Failed(error.to_string()));
                    return;
                }
            },
        }
    }
}
