//! Connection state machine.
//!
//! The machine never performs IO and never fails: every input produces a
//! list of commands for the driver, and every error becomes a state change
//! plus a log line.

use std::time::{Duration, Instant};

use model::{BoardInfo, BoardReplica, PixelDelta, SharedBoard};
use protocol::ServerMessage;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::FetchError;
use crate::events::{ConnectionState, PixelEvent, SyncEvent};

#[derive(Debug)]
pub enum SyncInput {
    /// First connect at application start.
    Start,
    /// User asked for a reconnect; skips the backoff delay.
    ReconnectNow,
    ReconnectTimerFired,
    InfoFetched {
        attempt: u64,
        result: Result<BoardInfo, FetchError>,
    },
    SnapshotFetched {
        attempt: u64,
        result: Result<Vec<u8>, FetchError>,
    },
    ChannelOpened,
    ChannelFailed {
        reason: String,
    },
    ChannelClosed,
    ChannelMessage(ServerMessage),
    WatchdogTick,
    KeepaliveTick,
}

#[derive(Debug, PartialEq)]
pub enum SyncCommand {
    FetchInfo { attempt: u64 },
    FetchSnapshot { attempt: u64 },
    /// Drop any fetch still in flight.
    AbortFetches,
    OpenChannel,
    CloseChannel,
    SendKeepalive,
    ScheduleReconnect { delay: Duration },
    Emit(SyncEvent),
}

pub struct SyncMachine {
    config: SyncConfig,
    board: SharedBoard,
    state: ConnectionState,
    info: Option<BoardInfo>,
    reconnect_scheduled: bool,
    // bumped on every fetch and every teardown; results tagged otherwise are stale
    attempt: u64,
    channel_open: bool,
    buffering: bool,
    buffered: Vec<PixelDelta>,
    last_seen: Option<Instant>,
}

impl SyncMachine {
    pub fn new(config: SyncConfig, board: SharedBoard) -> Self {
        Self {
            config,
            board,
            state: ConnectionState::BeforeFirstConnect,
            info: None,
            reconnect_scheduled: false,
            attempt: 0,
            channel_open: false,
            buffering: false,
            buffered: Vec::new(),
            last_seen: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn info(&self) -> Option<&BoardInfo> {
        self.info.as_ref()
    }

    pub fn reconnect_scheduled(&self) -> bool {
        self.reconnect_scheduled
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    pub fn handle(&mut self, input: SyncInput, now: Instant) -> Vec<SyncCommand> {
        let mut out = Vec::new();
        match input {
            SyncInput::Start => self.reconnect(&mut out),
            SyncInput::ReconnectNow => {
                self.schedule_reconnect(ConnectionState::Reconnecting, Duration::ZERO, &mut out)
            }
            SyncInput::ReconnectTimerFired => {
                self.reconnect_scheduled = false;
                self.reconnect(&mut out);
            }
            SyncInput::InfoFetched { attempt, result } => {
                self.on_info_fetched(attempt, result, &mut out)
            }
            SyncInput::SnapshotFetched { attempt, result } => {
                self.on_snapshot_fetched(attempt, result, now, &mut out)
            }
            SyncInput::ChannelOpened => self.on_channel_opened(&mut out),
            SyncInput::ChannelFailed { reason } => {
                warn!(state = %self.state, %reason, "push channel error");
                self.on_channel_lost(&mut out);
            }
            SyncInput::ChannelClosed => {
                debug!(state = %self.state, "push channel closed");
                self.on_channel_lost(&mut out);
            }
            SyncInput::ChannelMessage(message) => self.on_message(message, now, &mut out),
            SyncInput::WatchdogTick => self.on_watchdog(now, &mut out),
            SyncInput::KeepaliveTick => {
                if self.state == ConnectionState::Running {
                    out.push(SyncCommand::SendKeepalive);
                }
            }
        }
        out
    }

    fn set_state(&mut self, state: ConnectionState, out: &mut Vec<SyncCommand>) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "connection state");
            self.state = state;
            out.push(SyncCommand::Emit(SyncEvent::StateChanged(state)));
        }
    }

    fn reconnect(&mut self, out: &mut Vec<SyncCommand>) {
        if self.reconnect_scheduled {
            return;
        }
        if self.state == ConnectionState::Running {
            self.schedule_reconnect(
                ConnectionState::Reconnecting,
                self.config.reconnect_delay,
                out,
            );
            return;
        }
        if self.state.is_connecting() {
            debug!(state = %self.state, "reconnect requested while connecting, ignoring");
            return;
        }

        self.set_state(ConnectionState::FetchingInfo, out);
        self.attempt += 1;
        out.push(SyncCommand::FetchInfo {
            attempt: self.attempt,
        });
    }

    /// Tears the connection down and arms exactly one retry.
    fn schedule_reconnect(
        &mut self,
        state: ConnectionState,
        delay: Duration,
        out: &mut Vec<SyncCommand>,
    ) {
        if self.reconnect_scheduled {
            return;
        }
        self.reconnect_scheduled = true;
        self.set_state(state, out);
        self.attempt += 1;
        self.channel_open = false;
        self.buffering = false;
        self.buffered.clear();
        out.push(SyncCommand::AbortFetches);
        out.push(SyncCommand::CloseChannel);
        out.push(SyncCommand::ScheduleReconnect { delay });
    }

    fn on_info_fetched(
        &mut self,
        attempt: u64,
        result: Result<BoardInfo, FetchError>,
        out: &mut Vec<SyncCommand>,
    ) {
        if attempt != self.attempt || self.state != ConnectionState::FetchingInfo {
            debug!(attempt, current = self.attempt, "discarding stale info response");
            return;
        }
        let info = match result {
            Ok(info) => info,
            Err(error) => {
                warn!(%error, "fetching canvas info failed");
                self.schedule_reconnect(
                    ConnectionState::FetchInfoError,
                    self.config.reconnect_delay,
                    out,
                );
                return;
            }
        };

        if let Some(previous) = &self.info
            && !previous.same_epoch(&info)
        {
            info!(
                from = %previous.canvas_code,
                to = %info.canvas_code,
                width = info.size.width,
                height = info.size.height,
                "canvas changed, resetting board"
            );
            self.board.reset();
            out.push(SyncCommand::Emit(SyncEvent::BoardReset));
        }
        self.info = Some(info.clone());
        out.push(SyncCommand::Emit(SyncEvent::InfoChanged(info)));

        self.set_state(ConnectionState::ConnectingToSocket, out);
        self.channel_open = false;
        out.push(SyncCommand::OpenChannel);
    }

    fn on_channel_opened(&mut self, out: &mut Vec<SyncCommand>) {
        if self.state != ConnectionState::ConnectingToSocket {
            return;
        }
        self.channel_open = true;
        self.buffering = true;
        self.buffered.clear();
        self.set_state(ConnectionState::FetchingBoardData, out);
        self.attempt += 1;
        out.push(SyncCommand::FetchSnapshot {
            attempt: self.attempt,
        });
    }

    fn on_channel_lost(&mut self, out: &mut Vec<SyncCommand>) {
        self.channel_open = false;
        let next = match self.state {
            ConnectionState::ConnectingToSocket => ConnectionState::SocketConnectionError,
            ConnectionState::FetchingBoardData => ConnectionState::BoardDataFetchError,
            ConnectionState::Running => ConnectionState::Reconnecting,
            _ => return,
        };
        self.schedule_reconnect(next, self.config.reconnect_delay, out);
    }

    fn on_message(&mut self, message: ServerMessage, now: Instant, out: &mut Vec<SyncCommand>) {
        let running = self.state == ConnectionState::Running;
        if running {
            self.last_seen = Some(now);
        }

        match message {
            ServerMessage::Pixel(pixels) => {
                if self.buffering {
                    self.buffered.extend(pixels.deltas());
                } else if running {
                    self.apply_live(pixels.deltas(), out);
                }
            }
            ServerMessage::Ping => {}
            ServerMessage::Other { kind, body } => {
                out.push(SyncCommand::Emit(SyncEvent::Message { kind, body }));
            }
        }
    }

    fn apply_live(&self, deltas: impl Iterator<Item = PixelDelta>, out: &mut Vec<SyncCommand>) {
        let Some(info) = &self.info else {
            return;
        };
        let deltas: Vec<PixelDelta> = deltas.collect();
        self.board
            .apply_deltas(&deltas, &info.palette, |delta, packed_color| {
                out.push(SyncCommand::Emit(SyncEvent::Pixel(PixelEvent {
                    x: delta.x as u32,
                    y: delta.y as u32,
                    color_index: delta.color_index,
                    packed_color,
                })));
            });
    }

    fn on_snapshot_fetched(
        &mut self,
        attempt: u64,
        result: Result<Vec<u8>, FetchError>,
        now: Instant,
        out: &mut Vec<SyncCommand>,
    ) {
        if attempt != self.attempt || self.state != ConnectionState::FetchingBoardData {
            debug!(attempt, current = self.attempt, "discarding stale snapshot");
            return;
        }
        self.buffering = false;
        let buffered = std::mem::take(&mut self.buffered);

        let raw = match result {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "fetching board data failed");
                self.schedule_reconnect(
                    ConnectionState::BoardDataFetchError,
                    self.config.reconnect_delay,
                    out,
                );
                return;
            }
        };
        if !self.channel_open {
            debug!("push channel dropped during board data fetch");
            self.schedule_reconnect(
                ConnectionState::BoardDataFetchError,
                self.config.reconnect_delay,
                out,
            );
            return;
        }
        let Some(info) = self.info.clone() else {
            self.schedule_reconnect(
                ConnectionState::BoardDataFetchError,
                self.config.reconnect_delay,
                out,
            );
            return;
        };

        let replica = match BoardReplica::from_snapshot(info.size, &raw, &info.palette, &buffered) {
            Ok(replica) => replica,
            Err(error) => {
                warn!(%error, "board data rejected");
                self.schedule_reconnect(
                    ConnectionState::BoardDataFetchError,
                    self.config.reconnect_delay,
                    out,
                );
                return;
            }
        };

        let surface_id = self.board.install(replica);
        info!(
            canvas = %info.canvas_code,
            width = info.size.width,
            height = info.size.height,
            replayed = buffered.len(),
            "board loaded"
        );
        out.push(SyncCommand::Emit(SyncEvent::BoardInit { info, surface_id }));
        self.last_seen = Some(now);
        self.set_state(ConnectionState::Running, out);
    }

    fn on_watchdog(&mut self, now: Instant, out: &mut Vec<SyncCommand>) {
        if self.state != ConnectionState::Running {
            return;
        }
        let Some(last_seen) = self.last_seen else {
            return;
        };
        let silence = now.saturating_duration_since(last_seen);
        if silence > self.config.message_timeout {
            debug!(?silence, "message timeout, reconnecting");
            self.schedule_reconnect(
                ConnectionState::Reconnecting,
                self.config.reconnect_delay,
                out,
            );
        }
    }
}
