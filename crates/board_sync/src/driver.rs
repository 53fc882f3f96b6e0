use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use model::{BoardInfo, SharedBoard};
use protocol::ClientMessage;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, Sleep, interval_at, sleep};
use tracing::{debug, info, trace, warn};

use crate::api::CanvasApi;
use crate::channel::{ChannelNotice, NoticeReceiver, PushChannel};
use crate::config::SyncConfig;
use crate::error::FetchError;
use crate::events::SyncEvent;
use crate::machine::{SyncCommand, SyncInput, SyncMachine};

/// Receiver of everything the sync core publishes.
pub trait EventSink: Send {
    fn emit(&mut self, event: SyncEvent);
}

impl EventSink for crossbeam_channel::Sender<SyncEvent> {
    fn emit(&mut self, event: SyncEvent) {
        let _ = self.send(event);
    }
}

impl EventSink for mpsc::UnboundedSender<SyncEvent> {
    fn emit(&mut self, event: SyncEvent) {
        let _ = self.send(event);
    }
}

#[derive(Debug)]
enum Control {
    ReconnectNow,
    Shutdown,
}

/// Thread-safe handle for poking a running driver.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    control: mpsc::UnboundedSender<Control>,
}

impl SyncHandle {
    pub fn reconnect_now(&self) {
        let _ = self.control.send(Control::ReconnectNow);
    }

    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

type Fetch<T> = Pin<Box<dyn Future<Output = (u64, Result<T, FetchError>)> + Send>>;

/// Runs a [`SyncMachine`] against real (or fake) IO.
///
/// Meant for a current-thread runtime: the machine, the fetches and the
/// channel notices are all interleaved on one task.
pub struct SyncDriver<A, C, S> {
    machine: SyncMachine,
    api: Arc<A>,
    channel: C,
    notices: NoticeReceiver,
    sink: S,
    control: mpsc::UnboundedReceiver<Control>,
    generation: Option<u64>,
    info_fetch: Option<Fetch<BoardInfo>>,
    snapshot_fetch: Option<Fetch<Vec<u8>>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl<A, C, S> SyncDriver<A, C, S>
where
    A: CanvasApi + 'static,
    C: PushChannel,
    S: EventSink,
{
    pub fn new(
        config: SyncConfig,
        board: SharedBoard,
        api: Arc<A>,
        channel: C,
        notices: NoticeReceiver,
        sink: S,
    ) -> (Self, SyncHandle) {
        let (control_tx, control) = mpsc::unbounded_channel();
        let driver = Self {
            machine: SyncMachine::new(config, board),
            api,
            channel,
            notices,
            sink,
            control,
            generation: None,
            info_fetch: None,
            snapshot_fetch: None,
            reconnect_timer: None,
        };
        (driver, SyncHandle { control: control_tx })
    }

    pub fn machine(&self) -> &SyncMachine {
        &self.machine
    }

    /// Runs until [`SyncHandle::shutdown`] is called or every handle is dropped.
    pub async fn run(mut self) {
        let config = *self.machine.config();
        let start = Instant::now();
        let mut watchdog = interval_at(start + config.watchdog_interval, config.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut keepalive =
            interval_at(start + config.keepalive_interval, config.keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("sync driver started");
        self.apply(SyncInput::Start);

        loop {
            tokio::select! {
                control = self.control.recv() => match control {
                    Some(Control::ReconnectNow) => self.apply(SyncInput::ReconnectNow),
                    Some(Control::Shutdown) | None => break,
                },
                Some(tagged) = self.notices.recv() => {
                    if Some(tagged.generation) != self.generation {
                        trace!(generation = tagged.generation, "dropping notice from replaced channel");
                        continue;
                    }
                    let input = match tagged.notice {
                        ChannelNotice::Opened => SyncInput::ChannelOpened,
                        ChannelNotice::Failed(reason) => SyncInput::ChannelFailed { reason },
                        ChannelNotice::Closed => SyncInput::ChannelClosed,
                        ChannelNotice::Message(message) => SyncInput::ChannelMessage(message),
                    };
                    self.apply(input);
                }
                (attempt, result) = poll_slot(&mut self.info_fetch) => {
                    self.info_fetch = None;
                    self.apply(SyncInput::InfoFetched { attempt, result });
                }
                (attempt, result) = poll_slot(&mut self.snapshot_fetch) => {
                    self.snapshot_fetch = None;
                    self.apply(SyncInput::SnapshotFetched { attempt, result });
                }
                _ = poll_slot(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.apply(SyncInput::ReconnectTimerFired);
                }
                _ = watchdog.tick() => self.apply(SyncInput::WatchdogTick),
                _ = keepalive.tick() => self.apply(SyncInput::KeepaliveTick),
            }
        }

        self.channel.close();
        info!("sync driver stopped");
    }

    fn apply(&mut self, input: SyncInput) {
        let now = Instant::now().into_std();
        for command in self.machine.handle(input, now) {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::FetchInfo { attempt } => {
                let api = Arc::clone(&self.api);
                self.info_fetch = Some(Box::pin(async move { (attempt, api.fetch_info().await) }));
            }
            SyncCommand::FetchSnapshot { attempt } => {
                let api = Arc::clone(&self.api);
                self.snapshot_fetch =
                    Some(Box::pin(async move { (attempt, api.fetch_snapshot().await) }));
            }
            SyncCommand::AbortFetches => {
                self.info_fetch = None;
                self.snapshot_fetch = None;
            }
            SyncCommand::OpenChannel => {
                let generation = self.channel.open();
                debug!(generation, "opening push channel");
                self.generation = Some(generation);
            }
            SyncCommand::CloseChannel => {
                self.channel.close();
                self.generation = None;
            }
            SyncCommand::SendKeepalive => {
                if let Err(error) = self.channel.send(ClientMessage::Ping) {
                    warn!(%error, "keepalive not sent");
                }
            }
            SyncCommand::ScheduleReconnect { delay } => {
                debug!(?delay, "reconnect scheduled");
                self.reconnect_timer = Some(Box::pin(sleep(delay)));
            }
            SyncCommand::Emit(event) => self.sink.emit(event),
        }
    }
}

/// Awaits the future in `slot`, or never resolves when the slot is empty.
async fn poll_slot<F>(slot: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match slot {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}
