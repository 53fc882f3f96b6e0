//! The sync driver on its own thread with a current-thread tokio runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use board_sync::{
    EventSink, HttpCanvasApi, SyncConfig, SyncDriver, SyncEvent, SyncHandle, WebSocketChannel,
};
use crossbeam_channel::{Receiver, Sender};
use model::SharedBoard;
use tracing::{error, info};
use url::Url;
use winit::event_loop::EventLoopProxy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Sync events are waiting in the channel.
    SyncReady,
}

/// Queues events and wakes the UI loop once per batch.
struct WakingSink {
    events: Sender<SyncEvent>,
    proxy: EventLoopProxy<AppEvent>,
    wake_pending: Arc<AtomicBool>,
}

impl EventSink for WakingSink {
    fn emit(&mut self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            return;
        }
        if !self.wake_pending.swap(true, Ordering::AcqRel) {
            let _ = self.proxy.send_event(AppEvent::SyncReady);
        }
    }
}

/// UI-side end of the sync thread.
pub struct SyncEvents {
    events: Receiver<SyncEvent>,
    wake_pending: Arc<AtomicBool>,
}

impl SyncEvents {
    /// Takes every queued event. Clears the wake flag first so an event sent
    /// while draining triggers another wakeup.
    pub fn drain(&self) -> Vec<SyncEvent> {
        self.wake_pending.store(false, Ordering::Release);
        self.events.try_iter().collect()
    }
}

pub struct SyncThread {
    handle: SyncHandle,
    thread: Option<JoinHandle<()>>,
}

impl SyncThread {
    pub fn spawn(
        config: SyncConfig,
        api_base: Url,
        socket_url: Url,
        board: SharedBoard,
        proxy: EventLoopProxy<AppEvent>,
    ) -> Result<(Self, SyncEvents)> {
        let api = Arc::new(HttpCanvasApi::new(api_base, &config).context("build http client")?);
        let (channel, notices) = WebSocketChannel::new(socket_url, config.socket_connect_timeout);
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let wake_pending = Arc::new(AtomicBool::new(false));
        let sink = WakingSink {
            events: events_tx,
            proxy,
            wake_pending: Arc::clone(&wake_pending),
        };
        let (driver, handle) = SyncDriver::new(config, board, api, channel, notices, sink);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("build sync runtime")?;
        let thread = std::thread::Builder::new()
            .name("pxboard-sync".to_string())
            .spawn(move || {
                info!("sync thread started");
                runtime.block_on(driver.run());
                info!("sync thread finished");
            })
            .context("spawn sync thread")?;

        Ok((
            Self {
                handle,
                thread: Some(thread),
            },
            SyncEvents {
                events: events_rx,
                wake_pending,
            },
        ))
    }

    pub fn reconnect_now(&self) {
        self.handle.reconnect_now();
    }

    pub fn shutdown(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("sync thread panicked");
        }
    }
}

impl Drop for SyncThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
