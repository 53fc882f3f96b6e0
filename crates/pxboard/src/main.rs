mod app;
mod cli;
mod logging;
mod persistence;
mod sync_thread;

use anyhow::{Context, Result};
use board_sync::SyncConfig;
use clap::Parser;
use model::SharedBoard;
use tracing::info;
use winit::event_loop::EventLoop;

use crate::app::App;
use crate::cli::Cli;
use crate::persistence::StateStore;
use crate::sync_thread::{AppEvent, SyncThread};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_level)?;
    info!(api = %cli.api_base, socket = %cli.socket_url, "starting");

    let event_loop = EventLoop::<AppEvent>::with_user_event()
        .build()
        .context("create event loop")?;

    let board = SharedBoard::new();
    let store = StateStore::open(cli.state_file);
    let (sync, events) = SyncThread::spawn(
        SyncConfig::default(),
        cli.api_base,
        cli.socket_url,
        board.clone(),
        event_loop.create_proxy(),
    )?;

    let mut app = App::new(board, sync, events, store);
    event_loop.run_app(&mut app).context("run event loop")?;
    Ok(())
}
