mod app;
mod config;
mod delay;
mod destination;
mod destinations;
mod i18n;
mod logging;
mod model;
mod net;
mod normalize;
mod prediction;
mod request;
mod runtime;
mod schedule;
mod storage;
mod ui;

use anyhow::Result;
use std::sync::mpsc;
use std::time::Duration;

use app::App;
use config::parse_args;
use logging::init as init_logging;
use net::spawn_fetcher;
use runtime::{init_terminal, restore_terminal, run_app};
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let config = parse_args()?;
    let _log_guard = init_logging(&config);
    info!("commute-board starting");
    debug!("config path: {}", config.config_path.display());
    if config.api_key.trim().is_empty() {
        warn!("no api_key configured; requests will be rejected");
    }

    let (batch_tx, batch_rx) = mpsc::channel();
    let (tx, rx) = mpsc::channel();
    spawn_fetcher(
        Duration::from_secs(config.request_timeout_secs.max(1)),
        config.insecure,
        tx,
        batch_rx,
    );

    let app = App::new(&config);
    let mut terminal = init_terminal()?;
    let res = run_app(&mut terminal, app, batch_tx, rx);
    restore_terminal(&mut terminal)?;

    if let Err(err) = res {
        warn!("runtime error: {err}");
        eprintln!("{err}");
    }

    info!("commute-board exited");
    Ok(())
}
