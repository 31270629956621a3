mod config;
mod output;

use std::sync::Arc;

use anyhow::Result;
use config::Config;
use log::{error, info};
use nowplaying::{Metadata, MetadataCache, NowPlaying, Ticker};
use output::{print_status, render};
use tokio::{signal, time};

/// Prints the cached status every `config.delay`, forever.
async fn print_loop(config: &Config, cache: Option<Arc<MetadataCache>>) {
    let mut interval = time::interval(config.delay);
    let mut last_output = String::new();
    loop {
        interval.tick().await;
        let (meta, ticker) = match &cache {
            Some(cache) => cache.snapshot_with_ticker(),
            None => (Metadata::default(), Ticker::new()),
        };
        if let Err(e) = print_status(&render(config, &meta, &ticker), &mut last_output) {
            error!("Failed to serialize status: {e}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    let verbosity = config.verbosity.log_level().unwrap_or(log::Level::Error);
    simple_logger::init_with_level(verbosity)?;

    // Without a bus connection we keep printing an empty status.
    let listener = match NowPlaying::connect(&config.player) {
        Ok(listener) => Some(listener),
        Err(e) => {
            error!("MPRIS metadata unavailable: {e}");
            None
        }
    };
    let cache = listener.as_ref().map(NowPlaying::cache);

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = print_loop(&config, cache) => {},
        () = ctrl_c => info!("Interruption signal received"),
        () = terminate => info!("Terminate signal received"),
    }

    if let Some(mut listener) = listener {
        tokio::task::spawn_blocking(move || listener.stop()).await?;
    }
    Ok(())
}
