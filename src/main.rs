mod batch;
mod board;
mod command;
mod config;
mod error_log;
mod feed;
mod flash;
mod generator;
mod logging;
mod pin;
mod row;
mod snapshot;
mod store;
mod tui;

use anyhow::anyhow;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task;

use crate::command::Command;
use crate::error_log::ErrorLogStore;
use crate::tui::TuiApp;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let param = config::CliParams::parse();
    logging::init_tracing(&param.log_file)?;

    let feed_config = param.feed_config();
    let source = param.snapshot_source();
    tracing::info!(source = %source.describe(), mode = ?feed_config.mode, "starting price board");

    let (tx, mut rx) = mpsc::channel::<Command>(4);
    let load_source = source.clone();
    task::spawn(async move {
        let command = match snapshot::load(&load_source).await {
            Ok(rows) => Command::SnapshotLoaded(rows),
            Err(err) => {
                tracing::error!(error = %err, source = %load_source.describe(), "snapshot load failed");
                Command::LoadFailed(err.to_string())
            }
        };
        let _ = tx.send(command).await;
    });

    let mut app = TuiApp::new(
        feed_config,
        ErrorLogStore::new(param.error_log.clone()),
        &source.describe(),
    );
    let app_result = tokio::select! {
        result = app.run(&mut rx) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };
    app.dispose();
    tracing::info!("price board closed");
    app_result.map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}
