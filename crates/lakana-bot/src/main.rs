//! Election sheet runner.
//!
//! Opens the workbook, serves admin commands from stdin and keeps two
//! background jobs going:
//! - flush: writes queued changes to the workbook every `flush_interval_secs`
//! - publish: renders the election sheet to `document_path`
//!
//! Queued changes are flushed once more on Ctrl+C or `quit`.
//!
//! Usage: `lakana-bot [config.json]` (or set `LAKANA_CONFIG`).

mod config;
mod console;
mod publish;
mod sink;
mod workbook;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Datelike;
use lakana_sync::SyncEngine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::time::{Instant, interval, interval_at};
use tracing::{error, info, warn};

use crate::config::BotConfig;
use crate::sink::LogSink;
use crate::workbook::FileWorkbook;

type Engine = SyncEngine<FileWorkbook>;

/// The engine logs its own report.
async fn flush(engine: &Arc<Engine>) {
    let engine = Arc::clone(engine);
    if let Err(e) = tokio::task::spawn_blocking(move || engine.flush()).await {
        error!("Flush task failed: {e}");
    }
}

async fn publish(engine: &Arc<Engine>, path: &Path) {
    let engine = Arc::clone(engine);
    let path = path.to_owned();
    let result = tokio::task::spawn_blocking(move || -> eyre::Result<usize> {
        let sheet = engine.election_sheet()?;
        let markdown = publish::render_markdown(&sheet, chrono::Local::now().year());
        publish::write_document(&path, &markdown)?;
        Ok(sheet.candidate_count())
    })
    .await;

    match result {
        Ok(Ok(candidates)) => info!("Published election sheet ({candidates} candidates)"),
        Ok(Err(e)) => error!("Failed to publish election sheet: {e}"),
        Err(e) => error!("Publish task failed: {e}"),
    }
}

/// Next console line, or `None` once the console is closed. A read error
/// (such as a line that is not UTF-8) closes the console and is logged.
async fn read_line<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    match lines.next_line().await {
        Ok(Some(line)) => Some(line),
        Ok(None) => {
            info!("Console closed, running until interrupted");
            None
        }
        Err(e) => {
            error!("Console read failed, running until interrupted: {e}");
            None
        }
    }
}

/// Run one console line. Returns `false` once the user asked to quit.
async fn run_line(engine: &Arc<Engine>, line: &str) -> bool {
    let command = console::parse_command(line);
    if command == console::Command::Quit {
        return false;
    }

    let engine = Arc::clone(engine);
    let today = chrono::Local::now().date_naive();
    match tokio::task::spawn_blocking(move || console::execute(&engine, command, today)).await {
        Ok(output) => {
            for line in output {
                info!("{line}");
            }
        }
        Err(e) => error!("Command failed: {e}"),
    }
    true
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lakana_bot=info".parse()?)
                .add_directive("lakana_sync=info".parse()?),
        )
        .init();

    let config = BotConfig::load(std::env::args().nth(1).map(PathBuf::from))?;
    let workbook = FileWorkbook::open(&config.workbook_path)?;
    info!("Workbook: {}", workbook.path().display());
    info!("Document: {}", config.document_path.display());

    let engine = Arc::new(SyncEngine::new(workbook, LogSink, config.sync.clone()));

    let flush_every = config.sync.flush_interval();
    let mut flush_timer = interval_at(Instant::now() + flush_every, flush_every);
    let mut publish_timer = interval(config.publish_interval());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Type 'help' for commands");

    loop {
        tokio::select! {
            _ = flush_timer.tick() => flush(&engine).await,
            _ = publish_timer.tick() => publish(&engine, &config.document_path).await,
            line = read_line(&mut lines), if stdin_open => match line {
                Some(line) => {
                    if !run_line(&engine, &line).await {
                        break;
                    }
                }
                None => stdin_open = false,
            },
            _ = &mut shutdown => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!("Shutting down");
    flush(&engine).await;
    publish(&engine, &config.document_path).await;
    if !engine.is_idle() {
        let (inserts, updates, memberships) = engine.queued();
        warn!(
            "Unwritten changes dropped: {inserts} inserts, {updates} updates, {memberships} channel changes"
        );
    }
    Ok(())
}
