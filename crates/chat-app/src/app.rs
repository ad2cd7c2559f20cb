use std::sync::Arc;

use chatbox_reply::{RandomSource, ReplyCatalog, SeededRandom, ThreadRandom};
use chatbox_storage::SqliteStorage;
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::time::Instant;

use crate::chat::ConversationController;
use crate::clipboard::SystemClipboard;
use crate::error::{
    AppResult, LoadCatalogSnafu, OpenStorageSnafu, ReadInputSnafu, WriteOutputSnafu,
};
use crate::settings::{ChatSettings, SettingsStore};
use crate::terminal::{Command, CommandOutcome, TerminalSurface};

/// Runs the terminal client until `/quit` or end of input.
///
/// The controller's virtual clock tracks wall time since startup: each loop
/// turn waits for either the next input line or the earliest timer deadline.
pub async fn run(settings_store: SettingsStore) -> AppResult<()> {
    if let Err(error) = settings_store.ensure_persisted() {
        tracing::warn!(
            "could not write default settings to {:?}: {error}",
            settings_store.config_path()
        );
    }
    let settings = settings_store.settings();

    let catalog = Arc::new(load_catalog(&settings)?);
    let storage = SqliteStorage::open(&settings.storage_path.to_string_lossy())
        .await
        .context(OpenStorageSnafu {
            stage: "open-sqlite-storage",
            path: settings.storage_path.clone(),
        })?;
    let random: Box<dyn RandomSource> = match settings.random_seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(ThreadRandom),
    };

    let mut controller = ConversationController::new(
        Arc::new(storage),
        catalog,
        random,
        settings.controller_options(),
    );
    let mut surface = TerminalSurface::new();
    let mut clipboard = SystemClipboard;
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let started = Instant::now();

    write_output(&mut stdout, &surface.render(&controller)).await?;

    loop {
        let deadline = controller.next_deadline().map(|due| started + due);
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context(ReadInputSnafu { stage: "read-stdin-line" })? else {
                    tracing::info!("input closed");
                    break;
                };
                controller.advance_to(started.elapsed());

                let mut out = String::new();
                let outcome = match Command::parse(&line) {
                    Ok(command) => surface.execute(command, &mut controller, &mut clipboard, &mut out),
                    Err(error) => {
                        out.push_str(&format!("{error}\n"));
                        CommandOutcome::Continue
                    }
                };

                match outcome {
                    CommandOutcome::Quit => {
                        write_output(&mut stdout, &out).await?;
                        break;
                    }
                    CommandOutcome::Reload => {
                        let settings = settings_store.reload();
                        controller.set_timing(settings.timing());
                        out.push_str("settings reloaded\n");
                    }
                    CommandOutcome::Continue => {}
                }

                out.push_str(&surface.render(&controller));
                write_output(&mut stdout, &out).await?;
            }
            _ = sleep_until_deadline(deadline) => {
                controller.advance_to(started.elapsed());
                write_output(&mut stdout, &surface.render(&controller)).await?;
            }
        }
    }

    Ok(())
}

fn load_catalog(settings: &ChatSettings) -> AppResult<ReplyCatalog> {
    let catalog = match &settings.catalog_path {
        Some(path) => ReplyCatalog::from_path(path),
        None => ReplyCatalog::builtin(),
    };
    catalog.context(LoadCatalogSnafu {
        stage: "load-reply-catalog",
    })
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn write_output(stdout: &mut Stdout, text: &str) -> AppResult<()> {
    if text.is_empty() {
        return Ok(());
    }
    stdout
        .write_all(text.as_bytes())
        .await
        .context(WriteOutputSnafu {
            stage: "write-stdout",
        })?;
    stdout.flush().await.context(WriteOutputSnafu {
        stage: "flush-stdout",
    })
}
