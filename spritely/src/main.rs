#![warn(clippy::pedantic)]

pub mod config;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use spritely_core::backup::BackupSession;
use spritely_core::document::access::DocDestroyer;
use spritely_core::Context;

use anyhow::Result as AnyResult;

/// Runs a backup pass every `period` until told to stop, then one final pass.
fn backup_worker(
    context: Arc<Context>,
    period: Duration,
    stop: crossbeam::channel::Receiver<()>,
) -> BackupSession {
    let session = BackupSession::new();
    log::debug!("Backup session {} started", session.id());
    loop {
        match stop.recv_timeout(period) {
            Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                session.backup_documents(&context);
            }
            // Asked to stop, or the app is gone.
            Ok(()) | Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    session.backup_documents(&context);
    session
}

fn main() -> AnyResult<()> {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        let _ = simple_logging::log_to_file("log.out", log::LevelFilter::Debug);
    }

    let config = config::Config::get();
    log::debug!("{config:?}");
    // Open documents, shared with the backup worker.
    let context = Arc::new(Context::new());

    let (stop, stop_listener) = crossbeam::channel::bounded(1);
    let backup = match config.backup_period() {
        Some(period) => {
            let context = context.clone();
            Some(
                std::thread::Builder::new()
                    .name("Backup worker".to_owned())
                    .spawn(move || backup_worker(context, period, stop_listener))?,
            )
        }
        None => {
            log::info!("Backups are disabled");
            None
        }
    };

    let result = session::run(&context, config);
    if let Err(e) = &result {
        log::error!("Session failed:\n{e:?}");
    }

    // Stop backing up before closing documents, so the final pass still sees them.
    let _ = stop.send(());
    if let Some(backup) = backup {
        match backup.join() {
            Ok(session) => {
                log::info!(
                    "Backup session {} holds {} snapshots",
                    session.id(),
                    session.store().len()
                );
            }
            Err(_) => log::error!("Backup worker panicked"),
        }
    }

    for doc in context.documents() {
        match DocDestroyer::new(&context, &doc, config.lock_timeout()) {
            Ok(destroyer) => {
                log::debug!("Closing {:?}", destroyer.name());
                destroyer.destroy_document();
            }
            Err(e) => log::warn!("Failed to close {}: {e}", doc.id()),
        }
    }

    result.map(|_| ())
}
