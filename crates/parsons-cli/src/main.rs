use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parsons_cli::config::{Cli, Command};
use parsons_cli::inspect;
use parsons_core::SessionIdentity;
use parsons_logging::{ParsonsSubscriberBuilder, SessionContextGuard, session_span};
use parsons_session::LoggerConfig;
use parsons_storage::{LocalStore, RedbLocalStore, RedbLocalStoreConfig};
use tracing::Instrument;

fn open_store(db: &Path) -> anyhow::Result<RedbLocalStore> {
    RedbLocalStore::open(RedbLocalStoreConfig {
        db_path: db.to_path_buf(),
    })
    .with_context(|| format!("Failed to open local store at {}", db.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LoggerConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(LoggerConfig::from_toml_str(&text)?)
        }
        None => Ok(LoggerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = ParsonsSubscriberBuilder::new()
        .with_config(cli.log_config())
        .init();

    let config = load_config(cli.config.as_deref())?;
    let keys = &config.keys;

    match cli.command {
        Command::Show { db } => {
            let store = open_store(&db)?;
            println!("{}", inspect::summarize(&store, keys)?);
        }

        Command::Dump { db } => {
            let store = open_store(&db)?;
            for line in inspect::recovery_lines(&store, keys)? {
                println!("{}", line);
            }
        }

        Command::Clear { db, keep_session } => {
            let store = open_store(&db)?;
            let removed = inspect::clear(&store, keys, keep_session)?;
            if removed.is_empty() {
                println!("Nothing to clear");
            } else {
                println!("Removed {}", removed.join(", "));
            }
        }

        Command::Replay {
            db,
            user,
            problem,
            events,
        } => {
            let input = std::fs::read_to_string(&events)
                .with_context(|| format!("Failed to read {}", events.display()))?;
            let records = inspect::parse_events(&input)?;

            let identity = SessionIdentity::derive(&user, &problem);
            let _context = SessionContextGuard::new(&identity);

            let store: Arc<dyn LocalStore> = Arc::new(open_store(&db)?);
            let document = inspect::replay(store, config.clone(), &user, &problem, records)
                .instrument(session_span())
                .await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }

    Ok(())
}
