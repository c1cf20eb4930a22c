use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parsons_core::SessionIdentity;
use parsons_logging::{LogConfig, LogProfile, SessionLogFile};

#[derive(Parser)]
#[command(name = "parsons-log", about = "Inspect and replay Parsons session logs")]
pub struct Cli {
    /// How much session logger activity to report on stderr (quiet, session, keystrokes)
    #[arg(long, global = true, default_value_t = LogProfile::Quiet)]
    pub log_profile: LogProfile,

    /// Raw tracing filter directives, replacing the profile's
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    /// Also write JSONL logs here; replays get one file per session
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// TOML file with logger settings (flush timeout, collection, key names)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the session state held in a local store
    Show {
        /// Path to the redb local store
        db: PathBuf,
    },
    /// Print the recovery buffer, one JSON record per line
    Dump {
        /// Path to the redb local store
        db: PathBuf,
    },
    /// Delete the recovery buffer and document id
    Clear {
        /// Path to the redb local store
        db: PathBuf,
        /// Keep the session hash, so the next load still counts as the same session
        #[arg(long)]
        keep_session: bool,
    },
    /// Log JSON records through a session and print the committed document
    Replay {
        /// Path to the redb local store
        db: PathBuf,
        /// User label
        user: String,
        /// Problem label
        problem: String,
        /// File with one JSON record per line
        events: PathBuf,
    },
}

impl Cli {
    /// Subscriber settings for this invocation
    pub fn log_config(&self) -> LogConfig {
        let session_file = self.log_dir.as_ref().map(|dir| match &self.command {
            Command::Replay { user, problem, .. } => {
                SessionLogFile::for_session(dir, &SessionIdentity::derive(user, problem))
            }
            _ => SessionLogFile::shared(dir),
        });

        LogConfig {
            profile: self.log_profile,
            filter: self.log_filter.clone(),
            session_file,
            ..LogConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parsons_logging::{DEFAULT_SESSION_LOG_PREFIX, FileRotation};

    #[test]
    fn test_defaults_to_quiet_without_files() {
        let cli = Cli::parse_from(["parsons-log", "show", "local.redb"]);
        let config = cli.log_config();
        assert_eq!(config.profile, LogProfile::Quiet);
        assert_eq!(config.directives(), "warn");
        assert!(config.session_file.is_none());
    }

    #[test]
    fn test_replay_logs_to_a_file_per_session() {
        let cli = Cli::parse_from([
            "parsons-log",
            "replay",
            "local.redb",
            "alice",
            "P1",
            "events.jsonl",
            "--log-profile",
            "session",
            "--log-dir",
            "out",
        ]);
        let config = cli.log_config();
        assert_eq!(config.profile, LogProfile::Session);

        let file = config.session_file.unwrap();
        let identity = SessionIdentity::derive("alice", "P1");
        assert_eq!(file.prefix, format!("session-{}", identity.session_hash));
        assert_eq!(file.rotation, FileRotation::Never);
    }

    #[test]
    fn test_inspection_commands_share_a_daily_file() {
        let cli = Cli::parse_from(["parsons-log", "--log-dir", "out", "dump", "local.redb"]);
        let file = cli.log_config().session_file.unwrap();
        assert_eq!(file.prefix, DEFAULT_SESSION_LOG_PREFIX);
        assert_eq!(file.rotation, FileRotation::Daily);
    }

    #[test]
    fn test_rejects_unknown_profile() {
        assert!(Cli::try_parse_from(["parsons-log", "--log-profile", "loud", "show", "x"]).is_err());
    }
}
