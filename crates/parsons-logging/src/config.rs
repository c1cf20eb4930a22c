//! Subscriber settings for the session logger tools
//!
//! The inspection commands print their results on stdout, so diagnostics go
//! to stderr and stay at `warn` unless a louder [`LogProfile`] is chosen.
//! Replays can additionally write one JSONL file per session.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parsons_core::SessionIdentity;
use serde::{Deserialize, Serialize};

/// File name prefix for session log files not tied to one session
pub const DEFAULT_SESSION_LOG_PREFIX: &str = "parsons-sessions";

/// Directory session log files land in when none is given
pub const DEFAULT_SESSION_LOG_DIR: &str = "./session-logs";

/// Preset filter directives for the session logger crates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogProfile {
    /// Warnings only: failed commits, recovery writes that did not stick
    #[default]
    Quiet,
    /// Commits, recovery and session bootstrap
    Session,
    /// Every buffered keystroke and flush timer as well
    Keystrokes,
}

impl LogProfile {
    /// `EnvFilter` directives for this profile
    pub fn directives(self) -> &'static str {
        match self {
            LogProfile::Quiet => "warn",
            LogProfile::Session => "warn,parsons_session=info,parsons_storage=info,parsons_cli=info",
            LogProfile::Keystrokes => {
                "info,parsons_session=trace,parsons_storage=debug,parsons_core=debug"
            }
        }
    }
}

impl FromStr for LogProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(LogProfile::Quiet),
            "session" => Ok(LogProfile::Session),
            "keystrokes" => Ok(LogProfile::Keystrokes),
            other => Err(format!(
                "unknown log profile '{other}' (expected quiet, session or keystrokes)"
            )),
        }
    }
}

impl fmt::Display for LogProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogProfile::Quiet => "quiet",
            LogProfile::Session => "session",
            LogProfile::Keystrokes => "keystrokes",
        };
        f.write_str(name)
    }
}

/// How diagnostics are rendered on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
    /// Nothing on stderr
    Off,
}

/// When a session log file starts over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    /// One file per day, appended to
    #[default]
    Daily,
    /// A single file, truncated when the subscriber starts
    Never,
}

/// JSONL file output for session activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLogFile {
    pub directory: PathBuf,
    pub prefix: String,
    #[serde(default)]
    pub rotation: FileRotation,
}

impl SessionLogFile {
    /// Daily files shared by every session
    pub fn shared(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: DEFAULT_SESSION_LOG_PREFIX.to_string(),
            rotation: FileRotation::Daily,
        }
    }

    /// A single `session-<hash>.log` file for one user's attempt
    pub fn for_session(directory: impl Into<PathBuf>, identity: &SessionIdentity) -> Self {
        Self {
            directory: directory.into(),
            prefix: format!("session-{}", identity.session_key()),
            rotation: FileRotation::Never,
        }
    }

    /// Where a `Never`-rotated file is written
    pub fn path(&self) -> PathBuf {
        self.directory.join(format!("{}.log", self.prefix))
    }
}

impl Default for SessionLogFile {
    fn default() -> Self {
        Self::shared(Path::new(DEFAULT_SESSION_LOG_DIR))
    }
}

/// Everything the subscriber builder reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub profile: LogProfile,
    /// Raw directives replacing the profile's (`RUST_LOG` still wins)
    pub filter: Option<String>,
    pub console: ConsoleFormat,
    pub session_file: Option<SessionLogFile>,
}

impl LogConfig {
    /// Pretty stderr output at the given profile
    pub fn for_profile(profile: LogProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    /// The directives the filter is built from
    pub fn directives(&self) -> &str {
        match self.filter.as_deref().map(str::trim) {
            Some(filter) if !filter.is_empty() => filter,
            _ => self.profile.directives(),
        }
    }
}
