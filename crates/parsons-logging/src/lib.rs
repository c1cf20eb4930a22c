//! Tracing setup for the Parsons session logger tools
//!
//! Diagnostics go to stderr so command output on stdout stays parseable.
//! A [`LogProfile`] picks how much of the session logger is reported, and a
//! [`SessionLogFile`] captures the same events as JSONL on disk.
//!
//! # Quick Start
//!
//! ```ignore
//! use parsons_logging::{LogConfig, LogProfile, ParsonsSubscriberBuilder};
//!
//! let _guard = ParsonsSubscriberBuilder::new()
//!     .with_config(LogConfig::for_profile(LogProfile::Session))
//!     .init();
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{
    ConsoleFormat, DEFAULT_SESSION_LOG_DIR, DEFAULT_SESSION_LOG_PREFIX, FileRotation, LogConfig,
    LogProfile, SessionLogFile,
};
pub use context::{SessionContextData, SessionContextGuard};
pub use layers::{SessionContextLayer, session_span};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors from subscriber setup
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    File(#[from] std::io::Error),

    #[error("A global subscriber is already set: {0}")]
    AlreadyInitialized(String),
}

/// Builder for the global subscriber
pub struct ParsonsSubscriberBuilder {
    config: LogConfig,
}

impl ParsonsSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_profile(mut self, profile: LogProfile) -> Self {
        self.config.profile = profile;
        self
    }

    /// Raw filter directives; `None` keeps the profile's
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console = format;
        self
    }

    /// Also write session activity as JSONL
    pub fn with_session_file(mut self, file: SessionLogFile) -> Self {
        self.config.session_file = Some(file);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally, reporting failure on stderr
    ///
    /// Keep the returned guard alive while a session file is written.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: {}", e);
                None
            }
        }
    }

    /// Try to initialize the subscriber globally
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be opened or a global
    /// subscriber has already been set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.directives()));

        let pretty_console = (self.config.console == ConsoleFormat::Pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
        });

        let json_console = (self.config.console == ConsoleFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .flatten_event(true)
        });

        let (file_layer, guard) = match &self.config.session_file {
            Some(file) => {
                let (writer, guard) = create_file_writer(file)?;
                (Some(layers::jsonl_file_layer(writer, true)), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(SessionContextLayer::new())
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }
}

impl Default for ParsonsSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn create_file_writer(file: &SessionLogFile) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file.directory)?;
    match file.rotation {
        FileRotation::Never => Ok(tracing_appender::non_blocking(File::create(file.path())?)),
        FileRotation::Daily => {
            let appender = RollingFileAppender::new(Rotation::DAILY, &file.directory, &file.prefix);
            Ok(tracing_appender::non_blocking(appender))
        }
    }
}
