//! Host environment of a session logger
//!
//! The logger never reaches for globals. Everything it needs from the page it
//! runs in (user and problem labels, storage, the remote client, a way to
//! alert the user, a clock) is handed over in a [`SessionContext`].

use std::fmt;
use std::sync::Arc;

use parsons_core::{Clock, MonotonicClock, Notifier, RemoteStore, TracingNotifier};
use parsons_storage::{InMemoryLocalStore, LocalStore};

use crate::config::LoggerConfig;

/// Everything a [`SessionLogger`](crate::SessionLogger) needs from its host
#[derive(Clone)]
pub struct SessionContext {
    /// Label identifying the user, trimmed before hashing
    pub user_label: String,
    /// Label identifying the exercise
    pub problem_label: String,
    /// Label stamped on records as `questionId`; defaults to the problem label
    pub question_label: Option<String>,
    pub local: Arc<dyn LocalStore>,
    /// `None` when the page has no remote client; commits then go to recovery
    pub remote: Option<Arc<dyn RemoteStore>>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub config: LoggerConfig,
}

impl SessionContext {
    pub fn builder(
        user_label: impl Into<String>,
        problem_label: impl Into<String>,
    ) -> SessionContextBuilder {
        SessionContextBuilder::new(user_label, problem_label)
    }

    /// Question label stamped on records that do not carry one
    pub fn question_id(&self) -> String {
        self.question_label
            .as_deref()
            .unwrap_or(&self.problem_label)
            .trim()
            .to_string()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("user_label", &self.user_label)
            .field("problem_label", &self.problem_label)
            .field("question_label", &self.question_label)
            .field("has_remote", &self.remote.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SessionContext`]
///
/// Unset collaborators default to an in-memory local store, no remote, a
/// notifier that only logs, and a monotonic wall clock.
pub struct SessionContextBuilder {
    user_label: String,
    problem_label: String,
    question_label: Option<String>,
    local: Option<Arc<dyn LocalStore>>,
    remote: Option<Arc<dyn RemoteStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    config: LoggerConfig,
}

impl SessionContextBuilder {
    pub fn new(user_label: impl Into<String>, problem_label: impl Into<String>) -> Self {
        Self {
            user_label: user_label.into(),
            problem_label: problem_label.into(),
            question_label: None,
            local: None,
            remote: None,
            notifier: None,
            clock: None,
            config: LoggerConfig::default(),
        }
    }

    pub fn question_label(mut self, label: impl Into<String>) -> Self {
        self.question_label = Some(label.into());
        self
    }

    pub fn local_store(mut self, local: Arc<dyn LocalStore>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn remote_store(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SessionContext {
        SessionContext {
            user_label: self.user_label,
            problem_label: self.problem_label,
            question_label: self.question_label,
            local: self
                .local
                .unwrap_or_else(|| Arc::new(InMemoryLocalStore::new())),
            remote: self.remote,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            config: self.config,
        }
    }
}
