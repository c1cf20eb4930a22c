//! Session logger
//!
//! [`SessionLogger`] owns the in-memory log of one session and moves it
//! between three places:
//!
//! ```text
//!   events ──► log ──commit──► remote document
//!               │  ▲
//!     teardown/ │  │ next compatible session
//!     failure   ▼  │
//!           recovery buffer (local store)
//! ```
//!
//! A record is appended at most once and is never lost silently: it either
//! reaches the remote store, sits in the in-memory log, or sits in the
//! recovery buffer. The only way a record disappears is a mapper cancelling
//! it before it was appended.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use parsons_core::{BatchId, DocId, EventKind, EventRecord, SessionIdentity};
use parsons_storage::{LocalStore, RecoveryBuffer};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, trace, warn};

use crate::aggregator::{FlushTimer, InputKind, TextEditAggregator};
use crate::commit::CommitPayload;
use crate::context::SessionContext;
use crate::error::LoggerError;
use crate::mapper::MapperRegistry;

/// Mutable state behind the logger lock
#[derive(Debug, Default)]
struct LoggerState {
    /// A session start record has been appended and recovery is armed
    initialized: bool,
    identity: Option<SessionIdentity>,
    records: Vec<EventRecord>,
    /// Sequence number of `records[0]`; grows as records are committed or
    /// moved to recovery
    first_seq: u64,
    aggregator: TextEditAggregator,
    mappers: MapperRegistry,
}

impl LoggerState {
    fn end_seq(&self) -> u64 {
        self.first_seq + self.records.len() as u64
    }
}

struct LoggerInner {
    ctx: SessionContext,
    state: Mutex<LoggerState>,
}

/// A commit snapshot taken under the lock
struct PreparedCommit {
    payload: CommitPayload,
    /// Records below this sequence number are covered by the payload
    end_seq: u64,
}

/// Event logger for one user's attempt at one exercise
///
/// Cloning is cheap and every clone shares the same log. When the last
/// clone is dropped the session is torn down: anything not yet committed is
/// written to the recovery buffer.
#[derive(Clone)]
pub struct SessionLogger {
    inner: Arc<LoggerInner>,
}

impl SessionLogger {
    pub fn new(ctx: SessionContext) -> Self {
        debug!(
            problem = %ctx.problem_label,
            remote = ctx.remote.is_some(),
            "Created session logger"
        );
        Self {
            inner: Arc::new(LoggerInner {
                ctx,
                state: Mutex::new(LoggerState::default()),
            }),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.inner.ctx
    }

    /// Decide between a fresh and a resumed session and log its first record
    ///
    /// Happens implicitly before the first record is appended; calling it on
    /// an initialized session does nothing.
    pub fn initialize_session(&self) {
        let mut state = self.inner.state.lock();
        self.inner.ensure_initialized(&mut state);
    }

    /// Append a record
    ///
    /// Any open keystroke burst is logged first. Missing `time` and
    /// `questionId` are filled in. Returns `false` if a mapper cancelled it.
    pub fn log_event(&self, record: EventRecord) -> bool {
        let mut state = self.inner.state.lock();
        self.inner.append(&mut state, record)
    }

    /// Validate an untyped record and append it
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidRecord`] for `null` or a record whose
    /// `type` is not a string; nothing is appended or flushed in that case.
    pub fn log_value(&self, value: Value) -> Result<bool, LoggerError> {
        let record = EventRecord::from_value(value)?;
        Ok(self.log_event(record))
    }

    /// Handle an input event from a text field
    ///
    /// Pastes and drops are logged at once. Keystrokes are folded into the
    /// open burst for `batch_id` and logged after `flush_timeout` (or the
    /// configured default) passes without another keystroke on that batch.
    pub fn on_field_input(
        &self,
        input_type: &str,
        batch_id: Option<BatchId>,
        value: impl Into<String>,
        flush_timeout: Option<Duration>,
    ) {
        let value = value.into();
        let mut state = self.inner.state.lock();
        self.inner.ensure_initialized(&mut state);

        match InputKind::classify(input_type) {
            InputKind::Paste => {
                self.inner
                    .append(&mut state, EventRecord::paste(batch_id, value));
            }
            InputKind::Typing => {
                let timeout =
                    flush_timeout.unwrap_or_else(|| self.inner.ctx.config.flush_timeout());
                self.inner
                    .on_keystroke(&mut state, batch_id, value, timeout);
            }
        }
    }

    /// Log the open keystroke burst now, if there is one
    pub fn finish_edit(&self) {
        let mut state = self.inner.state.lock();
        self.inner.flush_pending(&mut state);
    }

    /// Move the uncommitted log into the recovery buffer
    ///
    /// The next record appended starts a new session bootstrap, which picks
    /// the buffer back up as a resume. No-op on an uninitialized session.
    pub fn enter_recovery(&self) {
        let mut state = self.inner.state.lock();
        self.inner.enter_recovery(&mut state);
    }

    /// Log a submission and commit the session
    pub async fn on_submit(&self) -> bool {
        self.log_event(EventRecord::submit());
        self.commit(false).await
    }

    /// Send the log to the remote store
    ///
    /// Returns `true` once the remote write succeeded. On failure the log is
    /// moved to recovery and, unless `silent`, the user is notified.
    pub async fn commit(&self, silent: bool) -> bool {
        self.commit_detailed(silent).await.is_ok()
    }

    /// [`commit`](Self::commit), returning the document id or the failure
    ///
    /// # Errors
    ///
    /// - [`LoggerError::MisconfiguredRemote`] when no remote store is set
    /// - [`LoggerError::TransportFailure`] when the remote call failed
    /// - [`LoggerError::CommitCancelled`] when the pre-commit mapper declined;
    ///   the log is left untouched in that case
    #[instrument(skip(self), fields(problem = %self.inner.ctx.problem_label))]
    pub async fn commit_detailed(&self, silent: bool) -> Result<DocId, LoggerError> {
        let result = self.send_commit().await;
        match &result {
            Ok(doc_id) => {
                if !silent {
                    info!(doc_id = %doc_id, "Document written with ID: {}", doc_id);
                }
            }
            Err(LoggerError::CommitCancelled) => {
                debug!("Commit cancelled by pre-commit mapper");
            }
            Err(err) => {
                self.enter_recovery();
                if silent {
                    debug!(error = %err, "Silent commit failed, log moved to recovery");
                } else {
                    warn!(error = %err, "Commit failed, log moved to recovery");
                    self.inner.ctx.notifier.notify(&failure_message(err));
                }
            }
        }
        result
    }

    async fn send_commit(&self) -> Result<DocId, LoggerError> {
        let remote = self
            .inner
            .ctx
            .remote
            .clone()
            .ok_or(LoggerError::MisconfiguredRemote)?;
        let collection = self.inner.ctx.config.collection.clone();
        let PreparedCommit { payload, end_seq } = self.inner.prepare_commit()?;

        trace!(
            entries = payload.log().len(),
            create = payload.is_create(),
            "Sending commit"
        );
        let doc_id = match payload.target().cloned() {
            Some(doc_id) => {
                remote
                    .update_document(&collection, &doc_id, payload.into_patch())
                    .await?;
                doc_id
            }
            None => {
                let doc_id = remote
                    .create_document(&collection, payload.into_document())
                    .await?;
                let keys = &self.inner.ctx.config.keys;
                write_key(self.inner.ctx.local.as_ref(), &keys.doc_id, doc_id.as_str());
                doc_id
            }
        };

        self.inner.mark_committed(end_seq);
        Ok(doc_id)
    }

    /// Add a mapper for records of `kind`
    ///
    /// Returning `None` cancels the record. Mappers for the same kind
    /// compose in registration order.
    ///
    /// Record mappers run while the log is locked, so the record lands in
    /// the order it was logged. A mapper must not call back into this
    /// logger (or a clone of it); doing so deadlocks.
    pub fn register_mapper<F>(&self, kind: impl Into<EventKind>, mapper: F)
    where
        F: Fn(EventRecord) -> Option<EventRecord> + Send + Sync + 'static,
    {
        self.inner.state.lock().mappers.register(kind, mapper);
    }

    /// Add a mapper run on every commit payload before it is sent
    ///
    /// Returning `None` cancels the commit; the log stays where it is. The
    /// mapper runs without the log locked and may read this logger, e.g.
    /// through [`records`](Self::records).
    pub fn register_commit_mapper<F>(&self, mapper: F)
    where
        F: Fn(CommitPayload) -> Option<CommitPayload> + Send + Sync + 'static,
    {
        self.inner.state.lock().mappers.register_commit(mapper);
    }

    /// Snapshot of the uncommitted log
    pub fn records(&self) -> Vec<EventRecord> {
        self.inner.state.lock().records.clone()
    }

    /// Number of uncommitted records
    pub fn record_count(&self) -> usize {
        self.inner.state.lock().records.len()
    }

    /// Pretty JSON of the uncommitted log, initializing the session first
    pub fn dump_log(&self) -> Result<String, LoggerError> {
        let mut state = self.inner.state.lock();
        self.inner.ensure_initialized(&mut state);
        let entries = CommitPayload::from_records(&state.records);
        serde_json::to_string_pretty(&entries).map_err(|e| LoggerError::Serialization(e.to_string()))
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.lock().initialized
    }

    pub fn has_pending_edit(&self) -> bool {
        self.inner.state.lock().aggregator.has_pending()
    }

    /// Identity derived at the last bootstrap
    pub fn session_identity(&self) -> Option<SessionIdentity> {
        self.inner.state.lock().identity.clone()
    }

    /// Tear the session down as a page unload would
    pub fn teardown(&self) {
        self.enter_recovery();
    }
}

impl Drop for LoggerInner {
    fn drop(&mut self) {
        let mut state = std::mem::take(self.state.get_mut());
        self.enter_recovery(&mut state);
    }
}

impl std::fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SessionLogger")
            .field("ctx", &self.inner.ctx)
            .field("initialized", &state.initialized)
            .field("records", &state.records.len())
            .field("pending", &state.aggregator.has_pending())
            .finish()
    }
}

impl LoggerInner {
    fn ensure_initialized(&self, state: &mut LoggerState) {
        if !state.initialized {
            self.bootstrap(state);
        }
    }

    /// Fresh or resumed session, decided from the local store
    ///
    /// Local storage failures degrade to a fresh session rather than an
    /// error; the log itself stays in memory either way.
    fn bootstrap(&self, state: &mut LoggerState) {
        let ctx = &self.ctx;
        let keys = &ctx.config.keys;
        let local = ctx.local.as_ref();
        let identity = SessionIdentity::derive(&ctx.user_label, &ctx.problem_label);
        let buffer = RecoveryBuffer::new(local, &keys.recovery);

        let previous = read_key(local, &keys.session_hash);
        let has_recovery = buffer.exists().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read recovery buffer");
            false
        });
        let has_doc = read_key(local, &keys.doc_id).is_some();
        let same_session = previous.as_deref().is_some_and(|p| identity.matches(p));
        let resuming = same_session && (has_recovery || has_doc);

        write_key(local, &keys.session_hash, &identity.session_key());

        let mut restored = Vec::new();
        if resuming {
            match buffer.take() {
                Ok(records) => restored = records.unwrap_or_default(),
                Err(e) => warn!(error = %e, "Could not load recovery buffer"),
            }
        } else {
            remove_key(local, &keys.doc_id);
            if has_recovery {
                if let Err(e) = buffer.discard() {
                    warn!(error = %e, "Could not discard stale recovery buffer");
                }
            }
        }

        info!(
            session_hash = identity.session_hash,
            resuming,
            restored = restored.len(),
            "Session initialized"
        );

        restored.append(&mut state.records);
        state.records = restored;
        state.identity = Some(identity.clone());
        state.initialized = true;

        // Not through `append`: an open burst must land after this record
        self.admit(state, EventRecord::session_start(resuming, &identity));
    }

    fn append(&self, state: &mut LoggerState, record: EventRecord) -> bool {
        self.ensure_initialized(state);
        self.flush_pending(state);
        self.admit(state, record)
    }

    /// Fill defaults, run the mapper, and push
    fn admit(&self, state: &mut LoggerState, mut record: EventRecord) -> bool {
        if record.time.is_none() {
            record.time = Some(self.ctx.clock.now_millis());
        }
        if record.question_id.as_deref().is_none_or(str::is_empty) {
            record.question_id = Some(self.ctx.question_id());
        }

        let kind = record.kind.clone();
        match state.mappers.apply(record) {
            Some(record) => {
                trace!(kind = %kind, seq = state.end_seq(), "Appended record");
                state.records.push(record);
                true
            }
            None => {
                debug!(kind = %kind, "Record cancelled by mapper");
                false
            }
        }
    }

    fn flush_pending(&self, state: &mut LoggerState) {
        // Cleared before logging, so the append below cannot flush it twice
        if let Some(edit) = state.aggregator.take() {
            self.append(state, edit.into_record());
        }
    }

    fn on_keystroke(
        self: &Arc<Self>,
        state: &mut LoggerState,
        batch_id: Option<BatchId>,
        value: String,
        timeout: Duration,
    ) {
        if !state.aggregator.continues(batch_id.as_ref()) {
            self.flush_pending(state);
        }

        let now = self.ctx.clock.now_millis();
        let batched = batch_id.is_some();
        let generation = state.aggregator.record(batch_id, value, now);

        if !batched {
            self.flush_pending(state);
            return;
        }

        let weak = Arc::downgrade(self);
        let timer = FlushTimer::spawn(timeout, move || on_flush_timer(weak, generation));
        state.aggregator.arm(generation, timer);
    }

    fn on_flush_timer(&self, generation: u64) {
        let mut state = self.state.lock();
        if let Some(edit) = state.aggregator.take_generation(generation) {
            trace!(generation, "Quiet period elapsed, logging edit burst");
            self.append(&mut state, edit.into_record());
        }
    }

    fn enter_recovery(&self, state: &mut LoggerState) {
        if !state.initialized {
            return;
        }
        self.flush_pending(state);

        if !state.records.is_empty() {
            let buffer = RecoveryBuffer::new(self.ctx.local.as_ref(), &self.ctx.config.keys.recovery);
            if let Err(e) = buffer.write(&state.records) {
                warn!(
                    error = %e,
                    records = state.records.len(),
                    "Could not write recovery buffer, keeping log in memory"
                );
                return;
            }
            info!(records = state.records.len(), "Moved log to recovery");
            state.first_seq = state.end_seq();
            state.records.clear();
        }
        state.initialized = false;
    }

    fn prepare_commit(&self) -> Result<PreparedCommit, LoggerError> {
        let mut state = self.state.lock();
        self.ensure_initialized(&mut state);
        self.flush_pending(&mut state);

        let keys = &self.ctx.config.keys;
        let log = CommitPayload::from_records(&state.records);
        let payload = match read_key(self.ctx.local.as_ref(), &keys.doc_id) {
            Some(doc_id) => CommitPayload::append(DocId::new(doc_id), log),
            None => CommitPayload::create(log, self.document_metadata(&state)),
        };

        let end_seq = state.end_seq();
        let commit_mapper = state.mappers.commit_mapper();
        drop(state);

        // Unlocked, so the mapper may read the logger it is registered on
        let payload = match commit_mapper {
            Some(mapper) => mapper(payload).ok_or(LoggerError::CommitCancelled)?,
            None => payload,
        };
        Ok(PreparedCommit { payload, end_seq })
    }

    fn document_metadata(&self, state: &LoggerState) -> Map<String, Value> {
        let identity = state
            .identity
            .clone()
            .unwrap_or_else(|| SessionIdentity::derive(&self.ctx.user_label, &self.ctx.problem_label));

        let mut metadata = Map::new();
        metadata.insert("docTitle".into(), Value::String(self.ctx.problem_label.clone()));
        metadata.insert("problemHash".into(), Value::from(identity.problem_hash));
        metadata.insert("userHash".into(), Value::from(identity.user_hash));
        metadata.insert("usernameStr".into(), Value::String(identity.username));
        metadata.insert("sent".into(), Value::from(self.ctx.clock.now_millis()));
        metadata
    }

    /// Drop records covered by a successful commit
    ///
    /// Records appended while the commit was in flight have higher sequence
    /// numbers and stay. If the log was moved to recovery meanwhile, nothing
    /// below `end_seq` is left in memory and this does nothing.
    fn mark_committed(&self, end_seq: u64) {
        let mut state = self.state.lock();
        let covered = end_seq.saturating_sub(state.first_seq);
        let covered = usize::try_from(covered)
            .unwrap_or(usize::MAX)
            .min(state.records.len());
        state.records.drain(..covered);
        state.first_seq += covered as u64;
        debug!(committed = covered, remaining = state.records.len(), "Commit acknowledged");
    }
}

fn on_flush_timer(inner: Weak<LoggerInner>, generation: u64) {
    if let Some(inner) = inner.upgrade() {
        inner.on_flush_timer(generation);
    }
}

fn failure_message(err: &LoggerError) -> String {
    match err {
        LoggerError::TransportFailure(e) => format!("Error adding document:\n{}", e),
        other => other.to_string(),
    }
}

fn read_key(local: &dyn LocalStore, key: &str) -> Option<String> {
    local.get(key).unwrap_or_else(|e| {
        warn!(key, error = %e, "Could not read local key");
        None
    })
}

fn write_key(local: &dyn LocalStore, key: &str, value: &str) {
    if let Err(e) = local.set(key, value) {
        warn!(key, error = %e, "Could not write local key");
    }
}

fn remove_key(local: &dyn LocalStore, key: &str) {
    if let Err(e) = local.remove(key) {
        warn!(key, error = %e, "Could not remove local key");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parsons_core::{FixedClock, InMemoryRemoteStore, RecordingNotifier};
    use parsons_storage::InMemoryLocalStore;
    use serde_json::json;

    struct Harness {
        local: Arc<InMemoryLocalStore>,
        remote: Arc<InMemoryRemoteStore>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<FixedClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                local: Arc::new(InMemoryLocalStore::new()),
                remote: Arc::new(InMemoryRemoteStore::new()),
                notifier: Arc::new(RecordingNotifier::new()),
                clock: Arc::new(FixedClock::new(1_000)),
            }
        }

        fn logger(&self, user: &str, problem: &str) -> SessionLogger {
            SessionLogger::new(
                SessionContext::builder(user, problem)
                    .local_store(self.local.clone())
                    .remote_store(self.remote.clone())
                    .notifier(self.notifier.clone())
                    .clock(self.clock.clone())
                    .build(),
            )
        }

        fn offline_logger(&self, user: &str, problem: &str) -> SessionLogger {
            SessionLogger::new(
                SessionContext::builder(user, problem)
                    .local_store(self.local.clone())
                    .notifier(self.notifier.clone())
                    .clock(self.clock.clone())
                    .build(),
            )
        }
    }

    fn kinds(logger: &SessionLogger) -> Vec<String> {
        logger
            .records()
            .iter()
            .map(|r| r.kind.to_string())
            .collect()
    }

    #[test]
    fn test_first_record_is_init() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        assert!(!logger.is_initialized());

        assert!(logger.log_event(EventRecord::new("hint")));
        assert_eq!(kinds(&logger), vec!["init", "hint"]);

        let init = &logger.records()[0];
        let identity = logger.session_identity().unwrap();
        assert_eq!(init.field("userHash"), Some(&json!(identity.user_hash)));
        assert_eq!(init.field_str("usernameStr"), Some("alice"));
        assert_eq!(
            h.local.get("sessionHash").unwrap(),
            Some(identity.session_key())
        );
    }

    #[test]
    fn test_defaults_filled_but_not_overridden() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.log_event(EventRecord::new("hint"));
        logger.log_event(EventRecord::new("hint").with_time(5).with_question_id("other"));

        let records = logger.records();
        assert_eq!(records[1].time, Some(1_000));
        assert_eq!(records[1].question_id.as_deref(), Some("Q1"));
        assert_eq!(records[2].time, Some(5));
        assert_eq!(records[2].question_id.as_deref(), Some("other"));
    }

    #[test]
    fn test_empty_question_id_is_filled() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.log_event(EventRecord::new("hint").with_question_id(""));
        logger
            .log_value(json!({ "type": "hint", "questionId": "" }))
            .unwrap();

        let records = logger.records();
        assert_eq!(records[1].question_id.as_deref(), Some("Q1"));
        assert_eq!(records[2].question_id.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_log_value_rejects_invalid_without_side_effects() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");

        assert!(matches!(
            logger.log_value(Value::Null),
            Err(LoggerError::InvalidRecord(_))
        ));
        assert!(matches!(
            logger.log_value(json!({"type": 3})),
            Err(LoggerError::InvalidRecord(_))
        ));
        assert!(!logger.is_initialized());

        assert!(logger.log_value(json!({"type": "hint", "n": 1})).unwrap());
        assert_eq!(logger.records()[1].field("n"), Some(&json!(1)));
    }

    #[test]
    fn test_cancelled_record_is_not_appended() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.register_mapper("noise", |_| None);

        assert!(!logger.log_event(EventRecord::new("noise")));
        assert!(logger.log_event(EventRecord::new("signal")));
        assert_eq!(kinds(&logger), vec!["init", "signal"]);
    }

    #[test]
    fn test_unbatched_keystroke_logs_immediately() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.on_field_input("insertText", None, "a", None);
        assert!(!logger.has_pending_edit());
        assert_eq!(kinds(&logger), vec!["init", "text"]);
        assert_eq!(logger.records()[1].field("batchId"), Some(&Value::Null));
    }

    #[test]
    fn test_burst_flushed_by_next_record() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");

        logger.on_field_input("insertText", Some("L1".into()), "d", None);
        h.clock.advance(100);
        logger.on_field_input("insertText", Some("L1".into()), "de", None);
        assert!(logger.has_pending_edit());
        assert_eq!(kinds(&logger), vec!["init"]);

        h.clock.advance(100);
        logger.log_event(EventRecord::submit());
        assert!(!logger.has_pending_edit());
        assert_eq!(kinds(&logger), vec!["init", "text", "submit"]);

        let text = &logger.records()[1];
        assert_eq!(text.time, Some(1_000));
        assert_eq!(text.field_str("value"), Some("de"));
    }

    #[test]
    fn test_batch_switch_flushes_previous_burst() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");

        logger.on_field_input("insertText", Some("L1".into()), "a", None);
        logger.on_field_input("insertText", Some("L2".into()), "b", None);
        logger.finish_edit();

        let records = logger.records();
        assert_eq!(records[1].field_str("batchId"), Some("L1"));
        assert_eq!(records[2].field_str("batchId"), Some("L2"));
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_paste_flushes_burst_first() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");

        logger.on_field_input("insertText", Some("L1".into()), "x =", None);
        logger.on_field_input("insertFromPaste", Some("L1".into()), "x = foo()", None);
        assert_eq!(kinds(&logger), vec!["init", "text", "paste"]);

        let paste = &logger.records()[2];
        assert_eq!(paste.field("duration"), Some(&json!(0)));
        assert_eq!(paste.field_str("value"), Some("x = foo()"));
    }

    #[test]
    fn test_burst_before_init_lands_after_session_start() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        {
            // Open a burst without bootstrapping, as a raw keystroke would
            // if the session had been torn down in between
            let mut state = logger.inner.state.lock();
            state.aggregator.record(Some("L1".into()), "x".into(), 0);
        }
        logger.log_event(EventRecord::submit());
        assert_eq!(kinds(&logger), vec!["init", "text", "submit"]);
    }

    #[test]
    fn test_enter_recovery_then_resume() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.log_event(EventRecord::new("hint"));
        logger.on_field_input("insertText", Some("L1".into()), "y", None);
        logger.enter_recovery();

        assert!(!logger.is_initialized());
        assert_eq!(logger.record_count(), 0);
        assert!(h.local.get("recovery").unwrap().is_some());

        logger.log_event(EventRecord::submit());
        assert_eq!(
            kinds(&logger),
            vec!["init", "hint", "text", "resume", "submit"]
        );
        assert!(h.local.get("recovery").unwrap().is_none());
    }

    #[test]
    fn test_enter_recovery_before_init_is_noop() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.enter_recovery();
        assert!(h.local.is_empty());
    }

    #[test]
    fn test_other_session_discards_recovery() {
        let h = Harness::new();
        {
            let logger = h.logger("alice", "Q1");
            logger.log_event(EventRecord::new("hint"));
        }
        assert!(h.local.get("recovery").unwrap().is_some());

        let logger = h.logger("bob", "Q1");
        logger.initialize_session();
        assert_eq!(kinds(&logger), vec!["init"]);
        assert!(h.local.get("recovery").unwrap().is_none());
    }

    #[test]
    fn test_same_session_without_state_starts_fresh() {
        let h = Harness::new();
        let identity = SessionIdentity::derive("alice", "Q1");
        h.local.set("sessionHash", &identity.session_key()).unwrap();

        let logger = h.logger("alice", "Q1");
        logger.initialize_session();
        assert_eq!(kinds(&logger), vec!["init"]);
    }

    #[test]
    fn test_drop_of_clone_keeps_session() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.log_event(EventRecord::new("hint"));

        drop(logger.clone());
        assert!(logger.is_initialized());
        assert!(h.local.get("recovery").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_creates_then_appends() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.log_event(EventRecord::new("hint"));

        let doc_id = logger.commit_detailed(false).await.unwrap();
        assert_eq!(logger.record_count(), 0);
        assert_eq!(h.local.get("docId").unwrap().as_deref(), Some(doc_id.as_str()));

        let doc = h.remote.document("logs", &doc_id).unwrap();
        assert_eq!(doc["docTitle"], "Q1");
        assert_eq!(doc["usernameStr"], "alice");
        assert_eq!(doc["sent"], 1_000);
        assert_eq!(doc["log"].as_array().unwrap().len(), 2);

        logger.log_event(EventRecord::submit());
        assert!(logger.commit(true).await);
        assert_eq!(h.remote.document_count("logs"), 1);
        let doc = h.remote.document("logs", &doc_id).unwrap();
        assert_eq!(doc["log"].as_array().unwrap().len(), 3);
        assert!(h.notifier.is_empty());
    }

    #[tokio::test]
    async fn test_commit_without_remote_enters_recovery() {
        let h = Harness::new();
        let logger = h.offline_logger("alice", "Q1");
        logger.log_event(EventRecord::new("hint"));

        assert!(matches!(
            logger.commit_detailed(false).await,
            Err(LoggerError::MisconfiguredRemote)
        ));
        assert!(!logger.is_initialized());
        assert!(h.local.get("recovery").unwrap().is_some());
        assert_eq!(
            h.notifier.messages(),
            vec!["Remote store not configured. Commit aborted!"]
        );
    }

    #[tokio::test]
    async fn test_silent_failure_does_not_notify() {
        let h = Harness::new();
        h.remote.set_offline(true);
        let logger = h.logger("alice", "Q1");
        logger.log_event(EventRecord::new("hint"));

        assert!(!logger.commit(true).await);
        assert!(h.notifier.is_empty());
        assert!(h.local.get("recovery").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_message() {
        let h = Harness::new();
        h.remote.fail_next(1);
        let logger = h.logger("alice", "Q1");

        assert!(!logger.commit(false).await);
        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Error adding document:\n"));
    }

    #[tokio::test]
    async fn test_cancelled_commit_keeps_log() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        logger.register_commit_mapper(|_| None);
        logger.log_event(EventRecord::new("hint"));

        assert!(matches!(
            logger.commit_detailed(false).await,
            Err(LoggerError::CommitCancelled)
        ));
        assert!(logger.is_initialized());
        assert_eq!(logger.record_count(), 2);
        assert_eq!(h.remote.calls(), 0);
        assert!(h.local.get("recovery").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_mapper_can_read_logger() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");

        // Filled after registration and emptied at the end, so the mapper
        // does not keep the logger alive
        let slot: Arc<parking_lot::Mutex<Option<SessionLogger>>> = Arc::default();
        let seen = slot.clone();
        logger.register_commit_mapper(move |mut payload| {
            let pending = seen.lock().as_ref().map(SessionLogger::record_count);
            payload.set_field("pendingRecords", pending);
            Some(payload)
        });
        *slot.lock() = Some(logger.clone());

        logger.log_event(EventRecord::new("hint"));
        let doc_id = logger.commit_detailed(true).await.unwrap();

        let doc = h.remote.document("logs", &doc_id).unwrap();
        assert_eq!(doc["pendingRecords"], 2);
        assert_eq!(logger.record_count(), 0);
        slot.lock().take();
    }

    #[test]
    fn test_on_submit_commits() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        assert!(tokio_test::block_on(logger.on_submit()));

        let (_, doc) = h.remote.documents("logs").remove(0);
        assert_eq!(doc["log"][1]["type"], "submit");
        assert_eq!(logger.record_count(), 0);
    }

    #[test]
    fn test_dump_log_initializes() {
        let h = Harness::new();
        let logger = h.logger("alice", "Q1");
        let dump = logger.dump_log().unwrap();
        let parsed: Value = serde_json::from_str(&dump).unwrap();
        assert_eq!(parsed[0]["type"], "init");
        assert!(dump.contains('\n'));
    }
}
