//! Keystroke aggregation
//!
//! Typing into a code line fires one input event per keystroke. Logging each
//! of them would drown the log, so consecutive keystrokes on the same line
//! are collapsed into a single `text` record carrying the time of the first
//! keystroke and the value after the last one.
//!
//! ## Flush Rules
//!
//! The open burst (at most one) is logged when:
//! - its quiet-period timer fires
//! - a keystroke arrives for a different batch, or without a batch
//! - any other record is logged (including a paste)
//! - the session enters recovery or is committed
//!
//! The aggregator is plain state. [`SessionLogger`](crate::SessionLogger)
//! decides when to flush and owns the timer callbacks.

use std::time::Duration;

use parsons_core::{BatchId, EventRecord};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// How an input event is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Part of a burst; debounced into a `text` record
    Typing,
    /// Logged immediately as a `paste` record
    Paste,
}

impl InputKind {
    /// Classify an input event by its `inputType`
    pub fn classify(input_type: &str) -> Self {
        match input_type {
            "insertFromPaste" | "insertFromPasteAsQuotation" | "insertFromDrop" => InputKind::Paste,
            _ => InputKind::Typing,
        }
    }
}

/// Handle to a scheduled flush; aborts the task when dropped
#[derive(Debug, Default)]
pub struct FlushTimer {
    handle: Option<JoinHandle<()>>,
}

impl FlushTimer {
    /// Run `on_fire` once `delay` has elapsed
    ///
    /// Outside a tokio runtime no task can be spawned; the burst then stays
    /// open until the next event flushes it.
    pub fn spawn<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => Self {
                handle: Some(handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    on_fire();
                })),
            },
            Err(_) => {
                warn!("No async runtime, edit burst will flush on the next event");
                Self::default()
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The open keystroke burst
#[derive(Debug)]
pub struct PendingEdit {
    pub batch_id: Option<BatchId>,
    /// Time of the first keystroke in the burst
    pub start_time: i64,
    /// Field value after the latest keystroke
    pub current_value: String,
    generation: u64,
    timer: FlushTimer,
}

impl PendingEdit {
    /// The `text` record describing this burst
    pub fn into_record(self) -> EventRecord {
        EventRecord::text(self.start_time, self.current_value, self.batch_id)
    }
}

/// State machine collapsing keystrokes into bursts
#[derive(Debug, Default)]
pub struct TextEditAggregator {
    pending: Option<PendingEdit>,
    generation: u64,
}

impl TextEditAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingEdit> {
        self.pending.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether a keystroke for `batch_id` extends the open burst
    ///
    /// Keystrokes without a batch never extend anything.
    pub fn continues(&self, batch_id: Option<&BatchId>) -> bool {
        match (&self.pending, batch_id) {
            (Some(pending), Some(batch_id)) => pending.batch_id.as_ref() == Some(batch_id),
            _ => false,
        }
    }

    /// Fold a keystroke into the open burst, or open a new one
    ///
    /// Callers flush a burst that [`continues`](Self::continues) rejects
    /// before calling this; an open burst for another batch is replaced.
    /// Returns the generation to hand to [`arm`](Self::arm) and
    /// [`take_generation`](Self::take_generation).
    pub fn record(&mut self, batch_id: Option<BatchId>, value: String, now: i64) -> u64 {
        self.generation += 1;
        let generation = self.generation;

        if let Some(pending) = self
            .pending
            .as_mut()
            .filter(|p| batch_id.is_some() && p.batch_id == batch_id)
        {
            pending.timer.cancel();
            pending.current_value = value;
            pending.generation = generation;
            trace!(batch = ?pending.batch_id, generation, "Extended edit burst");
        } else {
            trace!(batch = ?batch_id, generation, "Opened edit burst");
            self.pending = Some(PendingEdit {
                batch_id,
                start_time: now,
                current_value: value,
                generation,
                timer: FlushTimer::default(),
            });
        }
        generation
    }

    /// Attach the flush timer for `generation`
    ///
    /// A timer for a superseded generation is dropped, which aborts it.
    pub fn arm(&mut self, generation: u64, timer: FlushTimer) {
        if let Some(pending) = &mut self.pending {
            if pending.generation == generation {
                pending.timer = timer;
            }
        }
    }

    /// Close the open burst, cancelling its timer
    pub fn take(&mut self) -> Option<PendingEdit> {
        let mut pending = self.pending.take()?;
        pending.timer.cancel();
        Some(pending)
    }

    /// Close the open burst only if it is still at `generation`
    ///
    /// A timer that fires after its burst was extended or flushed finds a
    /// different generation (or nothing) and does nothing.
    pub fn take_generation(&mut self, generation: u64) -> Option<PendingEdit> {
        if self.pending.as_ref()?.generation != generation {
            return None;
        }
        self.take()
    }
}
