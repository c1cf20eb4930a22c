//! Session context injection
//!
//! This module provides thread-local storage for the active session,
//! allowing the session hash to be attached to every span opened while a
//! logger is working on behalf of that session.

use std::cell::RefCell;

use parsons_core::SessionIdentity;
use uuid::Uuid;

/// Session context data stored in thread-local storage
#[derive(Debug, Clone)]
pub struct SessionContextData {
    /// The session hash in its persisted decimal form
    pub session_hash: String,
    /// The user the session belongs to
    pub username: String,
    /// Unique id of this page load
    pub instance_id: Uuid,
}

thread_local! {
    static SESSION_CONTEXT: RefCell<Option<SessionContextData>> = const { RefCell::new(None) };
}

/// RAII guard for session context
///
/// When this guard is created, it sets the session context for the current
/// thread. When it's dropped, it restores the previous context (if any).
///
/// # Example
///
/// ```ignore
/// use parsons_logging::SessionContextGuard;
/// use parsons_core::SessionIdentity;
///
/// let identity = SessionIdentity::derive("alice", "Sublist");
/// let _guard = SessionContextGuard::new(&identity);
///
/// // Spans opened in this scope carry the session context
/// let _span = parsons_logging::session_span().entered();
/// tracing::info!("Committing");
/// ```
pub struct SessionContextGuard {
    previous: Option<SessionContextData>,
}

impl SessionContextGuard {
    /// Set the session context for the current scope
    pub fn new(identity: &SessionIdentity) -> Self {
        Self::with_instance_id(identity, Uuid::new_v4())
    }

    /// Set the session context with a specific instance id
    pub fn with_instance_id(identity: &SessionIdentity, instance_id: Uuid) -> Self {
        let previous = SESSION_CONTEXT.with(|ctx| ctx.borrow().clone());

        let new_ctx = SessionContextData {
            session_hash: identity.session_key(),
            username: identity.username.clone(),
            instance_id,
        };

        SESSION_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(new_ctx));

        Self { previous }
    }

    /// Get the current session context (if any)
    pub fn current() -> Option<SessionContextData> {
        SESSION_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current session hash (if set)
    pub fn current_session_hash() -> Option<String> {
        Self::current().map(|ctx| ctx.session_hash)
    }
}

impl Drop for SessionContextGuard {
    fn drop(&mut self) {
        SESSION_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}
