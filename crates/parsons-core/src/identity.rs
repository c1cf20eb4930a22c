//! Session identity
//!
//! A session is one user's attempt at one exercise. It is identified by a
//! hash of the user label combined with a hash of the problem label, so a
//! reload of the same page by the same user produces the same identity while
//! a different user or exercise does not.

use serde::{Deserialize, Serialize};

/// 32-bit rolling string hash (`h = 31 * h + unit` over UTF-16 code units)
///
/// This is the `String.hashCode` definition, so hashes already persisted by
/// other clients stay comparable.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Identity of one user's attempt at one exercise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Trimmed user label
    pub username: String,
    /// Hash of the user label
    pub user_hash: i32,
    /// Hash of the problem label
    pub problem_hash: i32,
    /// `user_hash ^ problem_hash`
    pub session_hash: i32,
}

impl SessionIdentity {
    /// Derive the identity from the current user and problem labels
    pub fn derive(user_label: &str, problem_label: &str) -> Self {
        let username = user_label.trim().to_string();
        let user_hash = string_hash(&username);
        let problem_hash = string_hash(problem_label);
        Self {
            username,
            user_hash,
            problem_hash,
            session_hash: user_hash ^ problem_hash,
        }
    }

    /// The session hash in the decimal form it is persisted in
    pub fn session_key(&self) -> String {
        self.session_hash.to_string()
    }

    /// Whether a previously persisted session hash names this session
    pub fn matches(&self, persisted: &str) -> bool {
        persisted.trim() == self.session_key()
    }
}
