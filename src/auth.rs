//! Current-user lookup used to stamp ownership on created documents.

use std::collections::HashMap;

/// Supplies the identity of the signed-in user, if any.
///
/// Implementations might wrap a Firebase Auth client, a JWT from the request
/// context, or a fixed identity in tests.
pub trait AuthProvider: Send + Sync {
    /// The current user's id, or `None` when nobody is signed in.
    fn current_user_id(&self) -> Option<String>;
}

/// Session claims for the signed-in user.
///
/// Claims are the decoded token attributes (`uid`, `role`, custom claims):
///
/// ```json
/// {
///   "uid": "user-42",
///   "role": "editor"
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Session {
    claims: HashMap<String, String>,
}

impl Session {
    /// Key holding the user id.
    pub const USER_ID: &'static str = "uid";

    /// A session with nobody signed in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session for the given user.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        let mut session = Self::default();
        session.set(Self::USER_ID, user_id);
        session
    }

    /// Create a session from decoded token claims.
    pub fn from_claims(claims: HashMap<String, String>) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(Self::USER_ID)
    }

    /// Get a claim by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.claims.get(key).map(|v| v.as_str())
    }

    /// Set a claim.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.claims.insert(key.into(), value.into());
    }

    /// Drop every claim, signing the user out.
    pub fn clear(&mut self) {
        self.claims.clear();
    }

    pub fn claims(&self) -> &HashMap<String, String> {
        &self.claims
    }
}

impl AuthProvider for Session {
    fn current_user_id(&self) -> Option<String> {
        self.user_id().map(str::to_string)
    }
}
