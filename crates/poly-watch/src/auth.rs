//! Session credential collaborator.
//!
//! The stream client only ever reads the current bearer token and, on a
//! server-signaled auth rejection, asks the store to invalidate it. How
//! tokens are obtained (the OTP login flow) is outside this client.

use parking_lot::RwLock;
use tracing::info;

/// Boundary to the session credential owner.
pub trait CredentialStore: Send + Sync {
    /// Current bearer token, if a session exists.
    fn token(&self) -> Option<String>;

    /// Invalidate the session. Called when the server rejects the
    /// credential; never called for transient connection failures.
    fn logout(&self);
}

/// In-memory credential store, loaded from the environment.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.is_empty())),
        }
    }

    /// Read the token from an environment variable (absent or empty
    /// means no session).
    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn logout(&self) {
        let mut token = self.token.write();
        if token.take().is_some() {
            info!("session credential invalidated");
        }
    }
}
