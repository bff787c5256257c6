//! Caller identity handed to the API client and the engagement controller.
//!
//! Sign-in itself happens elsewhere; this type only carries the resulting
//! bearer credential so gated operations can check for it locally before
//! touching the network.
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, PoisonError, RwLock};

/// Shared, cloneable handle to the current credential.
///
/// Clones observe the same credential, so signing out through one handle
/// immediately gates every component built with another.
#[derive(Clone, Default)]
pub struct Session {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl Session {
    /// A session with no credential.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::default();
        session.sign_in(token);
        session
    }

    /// Builds a session from `NEWSDECK_TOKEN`, falling back to `configured`.
    pub fn from_env_or(configured: Option<&str>) -> Self {
        match std::env::var("NEWSDECK_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
        {
            Some(token) => Self::with_token(token),
            None => match configured.filter(|t| !t.trim().is_empty()) {
                Some(token) => Self::with_token(token),
                None => Self::anonymous(),
            },
        }
    }

    pub fn sign_in(&self, token: impl Into<String>) {
        let secret = SecretString::from(token.into());
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(secret);
    }

    pub fn sign_out(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// `Authorization` header value, if signed in.
    pub(crate) fn bearer_header(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_has_no_header() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert!(session.bearer_header().is_none());
    }

    #[test]
    fn test_clones_share_credential() {
        let session = Session::anonymous();
        let other = session.clone();
        session.sign_in("abc");
        assert!(other.is_authenticated());
        assert_eq!(other.bearer_header().as_deref(), Some("Bearer abc"));

        other.sign_out();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_debug_hides_token() {
        let session = Session::with_token("very-secret");
        let debug = format!("{:?}", session);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("authenticated: true"));
    }

    #[test]
    fn test_blank_configured_token_is_anonymous() {
        // Only meaningful when the env var is unset in the test environment
        if std::env::var("NEWSDECK_TOKEN").is_err() {
            assert!(!Session::from_env_or(Some("   ")).is_authenticated());
            assert!(Session::from_env_or(Some("tok")).is_authenticated());
        }
    }
}
