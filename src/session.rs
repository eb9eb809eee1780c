use crate::loss::LossHandler;
use crate::store::CredentialStore;
use crate::token;
use crate::types::{LossReason, SessionState};

/// Answers "is there a usable session right now?".
///
/// [`is_valid`](Self::is_valid) is the one validity check; route guards,
/// header building and boot-time restore all go through it.
#[derive(Clone)]
pub struct SessionValidator {
    store: CredentialStore,
    loss: LossHandler,
}

impl SessionValidator {
    #[must_use]
    pub fn new(store: CredentialStore, loss: LossHandler) -> Self {
        Self { store, loss }
    }

    /// `id_token` if present, else `access_token`, else `None`.
    #[must_use]
    pub fn current_token(&self) -> Option<String> {
        let tokens = self.store.load_tokens()?;
        let token = tokens.bearer().map(str::to_owned);
        if token.is_none() {
            tracing::debug!("Stored token set carries no bearer token");
        }
        token
    }

    #[must_use]
    pub fn is_expired(&self, token: &str) -> bool {
        token::is_expired(token)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state() == SessionState::Valid
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state_at(token::now_unix())
    }

    /// Session state against a caller-supplied clock (epoch seconds).
    #[must_use]
    pub fn state_at(&self, now: i64) -> SessionState {
        match self.current_token() {
            None => SessionState::Absent,
            Some(t) if token::is_expired_at(&t, now) => SessionState::Expired,
            Some(_) => SessionState::Valid,
        }
    }

    /// Route-guard check.
    ///
    /// An absent or expired session is cleared and handed to the loss
    /// handler, and `false` is returned. A valid session returns `true`
    /// with no side effects. An absent session reports the reason the loss
    /// handler remembered (boot-time expiry), else `login_required`.
    pub fn validate_and_handle(&self) -> bool {
        match self.state() {
            SessionState::Valid => true,
            SessionState::Expired => {
                tracing::info!("Session token expired");
                self.loss.handle(LossReason::SessionExpired);
                false
            }
            SessionState::Absent => {
                tracing::debug!("No session token");
                let reason = self
                    .loss
                    .take_remembered()
                    .unwrap_or(LossReason::LoginRequired);
                self.loss.handle(reason);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::loss::MemoryNavigator;
    use crate::token::testing::{token_expiring_in, token_with};
    use crate::types::TokenSet;

    fn validator() -> (SessionValidator, CredentialStore, Arc<MemoryNavigator>) {
        let store = CredentialStore::in_memory();
        let nav = Arc::new(MemoryNavigator::new("/"));
        let loss = LossHandler::new(store.clone(), nav.clone(), "/login");
        (SessionValidator::new(store.clone(), loss), store, nav)
    }

    #[test]
    fn test_current_token_prefers_id_token() {
        let (v, store, _) = validator();
        store.save_tokens(&TokenSet::new("id", "access", ""));
        assert_eq!(v.current_token().as_deref(), Some("id"));
    }

    #[test]
    fn test_current_token_falls_back_to_access() {
        let (v, store, _) = validator();
        store.save_tokens(&TokenSet::new("", "access", "refresh"));
        assert_eq!(v.current_token().as_deref(), Some("access"));
    }

    #[test]
    fn test_current_token_absent() {
        let (v, store, _) = validator();
        assert_eq!(v.current_token(), None);
        store.save_tokens(&TokenSet::new("", "", "refresh"));
        assert_eq!(v.current_token(), None);
    }

    #[test]
    fn test_state_transitions() {
        let (v, store, _) = validator();
        assert_eq!(v.state(), SessionState::Absent);

        store.save_tokens(&TokenSet::new(token_expiring_in("s", 3600), "", ""));
        assert_eq!(v.state(), SessionState::Valid);
        assert!(v.is_valid());

        let far_future = token::now_unix() + 7200;
        assert_eq!(v.state_at(far_future), SessionState::Expired);
    }

    #[test]
    fn test_valid_id_token_is_checked_not_access_token() {
        let (v, store, _) = validator();
        let expired_id = token_expiring_in("s", -10);
        let live_access = token_expiring_in("s", 3600);
        store.save_tokens(&TokenSet::new(expired_id, live_access, ""));
        assert_eq!(v.state(), SessionState::Expired);
    }

    #[test]
    fn test_undecodable_token_is_expired() {
        let (v, store, _) = validator();
        store.save_tokens(&TokenSet::new("opaque-token", "", ""));
        assert_eq!(v.state(), SessionState::Expired);
        assert!(v.is_expired("opaque-token"));
    }

    #[test]
    fn test_validate_and_handle_valid_has_no_side_effects() {
        let (v, store, nav) = validator();
        let tokens = TokenSet::new(token_expiring_in("s", 3600), "", "");
        store.save_tokens(&tokens);

        assert!(v.validate_and_handle());
        assert_eq!(store.load_tokens(), Some(tokens));
        assert!(nav.redirects().is_empty());
    }

    #[test]
    fn test_validate_and_handle_absent_requires_login() {
        let (v, _, nav) = validator();
        assert!(!v.validate_and_handle());
        assert_eq!(nav.redirects(), vec!["/login?reason=login_required"]);
    }

    #[test]
    fn test_validate_and_handle_without_exp() {
        let (v, store, nav) = validator();
        store.save_tokens(&TokenSet::new(token_with(&serde_json::json!({"sub": "s"})), "", ""));
        assert!(!v.validate_and_handle());
        assert_eq!(store.load_tokens(), None);
        assert_eq!(nav.redirects(), vec!["/login?reason=session_expired"]);
    }

    #[test]
    fn test_validate_and_handle_uses_remembered_reason() {
        let (v, _, nav) = validator();
        v.loss.remember(LossReason::SessionExpired);

        assert!(!v.validate_and_handle());
        assert_eq!(nav.redirects(), vec!["/login?reason=session_expired"]);
    }
}
