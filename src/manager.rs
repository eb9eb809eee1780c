use std::sync::Arc;

use http::HeaderMap;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::headers::HeaderBuilder;
use crate::loss::{LossHandler, Navigator};
use crate::session::SessionValidator;
use crate::store::{CredentialStore, Storage};
use crate::token::{self, DecodedClaims};
use crate::types::{LossReason, SessionState, SubjectId, TokenSet, UserProfile};

/// Session and authenticated-request manager for one client ("tab").
///
/// Cheap to clone; clones share the same store, navigator and redirect latch.
///
/// ```rust,ignore
/// let session = SessionManager::new(storage, navigator, "/login");
///
/// // boot
/// let user = session.restore();
///
/// // login success
/// let profile = session.establish(tokens, "ann")?;
///
/// // route guard
/// if !session.validate_and_handle() {
///     return; // already redirected to /login?reason=...
/// }
/// ```
#[derive(Clone)]
pub struct SessionManager {
    store: CredentialStore,
    validator: SessionValidator,
    headers: HeaderBuilder,
    loss: LossHandler,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        let store = CredentialStore::new(storage);
        let loss = LossHandler::new(store.clone(), navigator, login_path);
        let validator = SessionValidator::new(store.clone(), loss.clone());
        let headers = HeaderBuilder::new(validator.clone());
        Self {
            store,
            validator,
            headers,
            loss,
        }
    }

    #[must_use]
    pub fn from_config(
        config: &ClientConfig,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::new(storage, navigator, config.login_path())
    }

    // ── Tokens & validity ──────────────────────────────────────────

    /// Bearer token for outgoing calls (`id_token` first).
    #[must_use]
    pub fn get_token(&self) -> Option<String> {
        self.validator.current_token()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validator.is_valid()
    }

    #[must_use]
    pub fn is_expired(&self, token: &str) -> bool {
        self.validator.is_expired(token)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.validator.state()
    }

    #[must_use]
    pub fn decode(&self, token: &str) -> Option<DecodedClaims> {
        token::decode(token)
    }

    /// See [`SessionValidator::validate_and_handle`].
    pub fn validate_and_handle(&self) -> bool {
        self.validator.validate_and_handle()
    }

    // ── Headers ────────────────────────────────────────────────────

    #[must_use]
    pub fn build_headers(&self, extra: &HeaderMap) -> HeaderMap {
        self.headers.build(extra)
    }

    #[must_use]
    pub fn header_builder(&self) -> &HeaderBuilder {
        &self.headers
    }

    // ── Store ──────────────────────────────────────────────────────

    pub fn save_tokens(&self, tokens: &TokenSet) -> bool {
        self.store.save_tokens(tokens)
    }

    pub fn save_profile(&self, profile: &UserProfile) -> bool {
        self.store.save_profile(profile)
    }

    /// Cached profile of the signed-in user.
    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.store.load_profile()
    }

    /// Subject id of the signed-in user, for "my content" queries.
    #[must_use]
    pub fn subject_id(&self) -> Option<SubjectId> {
        self.profile().map(|p| p.subject_id)
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Clear local state and redirect to login with `reason`.
    pub fn handle_loss(&self, reason: LossReason) -> bool {
        self.loss.handle(reason)
    }

    /// Record a successful login.
    ///
    /// The only place a [`TokenSet`] enters the store. The profile is read
    /// from the identity token (or the access token when no identity token
    /// was issued); `login_name` fills in a missing username or email.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] when the set has no bearer token, or its
    /// payload cannot be decoded, lacks `sub` or is already expired.
    /// Returns [`Error::Storage`] when either write fails.
    pub fn establish(&self, tokens: TokenSet, login_name: &str) -> Result<UserProfile, Error> {
        let bearer = tokens
            .bearer()
            .ok_or_else(|| Error::Token("login returned no identity or access token".into()))?;
        let claims = token::decode(bearer)
            .ok_or_else(|| Error::Token("login token payload is not decodable".into()))?;
        if token::is_expired(bearer) {
            return Err(Error::Token("login token is already expired".into()));
        }
        let profile = profile_from_claims(claims, login_name)?;

        if !self.store.save_tokens(&tokens) {
            return Err(Error::Storage("failed to persist tokens".into()));
        }
        if !self.store.save_profile(&profile) {
            self.store.clear();
            return Err(Error::Storage("failed to persist profile".into()));
        }

        self.loss.reset();
        tracing::info!(subject_id = %profile.subject_id, "Session established");
        Ok(profile)
    }

    /// Restore a prior session at boot.
    ///
    /// Returns the cached profile when a valid session is stored. Anything
    /// else is cleared, so the session starts `Absent`. An expired session
    /// is remembered as `session_expired`; the first
    /// [`validate_and_handle`](Self::validate_and_handle) redirects with it.
    pub fn restore(&self) -> Option<UserProfile> {
        let Some(tokens) = self.store.load_tokens() else {
            tracing::debug!("No stored session to restore");
            self.store.clear();
            return None;
        };
        if !tokens.is_usable() {
            tracing::info!("Stored token set is unusable, clearing");
            self.store.clear();
            return None;
        }
        let Some(profile) = self.store.load_profile() else {
            tracing::info!("Stored session has no profile, clearing");
            self.store.clear();
            return None;
        };
        if !self.is_valid() {
            tracing::info!("Stored session is expired, clearing");
            self.store.clear();
            self.loss.remember(LossReason::SessionExpired);
            return None;
        }

        tracing::info!(subject_id = %profile.subject_id, "Session restored");
        Some(profile)
    }

    /// Explicit sign-out: clear without redirecting.
    pub fn sign_out(&self) {
        self.store.clear();
        tracing::info!("Signed out");
    }
}

fn profile_from_claims(claims: DecodedClaims, login_name: &str) -> Result<UserProfile, Error> {
    let subject_id = claims
        .sub()
        .map(|s| SubjectId(s.to_owned()))
        .ok_or_else(|| Error::Token("login token has no sub claim".into()))?;

    let username = claims
        .cognito_username()
        .or_else(|| claims.username())
        .unwrap_or(login_name)
        .to_owned();

    let email = claims
        .email()
        .map(str::to_owned)
        .or_else(|| login_name.contains('@').then(|| login_name.to_owned()));

    let mut profile = UserProfile::new(username, subject_id).with_raw_claims(claims.into_map());
    profile.email = email;
    Ok(profile)
}
