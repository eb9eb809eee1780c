use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::CredentialStore;
use crate::types::LossReason;

/// Client-side navigation, as seen by the loss handler.
pub trait Navigator: Send + Sync + 'static {
    /// Current location path, optionally with a query string.
    fn current_path(&self) -> String;

    /// Send the client to `location`.
    ///
    /// Called with the loss handler's latch held; must not call back into it.
    fn redirect(&self, location: &str);
}

/// Navigator that only records where it was sent.
///
/// Suits headless clients, where the UI layer polls
/// [`current_path`](Navigator::current_path), and tests.
#[derive(Debug)]
pub struct MemoryNavigator {
    inner: Mutex<NavigatorState>,
}

#[derive(Debug)]
struct NavigatorState {
    path: String,
    redirects: Vec<String>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(NavigatorState {
                path: start.into(),
                redirects: Vec::new(),
            }),
        }
    }

    /// Move without counting as a redirect (user navigation).
    pub fn visit(&self, path: impl Into<String>) {
        self.inner.lock().path = path.into();
    }

    /// Every location passed to [`redirect`](Navigator::redirect), oldest first.
    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        self.inner.lock().redirects.clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.inner.lock().path.clone()
    }

    fn redirect(&self, location: &str) {
        let mut state = self.inner.lock();
        state.path = location.to_owned();
        state.redirects.push(location.to_owned());
    }
}

/// Central reaction to "no usable session": clear, then send the client to login.
///
/// Several requests can notice the same expiry at once. The store clear is
/// idempotent, and the latch lets exactly one caller navigate until the
/// client reaches the login page or a new session is established.
#[derive(Clone)]
pub struct LossHandler {
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    latch: Arc<Mutex<Latch>>,
}

#[derive(Debug, Default)]
struct Latch {
    redirecting: bool,
    remembered: Option<LossReason>,
}

impl LossHandler {
    #[must_use]
    pub fn new(
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            navigator,
            login_path: login_path.into(),
            latch: Arc::new(Mutex::new(Latch::default())),
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Clear local credentials and redirect to login with `reason`.
    ///
    /// Returns `true` only for the call that actually issued the redirect.
    pub fn handle(&self, reason: LossReason) -> bool {
        // clear, location check, latch flip and redirect happen under one
        // lock: a redirect landing mid-burst cannot re-arm the latch for a
        // caller that looked before it landed, and a caller that saw the
        // cleared store queues behind the redirect it caused
        let mut latch = self.latch.lock();
        self.store.clear();
        if self.at_login() {
            latch.redirecting = false;
            tracing::debug!(reason = %reason, "Already at login, not redirecting");
            return false;
        }
        if latch.redirecting {
            tracing::debug!(reason = %reason, "Login redirect already in flight");
            return false;
        }
        latch.redirecting = true;
        latch.remembered = None;

        let location = self.login_location(reason);
        tracing::info!(reason = %reason, location = %location, "Session lost, redirecting to login");
        self.navigator.redirect(&location);
        true
    }

    /// Re-arm after a new session is established.
    pub fn reset(&self) {
        let mut latch = self.latch.lock();
        latch.redirecting = false;
        latch.remembered = None;
    }

    /// Keep `reason` for a later redirect, after the session it describes
    /// was cleared without one (an expired session dropped at boot).
    pub fn remember(&self, reason: LossReason) {
        self.latch.lock().remembered = Some(reason);
    }

    /// Take the reason kept by [`remember`](Self::remember), if any.
    pub fn take_remembered(&self) -> Option<LossReason> {
        self.latch.lock().remembered.take()
    }

    /// `<login_path>?reason=<code>`.
    #[must_use]
    pub fn login_location(&self, reason: LossReason) -> String {
        format!(
            "{}?reason={}",
            self.login_path,
            urlencoding::encode(reason.as_str())
        )
    }

    fn at_login(&self) -> bool {
        let current = self.navigator.current_path();
        let path = current.split(['?', '#']).next().unwrap_or_default();
        path == self.login_path
    }
}
