use std::sync::{Arc, Weak};

/// Liveness owner for a view or page.
///
/// In-flight requests are never aborted. A continuation that arrives after
/// its view is gone must be dropped instead of applied, so the view keeps a
/// `Scope` and hands [`ScopeHandle`]s to its async work.
///
/// ```rust,ignore
/// let scope = Scope::new();
/// let handle = scope.handle();
/// spawn(async move {
///     let posts = posts.list::<Vec<Post>>(&query).await;
///     handle.run(|| view.show(posts));
/// });
/// ```
#[derive(Debug, Default)]
pub struct Scope {
    alive: Arc<()>,
}

/// Weak reference to a [`Scope`], safe to move into async continuations.
#[derive(Debug, Clone)]
pub struct ScopeHandle {
    alive: Weak<()>,
}

impl Scope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn handle(&self) -> ScopeHandle {
        ScopeHandle {
            alive: Arc::downgrade(&self.alive),
        }
    }
}

impl ScopeHandle {
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }

    /// Runs `f` only if the owning scope still exists.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if self.is_alive() {
            Some(f())
        } else {
            tracing::debug!("Dropping continuation for a closed scope");
            None
        }
    }
}
