use std::sync::{Arc, PoisonError, RwLock};

use crawlwatch_logging::{cw_info, cw_warn};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    #[default]
    Anonymous,
    Active,
    /// The backend answered 401; whoever owns login decides what happens next.
    Expired,
}

/// Credentials for one operator session, passed explicitly to every
/// component that talks to the backend.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    token: RwLock<Option<String>>,
    status: watch::Sender<AuthStatus>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (status, _) = watch::channel(AuthStatus::Anonymous);
        Self {
            inner: Arc::new(SessionInner {
                token: RwLock::new(None),
                status,
            }),
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.acquire(token);
        session
    }

    pub fn acquire(&self, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            cw_warn!("Ignoring empty session token");
            return;
        }
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
        self.inner.status.send_replace(AuthStatus::Active);
        cw_info!("Session acquired");
    }

    pub fn clear(&self) {
        self.inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.status.send_replace(AuthStatus::Anonymous);
        cw_info!("Session cleared");
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> AuthStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.inner.status.subscribe()
    }

    /// Signals a 401 from `endpoint`. The token is left in place: tearing the
    /// session down belongs to the auth owner, not to this crate.
    pub fn report_auth_expired(&self, endpoint: &str) {
        cw_warn!("Backend rejected session credentials on {}", endpoint);
        self.inner.status.send_replace(AuthStatus::Expired);
    }

    pub(crate) fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
