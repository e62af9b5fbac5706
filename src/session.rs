//! Per-browser authentication state.
//!
//! The signed-in identity lives in the `tower-sessions` store under
//! [`AUTH_SESSION`]. Changes are announced on the [`SessionBus`] so that
//! long-lived views (open transcripts) can react to a sign-out.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use tokio::sync::broadcast;
use tower_sessions::Session;

use crate::{
    AppResult,
    model::{AuthResponse, AuthSession},
};

pub const AUTH_SESSION: &str = "auth_session";
pub const RETURN_URL: &str = "return_url";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: i64 },
    SignedOut { user_id: i64 },
}

/// Fan-out of session changes to everything that holds on to an identity.
#[derive(Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    pub fn new(capacity: usize) -> Self {
        Self { tx: broadcast::channel(capacity).0 }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Resolves once `user_id` is signed out. Never resolves if the bus is gone.
pub async fn signed_out(rx: &mut broadcast::Receiver<SessionEvent>, user_id: i64) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::SignedOut { user_id: who }) if who == user_id => return,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

/// The session store of one browser, plus the bus it reports to.
#[derive(Clone)]
pub struct SessionStore {
    session: Session,
    bus: SessionBus,
}

impl SessionStore {
    pub fn new(session: Session, bus: SessionBus) -> Self {
        Self { session, bus }
    }

    pub fn bus(&self) -> &SessionBus {
        &self.bus
    }

    /// The signed-in identity, if any. A stored value that cannot be read
    /// back, or that carries no token, is discarded.
    pub async fn current(&self) -> AppResult<Option<AuthSession>> {
        match self.session.get::<AuthSession>(AUTH_SESSION).await {
            Ok(Some(auth)) if !auth.token.is_empty() => Ok(Some(auth)),
            Ok(None) => Ok(None),
            Ok(Some(_)) | Err(tower_sessions::session::Error::SerdeJson(_)) => {
                tracing::warn!("discarding unreadable stored session");
                self.session.remove_value(AUTH_SESSION).await?;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn sign_in(&self, response: AuthResponse) -> AppResult<AuthSession> {
        let auth = AuthSession::from(response);
        self.session.cycle_id().await?;
        self.session.insert(AUTH_SESSION, &auth).await?;

        tracing::info!(user_id = auth.user_id, username = %auth.username, "signed in");
        self.bus.publish(SessionEvent::SignedIn { user_id: auth.user_id });
        Ok(auth)
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        let previous = self.session.remove::<AuthSession>(AUTH_SESSION).await.ok().flatten();
        self.session.remove_value(RETURN_URL).await?;

        if let Some(auth) = previous {
            tracing::info!(user_id = auth.user_id, "signed out");
            self.bus.publish(SessionEvent::SignedOut { user_id: auth.user_id });
        }
        Ok(())
    }

    /// Writes pending changes to the store. Needed for changes made after the
    /// response has gone out, e.g. from a websocket task, which the session
    /// layer no longer sees.
    pub async fn persist(&self) -> AppResult<()> {
        if self.session.is_modified() {
            self.session.save().await?;
        }
        Ok(())
    }

    pub async fn set_return_url(&self, url: &str) -> AppResult<()> {
        self.session.insert(RETURN_URL, url).await?;
        Ok(())
    }

    pub async fn take_return_url(&self) -> AppResult<Option<String>> {
        Ok(self.session.remove::<String>(RETURN_URL).await?)
    }
}

impl<S> FromRequestParts<S> for SessionStore
where
    S: Send + Sync,
    SessionBus: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        Ok(Self::new(session, SessionBus::from_ref(state)))
    }
}
