//! Session state.
//!
//! [`SessionState`] is the single authority for "who is signed in". It owns
//! the bearer token and user profile, persists them through a
//! [`SessionStore`], and broadcasts a [`SessionEvent`] whenever the session
//! is established or cleared.
//!
//! Every transition also bumps a monotonically increasing *epoch*. Anything
//! scoped to a session (cart contents, in-flight requests) records the epoch
//! it started under and treats a different epoch as "that session is gone".

pub mod error;
pub mod store;

use std::future::Future;

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use tracing::instrument;

use shopfront_core::Email;

pub use error::AuthError;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError, StoredSession};

use crate::api::ApiError;
use crate::types::{AuthResponse, RegisterRequest, UpdateProfileRequest, User};

const EVENT_CAPACITY: usize = 16;

// =============================================================================
// Types
// =============================================================================

/// Login credentials.
#[derive(Debug)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}

impl Credentials {
    /// Validate the email locally before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email is malformed.
    pub fn new(email: &str, password: impl Into<String>) -> Result<Self, AuthError> {
        Ok(Self {
            email: Email::parse(email)?,
            password: SecretString::from(password.into()),
        })
    }
}

/// An authenticated session.
#[derive(Debug)]
pub struct Session {
    token: SecretString,
    user: User,
}

impl Session {
    /// Bearer token sent with authenticated requests.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    /// The signed-in user.
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            token: SecretString::from(self.token.expose_secret().to_owned()),
            user: self.user.clone(),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// The user signed out.
    SignedOut,
    /// The backend rejected the token.
    Rejected,
}

/// Session transitions, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user signed in (or a persisted session was restored).
    Established { user: User, epoch: u64 },
    /// The session ended.
    Cleared { reason: ClearReason, epoch: u64 },
}

impl SessionEvent {
    /// Epoch the session moved to.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        match self {
            Self::Established { epoch, .. } | Self::Cleared { epoch, .. } => *epoch,
        }
    }
}

/// Backend operations the session needs.
pub trait Authenticator: Send + Sync {
    /// Exchange credentials for a token.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AuthResponse, ApiError>> + Send;

    /// Create an account.
    fn register(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// Revoke a token server-side.
    fn logout(&self, token: &SecretString) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Fetch the signed-in user's profile.
    fn profile(&self) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// Update the signed-in user's profile.
    fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> impl Future<Output = Result<User, ApiError>> + Send;
}

// =============================================================================
// SessionState
// =============================================================================

struct Inner {
    session: Option<Session>,
    epoch: u64,
}

/// Process-wide session authority.
pub struct SessionState {
    inner: RwLock<Inner>,
    events: broadcast::Sender<SessionEvent>,
    store: Box<dyn SessionStore>,
}

impl SessionState {
    /// Create an empty session backed by `store`. Call [`Self::restore`] to
    /// pick up a persisted session.
    pub fn new(store: impl SessionStore + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                session: None,
                epoch: 0,
            }),
            events,
            store: Box::new(store),
        }
    }

    /// A session that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemorySessionStore::new())
    }

    /// Load the persisted session, if any. Corrupt storage is purged and
    /// treated as signed out.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read at all.
    pub fn restore(&self) -> Result<Option<User>, StoreError> {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!(error = %e, "Discarding corrupt persisted session");
                self.store.purge()?;
                None
            }
            Err(e) => return Err(e),
        };

        let Some(stored) = stored else {
            return Ok(None);
        };
        let user = stored.user.clone();
        self.replace(Session {
            token: SecretString::from(stored.token),
            user: stored.user,
        });
        tracing::info!(user_id = %user.id, "Restored persisted session");
        Ok(Some(user))
    }

    /// Sign in. On failure the current session is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the backend rejects the
    /// credentials, or another variant for network and storage failures.
    #[instrument(skip(self, auth, credentials), fields(email = %credentials.email))]
    pub async fn establish<A: Authenticator>(
        &self,
        auth: &A,
        credentials: &Credentials,
    ) -> Result<User, AuthError> {
        let response = auth
            .login(credentials)
            .await
            .map_err(AuthError::from_login)?;

        let user = response.user.clone();
        self.install(response.user, SecretString::from(response.token))?;
        tracing::info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    /// Persist and activate a session obtained elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted; the previous
    /// session then stays active.
    pub fn install(&self, user: User, token: SecretString) -> Result<u64, StoreError> {
        self.store.save(&StoredSession {
            token: token.expose_secret().to_owned(),
            user: user.clone(),
        })?;
        Ok(self.replace(Session { token, user }))
    }

    /// Create an account. The current session, if any, is unaffected and
    /// the new account is not signed in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed email, or the mapped
    /// backend error (e.g. the email is already registered).
    #[instrument(skip(self, auth, request), fields(email = %request.email))]
    pub async fn register<A: Authenticator>(
        &self,
        auth: &A,
        request: &RegisterRequest,
    ) -> Result<User, AuthError> {
        Email::parse(&request.email)?;
        let user = auth.register(request).await?;
        tracing::info!(user_id = %user.id, "Registered account");
        Ok(user)
    }

    /// Revoke the token server-side (best effort), then clear locally.
    #[instrument(skip_all)]
    pub async fn logout<A: Authenticator>(&self, auth: &A) {
        if let Some(session) = self.current() {
            if let Err(e) = auth.logout(session.token()).await {
                tracing::warn!(error = %e, "Server-side logout failed, clearing locally");
            }
        }
        self.clear();
    }

    /// End the session. Idempotent.
    pub fn clear(&self) {
        self.end(ClearReason::SignedOut, None);
    }

    /// End the session because the backend rejected its token, but only if
    /// it is still the session that was active at `epoch`.
    ///
    /// Returns whether a session was cleared.
    pub fn invalidate(&self, epoch: u64) -> bool {
        self.end(ClearReason::Rejected, Some(epoch))
    }

    /// Re-fetch the profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a session, or the mapped
    /// backend error.
    pub async fn refresh_profile<A: Authenticator>(&self, auth: &A) -> Result<User, AuthError> {
        let epoch = self.require_epoch()?;
        let user = auth.profile().await?;
        self.update_user(epoch, &user)?;
        Ok(user)
    }

    /// Update the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a session, or the mapped
    /// backend error.
    pub async fn update_profile<A: Authenticator>(
        &self,
        auth: &A,
        request: &UpdateProfileRequest,
    ) -> Result<User, AuthError> {
        let epoch = self.require_epoch()?;
        let user = auth.update_profile(request).await?;
        self.update_user(epoch, &user)?;
        Ok(user)
    }

    /// Snapshot of the active session.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.inner.read().session.clone()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.read().session.as_ref().map(|s| s.user.clone())
    }

    /// The active session together with the epoch it belongs to.
    #[must_use]
    pub fn snapshot(&self) -> (Option<Session>, u64) {
        let inner = self.inner.read();
        (inner.session.clone(), inner.epoch)
    }

    /// Current epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.read().epoch
    }

    /// Current epoch, if a session is active.
    #[must_use]
    pub fn active_epoch(&self) -> Option<u64> {
        let inner = self.inner.read();
        inner.session.as_ref().map(|_| inner.epoch)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.read().session.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.inner
            .read()
            .session
            .as_ref()
            .is_some_and(|s| s.user.role.is_admin())
    }

    /// Subscribe to session transitions.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_epoch(&self) -> Result<u64, AuthError> {
        self.active_epoch().ok_or(AuthError::NotSignedIn)
    }

    fn replace(&self, session: Session) -> u64 {
        let user = session.user.clone();
        let epoch = {
            let mut inner = self.inner.write();
            inner.epoch += 1;
            inner.session = Some(session);
            inner.epoch
        };
        let _ = self.events.send(SessionEvent::Established { user, epoch });
        epoch
    }

    fn end(&self, reason: ClearReason, expected_epoch: Option<u64>) -> bool {
        let epoch = {
            let mut inner = self.inner.write();
            if inner.session.is_none() || expected_epoch.is_some_and(|e| e != inner.epoch) {
                return false;
            }
            inner.session = None;
            inner.epoch += 1;
            inner.epoch
        };

        if let Err(e) = self.store.purge() {
            tracing::warn!(error = %e, "Failed to purge persisted session");
        }
        match reason {
            ClearReason::SignedOut => tracing::info!("Signed out"),
            ClearReason::Rejected => tracing::warn!("Session rejected by the server, signed out"),
        }
        let _ = self.events.send(SessionEvent::Cleared { reason, epoch });
        true
    }

    fn update_user(&self, epoch: u64, user: &User) -> Result<(), StoreError> {
        let token = {
            let mut inner = self.inner.write();
            if inner.epoch != epoch {
                tracing::debug!("Session changed while fetching profile, not applying it");
                return Ok(());
            }
            let Some(session) = inner.session.as_mut() else {
                return Ok(());
            };
            session.user = user.clone();
            session.token.expose_secret().to_owned()
        };
        self.store.save(&StoredSession {
            token,
            user: user.clone(),
        })
    }
}
