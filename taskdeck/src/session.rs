//! Process-wide authentication session.
//!
//! The [`Session`] owns the bearer and refresh tokens. It is created once
//! with [`Session::init`], which reads the persisted tokens, and is shared
//! via `Arc` with the gateway (for the bearer header) and the mutation
//! pipeline (for sign-out on authorization failures). Nothing else reads
//! or writes the token keys.
//!
//! A background task started with [`Session::spawn_refresh_task`] renews
//! the tokens periodically. A failed renewal signs out immediately; it is
//! not retried.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;

use taskdeck_proto::auth::{Credentials, Registration, TokenPair};

use crate::cache::{KeyValueStore, StoreError};
use crate::gateway::{AuthApi, GatewayError};

/// Storage key of the bearer token.
pub const ACCESS_TOKEN_KEY: &str = "auth_token";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Default token renewal period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(14 * 60);

/// Whether the session currently holds credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Tokens are present.
    SignedIn,
    /// No tokens; the user must sign in.
    SignedOut,
}

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Tokens could not be persisted.
    #[error("could not persist credentials: {0}")]
    Store(#[from] StoreError),

    /// The authentication API rejected the call.
    #[error("authentication failed: {0}")]
    Auth(#[from] GatewayError),

    /// There is no refresh token to renew with.
    #[error("not signed in")]
    NotSignedIn,
}

/// Holder of the current credentials.
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    tokens: RwLock<Option<TokenPair>>,
    state_tx: watch::Sender<AuthState>,
}

impl Session {
    /// Creates the session from persisted tokens.
    ///
    /// Both keys must be present to start signed in. Unreadable storage is
    /// logged and treated as signed out.
    #[must_use]
    pub fn init(store: Arc<dyn KeyValueStore>) -> Self {
        let read = |key: &str| match store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                tracing::warn!(key, error = %err, "could not read persisted token");
                None
            }
        };
        let tokens = match (read(ACCESS_TOKEN_KEY), read(REFRESH_TOKEN_KEY)) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        };
        let state = if tokens.is_some() {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut
        };
        tracing::debug!(?state, "session initialized");

        let (state_tx, _) = watch::channel(state);
        Self {
            store,
            tokens: RwLock::new(tokens),
            state_tx,
        }
    }

    /// Stores `tokens` in memory and on disk.
    ///
    /// The in-memory session is updated even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the tokens could not be written.
    pub fn sign_in(&self, tokens: TokenPair) -> Result<(), SessionError> {
        let persisted = self
            .store
            .set(ACCESS_TOKEN_KEY, &tokens.access_token)
            .and_then(|()| self.store.set(REFRESH_TOKEN_KEY, &tokens.refresh_token));
        *self.tokens.write() = Some(tokens);
        self.state_tx.send_replace(AuthState::SignedIn);
        persisted.map_err(SessionError::from)
    }

    /// Clears the credentials in memory and on disk.
    pub fn sign_out(&self) {
        let had_tokens = self.tokens.write().take().is_some();
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(err) = self.store.remove(key) {
                tracing::warn!(key, error = %err, "could not clear persisted token");
            }
        }
        self.state_tx.send_replace(AuthState::SignedOut);
        if had_tokens {
            tracing::info!("signed out");
        }
    }

    /// The current bearer token.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.tokens.read().as_ref().map(|t| t.access_token.clone())
    }

    /// The current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.read().as_ref().map(|t| t.refresh_token.clone())
    }

    /// Whether credentials are present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.read().is_some()
    }

    /// The current [`AuthState`].
    #[must_use]
    pub fn state(&self) -> AuthState {
        *self.state_tx.borrow()
    }

    /// Observes sign-in and sign-out transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Auth`] if the credentials are rejected, or
    /// [`SessionError::Store`] if the tokens could not be persisted.
    pub async fn login<A: AuthApi>(
        &self,
        auth: &A,
        credentials: &Credentials,
    ) -> Result<(), SessionError> {
        let tokens = auth.login(credentials).await?;
        self.sign_in(tokens)
    }

    /// Creates an account and signs in.
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    pub async fn register<A: AuthApi>(
        &self,
        auth: &A,
        registration: &Registration,
    ) -> Result<(), SessionError> {
        let tokens = auth.register(registration).await?;
        self.sign_in(tokens)
    }

    /// Exchanges the refresh token for a fresh pair.
    ///
    /// Any failure, including a missing refresh token, signs out.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotSignedIn`] without a refresh token,
    /// [`SessionError::Auth`] if the API rejects it, or
    /// [`SessionError::Store`] if the new pair could not be persisted.
    pub async fn refresh<A: AuthApi>(&self, auth: &A) -> Result<(), SessionError> {
        let Some(refresh_token) = self.refresh_token() else {
            self.sign_out();
            return Err(SessionError::NotSignedIn);
        };
        match auth.refresh_token(&refresh_token).await {
            Ok(tokens) => {
                tracing::debug!("access token refreshed");
                self.sign_in(tokens)
            }
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, signing out");
                self.sign_out();
                Err(err.into())
            }
        }
    }

    /// Spawns a background task that calls [`refresh`](Self::refresh)
    /// every `interval` while signed in.
    ///
    /// The first renewal happens one full interval after spawning. The
    /// caller should abort the returned handle on shutdown.
    pub fn spawn_refresh_task<A: AuthApi + 'static>(
        self: &Arc<Self>,
        auth: Arc<A>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !session.is_authenticated() {
                    continue;
                }
                // Failure already signed out; the next sign-in resumes renewal.
                let _ = session.refresh(auth.as_ref()).await;
            }
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
