//! The auth gateway: one per client connection.
//!
//! The gateway is the only thing that knows who is signed in. It wraps an
//! [`IdentityProvider`] (accounts) and a [`TableStore`] (profile handles),
//! and publishes the current [`Identity`] on a `tokio::sync::watch`
//! channel that downstream components read.
//!
//! ```text
//!            sign_in / sign_up / resume / sign_out / enter_guest
//!                               │
//!                               ▼
//!   ┌──────────────── AuthGateway ────────────────┐
//!   │  watch::Sender<Option<Identity>>            │
//!   └────────────┬───────────────────┬────────────┘
//!                │ current()         │ subscribe()
//!                ▼                   ▼
//!         request handler      IdentityWatch (notifier, views)
//! ```
//!
//! There's no global "current user": each connection builds its own
//! gateway and passes it to whatever needs the identity.

use std::sync::Arc;

use soullink_protocol::{Identity, IdentityKind};
use soullink_store::{Profile, StoreError, TableStore, constraints};
use tokio::sync::{Mutex, watch};

use crate::{AuthError, AuthUser, IdentityProvider};

/// Longest display handle accepted at sign-up.
pub const MAX_HANDLE_LEN: usize = 32;

/// A receiver for identity changes.
///
/// Dropping it unsubscribes.
pub struct IdentityWatch {
    receiver: watch::Receiver<Option<Identity>>,
}

impl IdentityWatch {
    /// The identity as of the last [`changed`](Self::changed) call.
    pub fn current(&self) -> Option<Identity> {
        self.receiver.borrow().clone()
    }

    /// Waits until the identity changes and returns the new value.
    ///
    /// Returns `None` once the gateway is dropped.
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

/// Per-connection authentication state.
pub struct AuthGateway<P: IdentityProvider, S: TableStore> {
    provider: Arc<P>,
    store: S,
    current: watch::Sender<Option<Identity>>,
    /// Access token of the signed-in account. Guests have none.
    token: Mutex<Option<String>>,
}

impl<P: IdentityProvider, S: TableStore> AuthGateway<P, S> {
    /// A signed-out gateway.
    pub fn new(provider: Arc<P>, store: S) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            provider,
            store,
            current,
            token: Mutex::new(None),
        }
    }

    /// The signed-in identity, account or guest.
    pub fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// The signed-in *account*.
    ///
    /// # Errors
    /// [`AuthError::Unauthenticated`] when signed out or in guest mode,
    /// since guests have no server-side record to act on.
    pub fn require_account(&self) -> Result<Identity, AuthError> {
        match self.current() {
            Some(identity) if !identity.is_guest() => Ok(identity),
            _ => Err(AuthError::Unauthenticated),
        }
    }

    /// Starts watching the current identity.
    pub fn subscribe(&self) -> IdentityWatch {
        IdentityWatch {
            receiver: self.current.subscribe(),
        }
    }

    /// Signs in with email and password.
    ///
    /// Returns the identity and the access token to keep for
    /// [`resume`](Self::resume).
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Identity, String), AuthError> {
        let creds = self.provider.sign_in(email, password).await?;
        let identity = match self.identity_for(&creds.user).await {
            Ok(identity) => identity,
            Err(e) => {
                // Don't leave a live token behind for an identity we refused.
                let _ = self.provider.sign_out(&creds.access_token).await;
                return Err(e);
            }
        };

        self.set(Some(identity.clone()), Some(creds.access_token.clone())).await;
        tracing::info!(user_id = %identity.id, handle = %identity.handle, "signed in");
        Ok((identity, creds.access_token))
    }

    /// Creates an account with a unique display handle and signs it in.
    ///
    /// The handle is checked before the account is created, and the
    /// profile insert is unique on handle as well, so a sign-up that loses
    /// a race still reports [`AuthError::HandleTaken`].
    pub async fn sign_up(
        &self,
        handle: &str,
        email: &str,
        password: &str,
    ) -> Result<(Identity, String), AuthError> {
        let handle = validate_handle(handle)?;

        if self.store.profile_by_handle(&handle).await?.is_some() {
            return Err(AuthError::HandleTaken(handle));
        }

        let creds = self.provider.sign_up(email, password).await?;
        let profile = Profile::new(creds.user.id, handle.clone());
        match self.store.insert_profile(profile).await {
            Ok(()) => {}
            Err(e) => {
                let _ = self.provider.sign_out(&creds.access_token).await;
                return Err(match e {
                    StoreError::UniqueViolation { constraint }
                        if constraint == constraints::PROFILE_HANDLE =>
                    {
                        AuthError::HandleTaken(handle)
                    }
                    other => AuthError::Store(other),
                });
            }
        }

        let identity = Identity {
            id: creds.user.id,
            handle,
            email: Some(creds.user.email.clone()),
            kind: IdentityKind::Account,
        };
        self.set(Some(identity.clone()), Some(creds.access_token.clone())).await;
        tracing::info!(user_id = %identity.id, handle = %identity.handle, "signed up");
        Ok((identity, creds.access_token))
    }

    /// Restores a signed-in identity from an access token.
    pub async fn resume(&self, token: &str) -> Result<Identity, AuthError> {
        let user = self
            .provider
            .user_for_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let identity = self.identity_for(&user).await?;

        self.set(Some(identity.clone()), Some(token.to_string())).await;
        tracing::info!(user_id = %identity.id, "session resumed");
        Ok(identity)
    }

    /// Switches to a client-side guest identity.
    ///
    /// # Errors
    /// [`AuthError::InvalidInput`] if `identity` isn't a guest identity.
    pub async fn enter_guest(&self, identity: Identity) -> Result<(), AuthError> {
        if !identity.is_guest() {
            return Err(AuthError::InvalidInput(
                "expected a guest identity".into(),
            ));
        }
        self.sign_out().await?;
        tracing::debug!(guest_id = %identity.id, "entered guest mode");
        self.set(Some(identity), None).await;
        Ok(())
    }

    /// Signs out. Signing out while signed out is a no-op.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.token.lock().await.take();
        if let Some(token) = token {
            self.provider.sign_out(&token).await?;
        }
        if let Some(identity) = self.current() {
            tracing::info!(user_id = %identity.id, "signed out");
        }
        self.current.send_replace(None);
        Ok(())
    }

    async fn identity_for(&self, user: &AuthUser) -> Result<Identity, AuthError> {
        let profile = self
            .store
            .profile(user.id)
            .await?
            .ok_or(AuthError::ProfileMissing(user.id))?;
        Ok(Identity {
            id: user.id,
            handle: profile.handle,
            email: Some(user.email.clone()),
            kind: IdentityKind::Account,
        })
    }

    async fn set(&self, identity: Option<Identity>, token: Option<String>) {
        *self.token.lock().await = token;
        self.current.send_replace(identity);
    }
}

fn validate_handle(handle: &str) -> Result<String, AuthError> {
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(AuthError::InvalidInput("handle must not be empty".into()));
    }
    if handle.chars().count() > MAX_HANDLE_LEN {
        return Err(AuthError::InvalidInput(format!(
            "handle must be at most {MAX_HANDLE_LEN} characters"
        )));
    }
    Ok(handle.to_string())
}
