//! The identity provider: who is this, and can they prove it?
//!
//! The tracker doesn't own accounts. Email/password sign-in, sign-up,
//! sign-out, and token lookup belong to an external provider, so the
//! tracker only defines the [`IdentityProvider`] trait and calls it.
//!
//! # Why a trait?
//!
//! The same gateway code then runs against:
//! - a hosted provider in production,
//! - [`MemoryIdentityProvider`] in the demo server and in tests,
//! - a mock that fails on purpose, in tests that need it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use sha2::{Digest, Sha256};
use soullink_protocol::UserId;
use tokio::sync::Mutex;

use crate::AuthError;

/// An authenticated account as the provider sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// What a successful sign-in or sign-up returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: AuthUser,
    /// Opaque bearer token; hand it to [`IdentityProvider::user_for_token`]
    /// to get the user back after a reconnect.
    pub access_token: String,
}

/// External collaborator for account authentication.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one provider is shared by every
/// connection task for the lifetime of the server.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Signs an existing account in.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`] for an unknown email or a wrong
    /// password; the two are not distinguished.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Credentials, AuthError>> + Send;

    /// Creates an account and signs it in.
    ///
    /// # Errors
    /// [`AuthError::EmailTaken`], or [`AuthError::InvalidInput`] for a
    /// malformed email or a password shorter than
    /// [`MIN_PASSWORD_LEN`].
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Credentials, AuthError>> + Send;

    /// Invalidates an access token. Unknown tokens are ignored.
    fn sign_out(&self, token: &str) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Resolves an access token to its account, if the token is live.
    fn user_for_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<AuthUser>, AuthError>> + Send;
}

/// Shortest password the provider accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

// ---------------------------------------------------------------------------
// MemoryIdentityProvider
// ---------------------------------------------------------------------------

struct Account {
    user: AuthUser,
    salt: String,
    /// Hex SHA-256 of `salt || password`.
    digest: String,
}

#[derive(Default)]
struct Accounts {
    /// Keyed by lower-cased email.
    by_email: HashMap<String, Account>,
    tokens: HashMap<String, UserId>,
}

impl Accounts {
    fn issue(&mut self, user: AuthUser) -> Credentials {
        let access_token = generate_token();
        self.tokens.insert(access_token.clone(), user.id);
        Credentials { user, access_token }
    }
}

/// An [`IdentityProvider`] that keeps accounts in memory.
///
/// Passwords are stored as salted SHA-256 digests, never in the clear.
/// Cloning shares the same accounts.
#[derive(Clone, Default)]
pub struct MemoryIdentityProvider {
    inner: Arc<Mutex<Accounts>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accounts.
    pub async fn account_count(&self) -> usize {
        self.inner.lock().await.by_email.len()
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        let mut accounts = self.inner.lock().await;
        let user = match accounts.by_email.get(&normalize_email(email)) {
            Some(account) if digest(&account.salt, password) == account.digest => {
                account.user.clone()
            }
            _ => return Err(AuthError::InvalidCredentials),
        };
        tracing::debug!(user_id = %user.id, "provider sign-in");
        Ok(accounts.issue(user))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut accounts = self.inner.lock().await;
        if accounts.by_email.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }

        let user = AuthUser {
            id: UserId::new(),
            email: email.clone(),
        };
        let salt = generate_token();
        let account = Account {
            user: user.clone(),
            digest: digest(&salt, password),
            salt,
        };
        accounts.by_email.insert(email, account);
        tracing::debug!(user_id = %user.id, "provider account created");
        Ok(accounts.issue(user))
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.inner.lock().await.tokens.remove(token);
        Ok(())
    }

    async fn user_for_token(&self, token: &str) -> Result<Option<AuthUser>, AuthError> {
        let accounts = self.inner.lock().await;
        let Some(id) = accounts.tokens.get(token) else {
            return Ok(None);
        };
        Ok(accounts
            .by_email
            .values()
            .find(|a| a.user.id == *id)
            .map(|a| a.user.clone()))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AuthError::InvalidInput(format!("`{email}` is not an email address"))),
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    to_hex(&hasher.finalize())
}

/// 128 random bits as 32 lowercase hex characters.
pub(crate) fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_is_32_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_digest_depends_on_salt() {
        assert_ne!(digest("aa", "hunter22"), digest("bb", "hunter22"));
        assert_eq!(digest("aa", "hunter22"), digest("aa", "hunter22"));
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = MemoryIdentityProvider::new();
        let created = provider.sign_up("Ash@Kanto.org", "pikachu").await.unwrap();
        assert_eq!(created.user.email, "ash@kanto.org");

        let signed_in = provider.sign_in("ash@kanto.org", "pikachu").await.unwrap();
        assert_eq!(signed_in.user.id, created.user.id);
        assert_ne!(signed_in.access_token, created.access_token);
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password_is_invalid_credentials() {
        let provider = MemoryIdentityProvider::new();
        provider.sign_up("ash@kanto.org", "pikachu").await.unwrap();

        let wrong = provider.sign_in("ash@kanto.org", "raichu").await.unwrap_err();
        let unknown = provider.sign_in("gary@kanto.org", "pikachu").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_duplicate_email_and_short_password() {
        let provider = MemoryIdentityProvider::new();
        provider.sign_up("ash@kanto.org", "pikachu").await.unwrap();

        let dup = provider.sign_up("ASH@kanto.org", "pikachu").await.unwrap_err();
        assert!(matches!(dup, AuthError::EmailTaken));

        let short = provider.sign_up("brock@kanto.org", "onix").await.unwrap_err();
        assert!(matches!(short, AuthError::InvalidInput(_)));

        let bad = provider.sign_up("not-an-email", "password").await.unwrap_err();
        assert!(matches!(bad, AuthError::InvalidInput(_)));
        assert_eq!(provider.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let provider = MemoryIdentityProvider::new();
        let creds = provider.sign_up("misty@kanto.org", "starmie").await.unwrap();
        assert!(provider.user_for_token(&creds.access_token).await.unwrap().is_some());

        provider.sign_out(&creds.access_token).await.unwrap();
        assert!(provider.user_for_token(&creds.access_token).await.unwrap().is_none());
    }
}
