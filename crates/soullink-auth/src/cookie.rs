//! Client-side cookie storage for guest mode.
//!
//! Guests have no account, so whatever they want kept (their identity
//! marker and a roster pair) lives in cookies on their side. [`CookieJar`]
//! abstracts the browser's jar; [`MemoryCookieJar`] stands in for it in
//! tests and in native clients.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Where guest cookies are scoped and how long they live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestCookieConfig {
    /// Path prefix the cookies are visible under.
    ///
    /// Default: `/nuz`.
    pub path: String,

    /// Lifetime of a freshly written cookie.
    ///
    /// Default: 30 days.
    pub max_age: Duration,
}

impl Default for GuestCookieConfig {
    fn default() -> Self {
        Self {
            path: "/nuz".to_string(),
            max_age: Duration::days(30),
        }
    }
}

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    /// Raw value. Guest-mode values are base64url-encoded JSON.
    pub value: String,
    pub path: String,
    pub expires: DateTime<Utc>,
}

impl Cookie {
    /// A cookie that expires `config.max_age` from now.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        config: &GuestCookieConfig,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: config.path.clone(),
            expires: Utc::now() + config.max_age,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    /// Seconds until expiry, never negative.
    pub fn max_age_secs(&self) -> i64 {
        (self.expires - Utc::now()).num_seconds().max(0)
    }
}

/// Formats the cookie as a `Set-Cookie` header value.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path={}; Max-Age={}; Expires={}; SameSite=Lax",
            self.name,
            self.value,
            self.path,
            self.max_age_secs(),
            self.expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        )
    }
}

/// A key-value cookie store.
pub trait CookieJar {
    /// The named cookie, unless it is missing or expired.
    fn get(&self, name: &str) -> Option<&Cookie>;

    fn set(&mut self, cookie: Cookie);

    fn remove(&mut self, name: &str);
}

/// A [`CookieJar`] backed by a `HashMap`.
#[derive(Debug, Default, Clone)]
pub struct MemoryCookieJar {
    cookies: HashMap<String, Cookie>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live cookie names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let now = Utc::now();
        let mut names: Vec<&str> = self
            .cookies
            .values()
            .filter(|c| !c.is_expired_at(now))
            .map(|c| c.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies
            .get(name)
            .filter(|c| !c.is_expired_at(Utc::now()))
    }

    fn set(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie.name.clone(), cookie);
    }

    fn remove(&mut self, name: &str) {
        self.cookies.remove(name);
    }
}
