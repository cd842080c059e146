//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable for [`ServerConfig::bind`].
pub const ENV_BIND: &str = "SOULLINK_BIND";
/// Environment variable for [`ServerConfig::handshake_timeout`], in seconds.
pub const ENV_HANDSHAKE_TIMEOUT: &str = "SOULLINK_HANDSHAKE_TIMEOUT_SECS";
/// Environment variable for [`ServerConfig::idle_timeout`], in seconds.
pub const ENV_IDLE_TIMEOUT: &str = "SOULLINK_IDLE_TIMEOUT_SECS";

/// A configuration value that couldn't be used.
#[derive(Debug, thiserror::Error)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// How the server listens and how long it waits on clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    ///
    /// Default: `127.0.0.1:8080`.
    pub bind: String,

    /// How long a new connection has to send its handshake.
    ///
    /// Default: 5 seconds.
    pub handshake_timeout: Duration,

    /// A connection that sends nothing for this long is closed. Clients
    /// keep it open with heartbeats.
    ///
    /// Default: 15 seconds.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
        }
    }
}

impl ServerConfig {
    pub fn with_bind(mut self, addr: impl Into<String>) -> Self {
        self.bind = addr.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Defaults overridden by `SOULLINK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(bind) = lookup(ENV_BIND) {
            let bind = bind.trim();
            if bind.is_empty() {
                return Err(ConfigError {
                    var: ENV_BIND,
                    value: bind.to_string(),
                    reason: "must not be empty".into(),
                });
            }
            config.bind = bind.to_string();
        }
        if let Some(value) = lookup(ENV_HANDSHAKE_TIMEOUT) {
            config.handshake_timeout = parse_secs(ENV_HANDSHAKE_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_IDLE_TIMEOUT) {
            config.idle_timeout = parse_secs(ENV_IDLE_TIMEOUT, &value)?;
        }
        Ok(config)
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError {
        var,
        value: value.to_string(),
        reason,
    };
    let secs: u64 = value.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    if secs == 0 {
        return Err(invalid("must be at least 1 second".into()));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_from_lookup_without_vars_is_default() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides_each_field() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_HANDSHAKE_TIMEOUT, "2"),
            (ENV_IDLE_TIMEOUT, " 60 "),
        ]))
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.handshake_timeout, Duration::from_secs(2));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_lookup_rejects_bad_timeouts() {
        let err = ServerConfig::from_lookup(lookup(&[(ENV_IDLE_TIMEOUT, "soon")])).unwrap_err();
        assert_eq!(err.var, ENV_IDLE_TIMEOUT);

        let err = ServerConfig::from_lookup(lookup(&[(ENV_HANDSHAKE_TIMEOUT, "0")])).unwrap_err();
        assert!(err.to_string().contains("at least 1 second"));
    }

    #[test]
    fn test_builder_setters() {
        let config = ServerConfig::default()
            .with_bind("127.0.0.1:0")
            .with_idle_timeout(Duration::from_millis(300));
        assert_eq!(config.bind, "127.0.0.1:0");
        assert_eq!(config.idle_timeout, Duration::from_millis(300));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
    }
}
