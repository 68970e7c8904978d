//! Proxy representation and status.

use chrono::{DateTime, Utc};

/// Health status of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    /// The proxy is eligible for selection.
    Active,
    /// The proxy reached the failure threshold and is skipped by selection.
    Inactive,
}

/// Representation of an upstream proxy server, keyed by `(host, port)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    /// Hostname or IP address of the proxy.
    pub host: String,
    /// Port of the proxy.
    pub port: u16,
    /// Username for basic auth, if any.
    pub username: Option<String>,
    /// Password for basic auth, if any.
    pub password: Option<String>,
    /// The current health status of the proxy.
    pub status: ProxyStatus,
    /// Time the pool last handed this proxy out; `None` if never selected.
    pub last_used: Option<DateTime<Utc>>,
    /// Consecutive failures since the last reset.
    pub failure_count: u32,
}

impl Proxy {
    /// Create a new active proxy without credentials.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            status: ProxyStatus::Active,
            last_used: None,
            failure_count: 0,
        }
    }

    /// Attach credentials to the proxy. Empty strings are treated as absent.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into()).filter(|u| !u.is_empty());
        self.password = Some(password.into()).filter(|p| !p.is_empty());
        self
    }

    /// Whether this proxy is identified by the given key.
    pub fn matches(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }

    /// Whether the proxy is eligible for selection.
    pub fn is_active(&self) -> bool {
        self.status == ProxyStatus::Active
    }

    /// The `host:port` authority, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Convert the proxy to a reqwest::Proxy routing all schemes through it.
    /// Basic auth is applied only when both username and password are set.
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        let proxy = reqwest::Proxy::all(format!("http://{}", self.address()))?;
        Ok(match (&self.username, &self.password) {
            (Some(username), Some(password)) => proxy.basic_auth(username, password),
            _ => proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_proxy_is_active_and_unused() {
        let proxy = Proxy::new("10.0.0.1", 8080);
        assert!(proxy.is_active());
        assert_eq!(proxy.failure_count, 0);
        assert!(proxy.last_used.is_none());
        assert!(proxy.matches("10.0.0.1", 8080));
        assert!(!proxy.matches("10.0.0.1", 8081));
    }

    #[test]
    fn empty_credentials_are_dropped() {
        let proxy = Proxy::new("10.0.0.1", 8080).with_credentials("", "secret");
        assert_eq!(proxy.username, None);
        assert_eq!(proxy.password.as_deref(), Some("secret"));
    }

    #[test]
    fn address_brackets_ipv6() {
        assert_eq!(Proxy::new("proxy.local", 3128).address(), "proxy.local:3128");
        assert_eq!(Proxy::new("::1", 3128).address(), "[::1]:3128");
        assert!(Proxy::new("::1", 3128).to_reqwest_proxy().is_ok());
    }
}
