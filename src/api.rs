//! Wire types shared by the HTTP service and its client.

use crate::error::InvalidProxy;
use crate::pool::PoolStats;
use crate::proxy::Proxy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON form of a proxy record.
///
/// `port` is kept wide so out-of-range values reach validation instead of failing to
/// decode. An unset `last_used` is written as the zero timestamp `0001-01-01T00:00:00Z`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProxyRecord {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, with = "zero_time")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fail_count: u32,
}

impl ProxyRecord {
    /// A record carrying only connection details, as submitted for an add.
    pub fn new(host: impl Into<String>, port: i64) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the basic-auth credentials; empty strings mean none.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }
}

impl From<&Proxy> for ProxyRecord {
    fn from(proxy: &Proxy) -> Self {
        Self {
            host: proxy.host.clone(),
            port: i64::from(proxy.port),
            username: proxy.username.clone().unwrap_or_default(),
            password: proxy.password.clone().unwrap_or_default(),
            is_active: proxy.is_active(),
            last_used: proxy.last_used,
            fail_count: proxy.failure_count,
        }
    }
}

/// Validates host and port; health fields of the record are ignored since the pool
/// owns them.
impl TryFrom<ProxyRecord> for Proxy {
    type Error = InvalidProxy;

    fn try_from(record: ProxyRecord) -> Result<Self, Self::Error> {
        let port = validate_key(&record.host, record.port)?;
        Ok(Proxy::new(record.host, port).with_credentials(record.username, record.password))
    }
}

/// Check a `(host, port)` key and narrow the port.
pub fn validate_key(host: &str, port: i64) -> Result<u16, InvalidProxy> {
    if host.is_empty() {
        return Err(InvalidProxy::EmptyHost);
    }
    match u16::try_from(port) {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(InvalidProxy::PortOutOfRange(port)),
    }
}

/// Identifies a proxy for remove requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyKey {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: i64,
}

/// Outcome of an external reachability check through a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: i64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    pub stats: PoolStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub proxies: Vec<ProxyRecord>,
    pub stats: PoolStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextResponse {
    pub proxy: ProxyRecord,
    pub stats: PoolStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PoolStats>,
}

mod zero_time {
    use chrono::{DateTime, Datelike, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const ZERO: &str = "0001-01-01T00:00:00Z";

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(at) => at.serialize(serializer),
            None => serializer.serialize_str(ZERO),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<DateTime<Utc>>::deserialize(deserializer)?;
        Ok(value.filter(|at| at.year() > 1))
    }
}
