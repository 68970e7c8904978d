//! Error types for the proxy-rotator crate.

use thiserror::Error;

/// Error returned when no active proxy is available in the pool,
/// even after reactivating idle ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No proxy available in pool")]
pub struct NoProxyAvailable;

/// Reasons a proxy record is rejected before it reaches the pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidProxy {
    #[error("proxy host must not be empty")]
    EmptyHost,
    #[error("proxy port {0} is outside 1-65535")]
    PortOutOfRange(i64),
}
