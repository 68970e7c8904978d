//! # proxy-rotator
//!
//! A health-aware rotating pool of upstream proxies.
//!
//! The [`ProxyPool`] hands out one active proxy per request and tracks proxy health from
//! reported outcomes: proxies that fail repeatedly are taken out of rotation and brought
//! back on success, or when the pool would otherwise run dry. Around the pool the crate
//! ships an HTTP API, a client for it, and a reqwest middleware that routes requests
//! through the pool.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod seed;
pub mod server;

pub use client::{ClientError, RotatorClient};
pub use config::{ProxyPoolConfig, ProxyPoolConfigBuilder, ProxySelectionStrategy};
pub use error::{InvalidProxy, NoProxyAvailable};
pub use middleware::ProxyPoolMiddleware;
pub use pool::{AddOutcome, PoolStats, ProxyPool};
pub use proxy::{Proxy, ProxyStatus};
