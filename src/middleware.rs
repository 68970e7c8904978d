//! Middleware implementation for reqwest.

use crate::error::NoProxyAvailable;
use crate::pool::ProxyPool;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::sync::Arc;

/// Middleware that sends each request through a proxy selected from the pool.
///
/// Transport errors and `407 Proxy Authentication Required` count as failures for the
/// proxy and the request is retried through another selection, up to the pool's
/// `retry_count`. `502`/`504` responses are passed through without touching the proxy's
/// health; any other response counts as a success.
#[derive(Clone)]
pub struct ProxyPoolMiddleware {
    /// The proxy pool.
    pool: Arc<ProxyPool>,
}

impl ProxyPoolMiddleware {
    /// Create a new middleware drawing proxies from `pool`.
    pub fn new(pool: Arc<ProxyPool>) -> Self {
        let stats = pool.get_stats();
        info!(
            "Proxy pool middleware using {}/{} active proxies",
            stats.active, stats.total
        );
        if stats.active == 0 {
            warn!("No active proxies in pool");
        }
        Self { pool }
    }

    /// The pool this middleware draws from.
    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }
}

#[async_trait]
impl Middleware for ProxyPoolMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let config = self.pool.config();
        let max_retries = config.retry_count;
        let mut retry_count = 0;

        loop {
            let proxy = match self.pool.get_proxy() {
                Ok(proxy) => proxy,
                Err(NoProxyAvailable) => {
                    let stats = self.pool.get_stats();
                    warn!(
                        "No proxy available. Total: {}, Active: {}",
                        stats.total, stats.active
                    );
                    return Err(Error::Middleware(anyhow!(NoProxyAvailable)));
                }
            };

            let proxied_request = req.try_clone().ok_or_else(|| {
                Error::Middleware(anyhow!(
                    "Request object is not cloneable. Are you passing a streaming body?"
                ))
            })?;

            let address = proxy.address();
            info!("Using proxy: {} (attempt {})", address, retry_count + 1);

            let client = match proxy.to_reqwest_proxy().and_then(|reqwest_proxy| {
                reqwest::Client::builder()
                    .proxy(reqwest_proxy)
                    .timeout(config.request_timeout)
                    .build()
            }) {
                Ok(client) => client,
                Err(e) => {
                    warn!("Failed to build client with proxy {}: {}", address, e);
                    self.pool.report_proxy_failure(&proxy.host, proxy.port);
                    retry_count += 1;
                    if retry_count > max_retries {
                        return Err(Error::Reqwest(e));
                    }
                    continue;
                }
            };

            match client.execute(proxied_request).await {
                Ok(response) if response.status() == StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
                    warn!(
                        "Proxy {} rejected request with {} (attempt {})",
                        address,
                        response.status(),
                        retry_count + 1
                    );
                    self.pool.report_proxy_failure(&proxy.host, proxy.port);

                    retry_count += 1;
                    if retry_count > max_retries {
                        return Ok(response);
                    }
                }
                Ok(response) if is_gateway_error(response.status()) => {
                    // Could be the proxy hop or the origin; no health change either way.
                    debug!(
                        "Proxy {} returned {}, not counted as success",
                        address,
                        response.status()
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    self.pool.report_proxy_success(&proxy.host, proxy.port);
                    return Ok(response);
                }
                Err(err) => {
                    warn!(
                        "Request failed with proxy {} (attempt {}): {}",
                        address,
                        retry_count + 1,
                        err
                    );
                    self.pool.report_proxy_failure(&proxy.host, proxy.port);

                    retry_count += 1;
                    if retry_count > max_retries {
                        return Err(Error::Reqwest(err));
                    }
                }
            }
        }
    }
}

fn is_gateway_error(status: StatusCode) -> bool {
    status == StatusCode::BAD_GATEWAY || status == StatusCode::GATEWAY_TIMEOUT
}
