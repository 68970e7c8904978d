//! Simple example of routing reqwest traffic through a proxy-rotator pool.

use proxy_rotator::{seed, Proxy, ProxyPool, ProxyPoolConfig, ProxyPoolMiddleware, ProxySelectionStrategy};
use reqwest_middleware::ClientBuilder;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ProxyPoolConfig::builder()
        .failure_threshold(3)
        .reactivation_cooldown(Duration::from_secs(300))
        .selection_strategy(ProxySelectionStrategy::Random)
        .request_timeout(Duration::from_secs(10))
        .retry_count(2)
        .build();
    let pool = Arc::new(ProxyPool::new(config));

    // `host:port[:user:pass]` per line, e.g. exported from a provider dashboard
    pool.extend(seed::parse_proxy_list(
        "127.0.0.1:3128\n127.0.0.1:8080:user:secret\n",
    ));
    pool.add_proxy(Proxy::new("localhost", 8888));

    let client = ClientBuilder::new(reqwest::Client::new())
        .with(ProxyPoolMiddleware::new(Arc::clone(&pool)))
        .build();

    println!("Sending request...");
    match client.get("http://httpbin.org/ip").send().await {
        Ok(response) => {
            println!("Status: {}", response.status());
            println!("Response: {}", response.text().await?);
        }
        Err(e) => println!("Request failed: {}", e),
    }

    let stats = pool.get_stats();
    println!(
        "Pool: {} total, {} active, {} inactive",
        stats.total, stats.active, stats.inactive
    );

    Ok(())
}
