//! Command line client for the proxy rotator service.

use anyhow::Result;
use clap::{Parser, Subcommand};
use proxy_rotator::api::ProxyRecord;
use proxy_rotator::{PoolStats, RotatorClient};

#[derive(Parser)]
#[command(name = "proxy-manager")]
#[command(about = "Manage proxies in a running proxy rotator", long_about = None)]
struct Cli {
    /// Base URL of the rotator service.
    #[arg(short, long, env = "ROTATOR_URL", default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a proxy, or update the credentials of a known one
    Add {
        host: String,
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
        username: Option<String>,
        password: Option<String>,
    },
    /// Remove a proxy
    Remove {
        host: String,
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
    },
    /// List all proxies
    List,
    /// Get the next proxy from the pool
    Next,
    /// Show pool statistics
    Stats,
    /// Report the outcome of a reachability check through a proxy
    Report {
        host: String,
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
        /// Record a failure instead of a success
        #[arg(long)]
        failed: bool,
        /// Error observed by the check
        #[arg(long)]
        error: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let client = RotatorClient::new(&cli.url)?;

    match cli.command {
        Commands::Add {
            host,
            port,
            username,
            password,
        } => {
            let record = ProxyRecord::new(host, i64::from(port)).with_credentials(
                username.unwrap_or_default(),
                password.unwrap_or_default(),
            );
            let response = client.add(&record).await?;
            println!("{}", response.message);
            print_stats(&response.stats);
        }
        Commands::Remove { host, port } => {
            let response = client.remove(&host, port).await?;
            println!("{}", response.message);
            print_stats(&response.stats);
        }
        Commands::List => {
            let response = client.list().await?;
            if response.proxies.is_empty() {
                println!("No proxies found");
            } else {
                print_table(&response.proxies);
            }
            print_stats(&response.stats);
        }
        Commands::Next => {
            let response = client.next().await?;
            let proxy = response.proxy;
            println!("Next proxy:");
            println!("Host: {}", proxy.host);
            println!("Port: {}", proxy.port);
            if !proxy.username.is_empty() {
                println!("Username: {}", proxy.username);
            }
            if !proxy.password.is_empty() {
                println!("Password: {}", proxy.password);
            }
            println!("Last Used: {}", format_last_used(&proxy));
            println!("Fail Count: {}", proxy.fail_count);
        }
        Commands::Stats => {
            print_stats(&client.stats().await?);
        }
        Commands::Report {
            host,
            port,
            failed,
            error,
        } => {
            let response = client.report(&host, port, !failed, error).await?;
            println!("{}", response.message);
            print_stats(&response.stats);
        }
    }

    Ok(())
}

fn print_stats(stats: &PoolStats) {
    println!(
        "Total: {}  Active: {}  Inactive: {}",
        stats.total, stats.active, stats.inactive
    );
}

fn format_last_used(proxy: &ProxyRecord) -> String {
    proxy
        .last_used
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Never".to_string())
}

fn print_table(proxies: &[ProxyRecord]) {
    let header = ["Host", "Port", "Status", "Last Used", "Fail Count"];
    let rows: Vec<[String; 5]> = proxies
        .iter()
        .map(|p| {
            [
                p.host.clone(),
                p.port.to_string(),
                if p.is_active { "Active" } else { "Inactive" }.to_string(),
                format_last_used(p),
                p.fail_count.to_string(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 5]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };
    line(header);
    for row in &rows {
        line(row.each_ref().map(String::as_str));
    }
}
