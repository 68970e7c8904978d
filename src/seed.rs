//! Loading proxy lists used to seed the pool.

use crate::api::validate_key;
use crate::proxy::Proxy;

use log::warn;
use percent_encoding::percent_decode_str;
use std::path::Path;
use url::Url;

/// Read a proxy list from a file.
pub fn load_proxy_list(path: impl AsRef<Path>) -> std::io::Result<Vec<Proxy>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_proxy_list(&content))
}

/// Parse text content into proxies, one per line.
///
/// Accepted forms are `host:port`, `host:port:username:password` and
/// `http://[username:password@]host:port` with percent-encoded credentials. Blank lines
/// and `#` comments are skipped; malformed lines and other URL schemes are logged and
/// skipped.
pub fn parse_proxy_list(content: &str) -> Vec<Proxy> {
    content
        .lines()
        .enumerate()
        .filter_map(|(number, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let proxy = parse_line(line);
            if proxy.is_none() {
                warn!("Skipping malformed proxy on line {}: {}", number + 1, line);
            }
            proxy
        })
        .collect()
}

fn parse_line(line: &str) -> Option<Proxy> {
    if line.contains("://") {
        return parse_url(line);
    }

    let parts: Vec<&str> = line.split(':').collect();
    let (host, port, credentials) = match parts.as_slice() {
        [host, port] => (*host, *port, None),
        [host, port, username, password] => (*host, *port, Some((*username, *password))),
        _ => return None,
    };
    let port = validate_key(host, port.parse().ok()?).ok()?;

    let proxy = Proxy::new(host, port);
    Some(match credentials {
        Some((username, password)) => proxy.with_credentials(username, password),
        None => proxy,
    })
}

fn parse_url(line: &str) -> Option<Proxy> {
    let url = Url::parse(line).ok()?;
    // Pooled proxies are always spoken to as HTTP proxies.
    if url.scheme() != "http" {
        return None;
    }
    let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
    let port = validate_key(host, i64::from(url.port_or_known_default()?)).ok()?;

    let proxy = Proxy::new(host, port);
    if url.username().is_empty() {
        return Some(proxy);
    }
    let username = decode(url.username())?;
    let password = decode(url.password().unwrap_or_default())?;
    Some(proxy.with_credentials(username, password))
}

fn decode(component: &str) -> Option<String> {
    percent_decode_str(component)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
