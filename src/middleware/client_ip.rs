use axum::extract::connect_info::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Origin address of a request, used as the rate-limit key and recorded in audit rows.
///
/// With `trusted_proxy_depth == 0` forwarding headers are ignored and the socket peer is used.
pub fn client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted_proxy_depth: usize,
) -> Option<IpAddr> {
    if trusted_proxy_depth > 0 {
        if let Some(ip) = from_x_forwarded_for(headers, trusted_proxy_depth) {
            return Some(ip);
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.ip())
}

fn from_x_forwarded_for(headers: &HeaderMap, trusted_proxy_depth: usize) -> Option<IpAddr> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;

    let chain: Vec<IpAddr> = raw
        .split(',')
        .map(str::trim)
        .filter_map(parse_entry)
        .collect();

    if chain.is_empty() || trusted_proxy_depth > chain.len() {
        return None;
    }

    chain.get(chain.len() - trusted_proxy_depth).copied()
}

fn parse_entry(value: &str) -> Option<IpAddr> {
    IpAddr::from_str(value)
        .ok()
        .or_else(|| SocketAddr::from_str(value).ok().map(|addr| addr.ip()))
}
