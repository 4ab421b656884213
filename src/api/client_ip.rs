use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, header},
};
use std::net::SocketAddr;

use crate::services::ClientInfo;

const USER_AGENT_KEY_CHARS: usize = 50;

/// Resolves the caller's address.
///
/// Forwarding headers are only believed when the socket peer is one of
/// `trusted_proxies`. Returns `None` when no peer address is known.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: &[String],
) -> Option<String> {
    let peer_ip = peer.map(|addr| addr.ip().to_string());

    let behind_proxy = peer_ip
        .as_ref()
        .is_some_and(|ip| trusted_proxies.iter().any(|p| p == ip));

    if behind_proxy {
        let forwarded = header_str(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }

        if let Some(ip) = header_str(headers, "x-real-ip")
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return Some(ip.to_string());
        }
    }

    peer_ip
}

/// Inbound rate-limit key: `{ip}:{user agent prefix}`.
pub fn rate_limit_key(ip: Option<&str>, headers: &HeaderMap) -> String {
    let agent: String = header_str(headers, header::USER_AGENT.as_str())
        .map(|ua| ua.chars().take(USER_AGENT_KEY_CHARS).collect())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}:{agent}", ip.unwrap_or("unknown"))
}

pub fn peer_addr(extensions: &axum::http::Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

pub fn client_info(
    headers: &HeaderMap,
    extensions: &axum::http::Extensions,
    trusted_proxies: &[String],
) -> ClientInfo {
    ClientInfo {
        ip: resolve_client_ip(headers, peer_addr(extensions), trusted_proxies),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
