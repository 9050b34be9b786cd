//! Client Identity Module
//!
//! Derives the rate limit identity of an incoming request.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};

/// Identity used when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Client address as resolved by an upstream layer (for example a trusted
/// proxy resolver). Takes precedence over the socket address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Authenticated user id, inserted by the authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

// == Client IP ==
/// Resolves the client address of `request`.
///
/// Precedence: first `X-Forwarded-For` entry, then the [`ClientIp`]
/// extension, then the socket address from `ConnectInfo`, then `"unknown"`.
/// Deployments may sit behind any number of proxies, so each source is
/// optional.
pub fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = forwarded_for(request) {
        return forwarded.to_string();
    }

    let extensions = request.extensions();
    if let Some(ClientIp(ip)) = extensions.get::<ClientIp>() {
        return ip.to_string();
    }
    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

fn forwarded_for(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
}

/// Authenticated user id of `request`, if any.
pub fn authenticated_user(request: &Request) -> Option<&str> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0.as_str())
}
