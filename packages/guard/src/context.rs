//! Caller context handed to the guards

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use serde_json::Value;
use tracing::debug;

/// What a guard needs to know about one inbound call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Network peer or forwarded client address
    pub client_ip: Option<String>,
    /// Authenticated caller id, if any
    pub user_id: Option<String>,
    /// The call's argument payload
    pub args: Value,
}

impl RequestContext {
    /// Empty context: no address, anonymous, no arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from request headers and the socket peer
    pub fn from_request(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        Self {
            client_ip: extract_client_ip(headers, peer, trust_proxy),
            ..Self::default()
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// First non-blank string argument among `fields`
    pub fn string_arg<'a>(&'a self, fields: &[String]) -> Option<&'a str> {
        fields
            .iter()
            .filter_map(|field| self.args.get(field).and_then(Value::as_str))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// Extract the client IP from proxy headers or the socket peer
///
/// `X-Forwarded-For` (first valid address) and `X-Real-IP` are only honoured
/// when `trust_proxy` is set; otherwise a caller could rotate them freely to
/// dodge per-IP limits.
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> Option<String> {
    if trust_proxy {
        // X-Forwarded-For can contain multiple IPs, take the first (client IP)
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| ip.parse::<IpAddr>().is_ok());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|ip| ip.parse::<IpAddr>().is_ok());
        if let Some(ip) = real_ip {
            return Some(ip.to_string());
        }
    }

    if let Some(peer) = peer {
        return Some(peer.ip().to_string());
    }

    debug!("Could not determine client IP");
    None
}
