//! Purpose: Recover the client-facing origin of a request that passed through a proxy.
//! Exports: `Origin`.
//! Role: Reads `X-Forwarded-*` headers for request logging behind a load balancer.
//! Invariants: Malformed header values are ignored, never rejected.
//! Invariants: Only the first (client-most) `X-Forwarded-For` hop is used.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use axum::http::header::HOST;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    pub client: Option<IpAddr>,
    pub scheme: String,
    pub host: Option<String>,
}

impl Origin {
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let client = header_str(headers, X_FORWARDED_FOR)
            .and_then(first_hop)
            .and_then(parse_client)
            .or_else(|| peer.map(|addr| addr.ip()));
        let scheme = header_str(headers, X_FORWARDED_PROTO)
            .and_then(first_hop)
            .map(|proto| proto.to_ascii_lowercase())
            .filter(|proto| proto == "http" || proto == "https")
            .unwrap_or_else(|| "http".to_string());
        let host = header_str(headers, X_FORWARDED_HOST)
            .and_then(first_hop)
            .or_else(|| header_str(headers, HOST.as_str()))
            .map(str::to_string);
        Self {
            client,
            scheme,
            host,
        }
    }

    pub fn client_display(&self) -> String {
        self.client
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn first_hop(value: &str) -> Option<&str> {
    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
}

fn parse_client(hop: &str) -> Option<IpAddr> {
    if let Ok(ip) = hop.parse::<IpAddr>() {
        return Some(ip);
    }
    // Some proxies append the client port.
    hop.parse::<SocketAddr>().ok().map(|addr| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::Origin;
    use axum::http::{HeaderMap, HeaderValue};
    use std::net::{IpAddr, SocketAddr};

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.5:40000".parse().expect("peer"))
    }

    #[test]
    fn falls_back_to_socket_and_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("localhost:8080"));
        let origin = Origin::resolve(&headers, peer());
        assert_eq!(origin.client, Some("10.0.0.5".parse::<IpAddr>().expect("ip")));
        assert_eq!(origin.scheme, "http");
        assert_eq!(origin.host.as_deref(), Some("localhost:8080"));
    }

    #[test]
    fn forwarded_headers_win() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("internal:8080"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-forwarded-proto", HeaderValue::from_static("HTTPS"));
        headers.insert(
            "x-forwarded-host",
            HeaderValue::from_static("ddmsence.urizone.net"),
        );
        let origin = Origin::resolve(&headers, peer());
        assert_eq!(origin.client_display(), "203.0.113.7");
        assert_eq!(origin.scheme, "https");
        assert_eq!(origin.host.as_deref(), Some("ddmsence.urizone.net"));
    }

    #[test]
    fn client_port_and_ipv6_are_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.2:5555"));
        let origin = Origin::resolve(&headers, None);
        assert_eq!(origin.client_display(), "198.51.100.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static("2001:db8::1"));
        let origin = Origin::resolve(&headers, None);
        assert_eq!(origin.client_display(), "2001:db8::1");
    }

    #[test]
    fn malformed_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("gopher"));
        let origin = Origin::resolve(&headers, peer());
        assert_eq!(origin.client_display(), "10.0.0.5");
        assert_eq!(origin.scheme, "http");

        let origin = Origin::resolve(&HeaderMap::new(), None);
        assert_eq!(origin.client_display(), "-");
        assert!(origin.host.is_none());
    }
}
