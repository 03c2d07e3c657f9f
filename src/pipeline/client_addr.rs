use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;

/// The genuine caller's address, recovered before admission control so
/// the limiter keys on the client and not on a proxy in front of it.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

pub async fn extract_client_addr(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Response {
    let addr = real_client_addr(req.headers(), peer, state.config.trusted_hops);
    req.extensions_mut().insert(ClientAddr(addr));
    next.run(req).await
}

/// With N trusted proxy hops, the genuine client is the Nth-from-last
/// entry in the forwarding chain; anything further left is
/// client-controlled and cannot be trusted. With no trusted hops, only
/// the socket peer counts.
fn real_client_addr(headers: &HeaderMap, peer: SocketAddr, trusted_hops: usize) -> String {
    if trusted_hops == 0 {
        return peer.ip().to_string();
    }

    let forwarded: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if forwarded.len() >= trusted_hops {
        forwarded[forwarded.len() - trusted_hops].to_string()
    } else {
        peer.ip().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.9:4444".parse().unwrap()
    }

    fn forwarded(chain: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(chain).unwrap());
        headers
    }

    #[test]
    fn zero_trusted_hops_uses_the_socket_peer() {
        let headers = forwarded("203.0.113.7, 10.0.0.1");
        assert_eq!(real_client_addr(&headers, peer(), 0), "192.0.2.9");
    }

    #[test]
    fn one_trusted_hop_takes_the_last_forwarded_entry() {
        let headers = forwarded("203.0.113.7, 10.0.0.1");
        assert_eq!(real_client_addr(&headers, peer(), 1), "10.0.0.1");
    }

    #[test]
    fn two_trusted_hops_walk_back_past_the_proxy() {
        let headers = forwarded("203.0.113.7, 10.0.0.1");
        assert_eq!(real_client_addr(&headers, peer(), 2), "203.0.113.7");
    }

    #[test]
    fn missing_header_falls_back_to_the_peer() {
        assert_eq!(real_client_addr(&HeaderMap::new(), peer(), 1), "192.0.2.9");
    }
}
