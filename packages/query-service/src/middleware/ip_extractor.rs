//! Client IP extraction, adapted from the teacher's `extract_client_ip`
//! (`examples/fourthplaces-mntogether/packages/server/src/server/middleware/ip_extractor.rs`):
//! same `X-Forwarded-For` -> `X-Real-IP` -> `ConnectInfo` fallback chain,
//! feeding the rate limiter's `ip:<addr>` bucket key (spec §4.13).

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};

#[derive(Debug, Clone)]
pub struct ClientIp(pub IpAddr);

pub async fn extract_client_ip(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let ip = if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        forwarded
            .to_str()
            .ok()
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    } else if let Some(real_ip) = request.headers().get("x-real-ip") {
        real_ip.to_str().ok().and_then(|s| s.parse::<IpAddr>().ok())
    } else {
        Some(addr.ip())
    };

    if let Some(ip) = ip {
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}
