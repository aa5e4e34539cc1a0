use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::state::AppState;

const WEBHOOK_MAX_REQUESTS: u64 = 120;
const WEBHOOK_WINDOW_SECONDS: u64 = 60;

/// Per-IP rate limit on the ingress endpoints, backed by the shared Redis
/// counter. On Redis failure this fails open — the request proceeds as if
/// unlimited — matching the rate-limiting contract's fail-open clause.
pub async fn ip_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let key_user = rate_limit_key_for(addr.ip());

    match state.redis.is_rate_limited("webhook_ingress", key_user, WEBHOOK_MAX_REQUESTS, WEBHOOK_WINDOW_SECONDS).await {
        Ok((true, count, _)) => {
            tracing::warn!(ip = %addr.ip(), count, "rate limit exceeded on webhook ingress");
            (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response()
        }
        Ok((false, _, _)) => next.run(req).await,
        Err(e) => {
            tracing::warn!(error = %e, "rate limiter unavailable, failing open");
            next.run(req).await
        }
    }
}

/// Deterministic per-IP counter key: the same address always maps to the
/// same UUID, and distinct addresses don't collide.
fn rate_limit_key_for(ip: std::net::IpAddr) -> uuid::Uuid {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, ip.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_ip_maps_to_same_key() {
        let a = "203.0.113.7".parse().unwrap();
        assert_eq!(rate_limit_key_for(a), rate_limit_key_for(a));
    }

    #[test]
    fn distinct_ips_map_to_distinct_keys() {
        let a = "203.0.113.7".parse().unwrap();
        let b = "203.0.113.8".parse().unwrap();
        assert_ne!(rate_limit_key_for(a), rate_limit_key_for(b));
    }

    #[test]
    fn ipv4_and_ipv6_forms_of_different_hosts_dont_collide() {
        let v4 = "198.51.100.23".parse().unwrap();
        let v6 = "::ffff:198.51.100.23".parse().unwrap();
        assert_ne!(rate_limit_key_for(v4), rate_limit_key_for(v6));
    }
}
