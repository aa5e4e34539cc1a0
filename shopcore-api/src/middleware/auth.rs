use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Chat-platform ingress: the header value must constant-time-equal the
/// configured secret. Timing-safe comparison matters here because the
/// secret is attacker-guessable one byte at a time under a naive `==`.
pub async fn chat_secret_auth(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let header = req
        .headers()
        .get("X-Chat-Platform-Secret-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !secrets_match(header.as_bytes(), state.config.secrets.chat_webhook_secret.as_bytes()) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

fn secrets_match(actual: &[u8], expected: &[u8]) -> bool {
    actual.len() == expected.len() && actual.ct_eq(expected).unwrap_u8() == 1
}

/// `hex(HMAC-SHA-512(secret, whitespace_stripped(body)))`, compared against
/// `signature_hex` in constant time.
fn verify_payment_signature(secret: &[u8], body: &[u8], signature_hex: &str) -> Result<bool, hmac::digest::InvalidLength> {
    let stripped: Vec<u8> = body.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    let mut mac = Hmac::<Sha512>::new_from_slice(secret)?;
    mac.update(&stripped);
    let expected = hex::encode(mac.finalize().into_bytes());
    Ok(secrets_match(signature_hex.as_bytes(), expected.as_bytes()))
}

/// Payment-processor ingress: `X-Signature` must equal
/// `hex(HMAC-SHA-512(secret, whitespace_stripped(body)))`, compared in
/// constant time by the MAC crate itself. The body is buffered here (it is
/// small — a single JSON webhook payload) so both this check and the
/// downstream handler can read it.
pub async fn payment_signature_auth(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let signature_header =
        req.headers().get("X-Signature").and_then(|v| v.to_str().ok()).ok_or(StatusCode::FORBIDDEN)?.to_string();

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|_| StatusCode::FORBIDDEN)?;

    let secret = state.config.secrets.payment_webhook_secret.as_bytes();
    let matches = verify_payment_signature(secret, &bytes, &signature_header).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !matches {
        return Err(StatusCode::FORBIDDEN);
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}
