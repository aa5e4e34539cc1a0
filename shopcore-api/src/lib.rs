use axum::{http::Method, routing::post, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod middleware;
pub mod notifier;
pub mod scheduler;
pub mod state;
pub mod webhooks;

pub use state::AppState;

/// Assembles the ingress router: chat and payment-processor webhooks, each
/// behind their own auth middleware, both behind the shared per-IP rate
/// limiter.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-chat-platform-secret-token"),
            axum::http::HeaderName::from_static("x-signature"),
        ]);

    let chat_routes = Router::new()
        .route(&state.config.webhooks.chat_path, post(webhooks::chat::handle_chat_update))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth::chat_secret_auth));

    let payment_routes = Router::new()
        .route(&state.config.webhooks.payment_path, post(webhooks::payment::handle_payment_event))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth::payment_signature_auth));

    Router::new()
        .merge(chat_routes)
        .merge(payment_routes)
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit::ip_rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
