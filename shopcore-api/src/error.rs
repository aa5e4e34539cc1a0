use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;

/// Collects every domain crate's typed error into one enum with an
/// `IntoResponse` impl. Webhook handlers never let this type reach the HTTP
/// response (the payment-processor and chat platform both require `200`
/// regardless of outcome) — they match on the typed domain error
/// themselves. This impl exists for any future non-webhook route that
/// needs ordinary HTTP semantics.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Order(#[from] shopcore_order::OrderError),
    #[error(transparent)]
    Payment(#[from] shopcore_payment::PaymentError),
    #[error(transparent)]
    Item(#[from] shopcore_catalog::ItemError),
    #[error(transparent)]
    Cart(#[from] shopcore_catalog::CartError),
    #[error(transparent)]
    Accounts(#[from] shopcore_core::AccountsError),
    #[error(transparent)]
    Shipping(#[from] shopcore_order::ShippingError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Order(shopcore_order::OrderError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Order(shopcore_order::OrderError::InvalidState { .. }) => StatusCode::CONFLICT,
            AppError::Order(shopcore_order::OrderError::OwnershipViolation) => StatusCode::FORBIDDEN,
            AppError::Accounts(shopcore_core::AccountsError::Banned { .. }) => StatusCode::FORBIDDEN,
            AppError::Accounts(shopcore_core::AccountsError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Payment(shopcore_payment::PaymentError::OrderNotFound(_))
            | AppError::Payment(shopcore_payment::PaymentError::InvoiceNotFound(_)) => StatusCode::NOT_FOUND,
            _ => {
                tracing::error!(error = %self, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
