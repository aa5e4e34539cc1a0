use axum::{extract::State, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use shopcore_catalog::ItemRepository;
use shopcore_domain::{CryptoCurrency, Fiat, NotificationPort};
use shopcore_payment::{DepositRepository, InvoiceRepository};

use crate::state::AppState;

/// Mirrors the payment processor's webhook body. `id` is the processor's
/// own identifier for the invoice/deposit being reported on; whether it
/// resolves to a stored invoice or a stored deposit is what disambiguates an
/// order payment from a wallet top-up, not a field on the payload itself.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhookPayload {
    pub id: i64,
    pub is_paid: bool,
    pub crypto_currency: CryptoCurrency,
    pub crypto_amount: Decimal,
    #[allow(dead_code)]
    pub fiat_currency: String,
    pub fiat_amount: Fiat,
    #[allow(dead_code)]
    pub address: Option<String>,
}

/// `POST {path}/cryptoprocessing/event` — the payment processor's webhook.
/// Authentication happens in `middleware::auth::payment_signature_auth`.
/// Always answers `200`: failures are logged and surfaced to administrators
/// through the notification port, never to the processor, which would
/// otherwise interpret a non-200 as a delivery failure and retry forever.
pub async fn handle_payment_event(State(state): State<AppState>, Json(payload): Json<PaymentWebhookPayload>) -> impl IntoResponse {
    let processing_id = payload.id.to_string();
    tracing::debug!(processing_id, is_paid = payload.is_paid, "received payment-processor webhook");

    if let Err(e) = process(&state, &payload, &processing_id).await {
        tracing::error!(error = %e, processing_id, "payment webhook processing failed");
        state.notifier.notify_admins(format!("payment webhook error for processing id {processing_id}: {e}")).await;
    }

    "200"
}

/// Disambiguates the event by looking the processing id up against the two
/// possible origins in turn: an order invoice first, a deposit request
/// second. A processing id that resolves to neither is a genuinely unknown
/// event and gets surfaced to administrators rather than silently dropped.
async fn process(state: &AppState, payload: &PaymentWebhookPayload, processing_id: &str) -> Result<(), anyhow::Error> {
    if let Some(invoice) = state.invoices.find_by_processing_id(processing_id).await? {
        if !payload.is_paid {
            tracing::info!(order_id = ?invoice.order_id, "order payment reported unpaid/expired, ignoring");
            return Ok(());
        }

        let order_id = invoice.order_id.ok_or_else(|| anyhow::anyhow!("payment invoice {} has no order", invoice.id))?;
        let items = state.items.find_by_order(order_id).await?;
        let has_physical = items.iter().any(|i| i.is_physical);
        let has_digital = items.iter().any(|i| !i.is_physical);
        let is_mixed_order = has_physical && has_digital;
        let physical_items_total = items
            .iter()
            .filter(|i| i.is_physical)
            .try_fold(Fiat::ZERO, |acc, i| acc.checked_add(i.price))
            .unwrap_or(Fiat::ZERO);

        state
            .payment_service
            .handle_confirmed_payment(
                state.processor.as_ref(),
                &state.invoices,
                &state.transactions,
                &state.orders,
                &state.items,
                &state.users,
                &state.strikes_repo,
                &state.buy_history,
                state.order_service.as_ref(),
                &invoice,
                processing_id.to_string(),
                payload.crypto_amount,
                payload.crypto_currency,
                payload.fiat_amount,
                has_physical,
                is_mixed_order,
                physical_items_total,
            )
            .await?;
        return Ok(());
    }

    if let Some(deposit) = state.deposits.find_by_processing_id(processing_id).await? {
        if !payload.is_paid {
            state.notifier.notify_user(deposit.user_id, "Your deposit payment has expired.".to_string()).await;
            return Ok(());
        }

        state
            .payment_service
            .handle_deposit(&state.users, &state.deposits, &deposit, state.strike_enforcer.as_ref())
            .await?;
        return Ok(());
    }

    tracing::warn!(processing_id, "payment webhook references an unknown processing id");
    state.notifier.notify_admins(format!("payment webhook references unknown processing id {processing_id}")).await;
    Ok(())
}
