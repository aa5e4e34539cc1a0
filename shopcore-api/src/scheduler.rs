use std::time::Duration;

use shopcore_catalog::ItemRepository;
use shopcore_core::UserRepository;
use shopcore_order::{CancellationReason, OrderRepository};
use shopcore_payment::{InvoiceRepository, PaymentTransactionRepository};
use shopcore_domain::Fiat;

use crate::state::AppState;

/// Sweeps orders stuck in a pending state past their `expires_at` and
/// cancels them as `TIMEOUT`. Runs forever at `interval` until `shutdown`
/// resolves, at which point the current tick finishes and the loop exits.
pub async fn run_forever(state: AppState, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep(&state).await {
                    tracing::error!(error = %e, "payment-timeout sweep failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("payment-timeout scheduler shutting down");
                    return;
                }
            }
        }
    }
}

async fn sweep(state: &AppState) -> Result<(), anyhow::Error> {
    let expired = state.orders.find_expired_pending().await?;
    if expired.is_empty() {
        return Ok(());
    }
    tracing::info!(count = expired.len(), "payment-timeout sweep found expired orders");

    for order in expired {
        if let Err(e) = cancel_one(state, order.id).await {
            tracing::error!(order_id = %order.id, error = %e, "failed to cancel expired order");
        }
    }
    Ok(())
}

async fn cancel_one(state: &AppState, order_id: uuid::Uuid) -> Result<(), anyhow::Error> {
    let order = state.orders.find_by_id(order_id).await?.ok_or_else(|| anyhow::anyhow!("order {order_id} vanished mid-sweep"))?;
    let user = state.users.find_by_id(order.user_id).await?.ok_or_else(|| anyhow::anyhow!("user {} not found", order.user_id))?;

    let transactions = state.transactions.find_all_by_order(order_id).await?;
    let transactions_total =
        transactions.iter().try_fold(Fiat::ZERO, |acc, t| acc.checked_add(t.fiat_amount)).unwrap_or(Fiat::ZERO);
    let total_paid = order.wallet_used.checked_add(transactions_total).unwrap_or(order.wallet_used);

    let items = state.items.find_by_order(order_id).await?;
    let has_physical = items.iter().any(|i| i.is_physical);
    let has_digital = items.iter().any(|i| !i.is_physical);
    let is_mixed_order = has_physical && has_digital;
    let physical_items_total =
        items.iter().filter(|i| i.is_physical).try_fold(Fiat::ZERO, |acc, i| acc.checked_add(i.price)).unwrap_or(Fiat::ZERO);

    state
        .order_service
        .cancel_order(
            &state.items,
            &state.orders,
            &state.users,
            &state.strikes_repo,
            order_id,
            CancellationReason::Timeout,
            total_paid,
            user,
            is_mixed_order,
            physical_items_total,
            Some("payment window expired".to_string()),
            false,
            None,
        )
        .await?;

    if let Some(invoice) = state.invoices.find_active_by_order(order_id).await? {
        state.invoices.mark_inactive(invoice.id).await?;
    }

    Ok(())
}
