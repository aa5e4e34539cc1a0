use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shopcore_api::{app, state::AppState};
use shopcore_api::notifier::ChatNotifier;
use shopcore_core::{HttpPaymentProcessorClient, StrikeEnforcer};
use shopcore_order::{OrderService, OrderServiceConfig};
use shopcore_payment::{PaymentService, PaymentServiceConfig};
use shopcore_store::{
    BackupWorker, Config, DbClient, PostgresBuyHistoryRepository, PostgresCartRepository, PostgresDepositRepository,
    PostgresInvoiceRepository, PostgresItemRepository, PostgresOrderRepository, PostgresPaymentTransactionRepository,
    PostgresShippingAddressRepository, PostgresStrikeRepository, PostgresUserRepository, RedisClient,
};
use shopcore_domain::Fiat;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration load failed");
            std::process::exit(1);
        }
    };

    let db = DbClient::new(&config.database_url).await.expect("failed to connect to database");
    db.migrate().await.expect("failed to run migrations");

    let redis = RedisClient::new(&config.redis_url).await.expect("failed to connect to redis");

    let processor = Arc::new(HttpPaymentProcessorClient::new(
        config.payment_processor.base_url.clone(),
        config.payment_processor.api_key.clone(),
    ));

    let users = PostgresUserRepository::new(db.clone());
    let strikes_repo = PostgresStrikeRepository::new(db.clone());
    let items = PostgresItemRepository::new(db.clone());
    let carts = PostgresCartRepository::new(db.clone());
    let orders = PostgresOrderRepository::new(db.clone());
    let invoices = PostgresInvoiceRepository::new(db.clone());
    let transactions = PostgresPaymentTransactionRepository::new(db.clone());
    let shipping_addresses = PostgresShippingAddressRepository::new(db.clone());
    let deposits = PostgresDepositRepository::new(db.clone());
    let buy_history = PostgresBuyHistoryRepository::new(db.clone());

    let notifier = ChatNotifier::new(
        config.webhooks.bot_api_base.clone(),
        config.webhooks.bot_token.clone(),
        users.clone(),
        config.accounts.admin_id_list.clone(),
    );

    let order_service = Arc::new(OrderService::new(
        OrderServiceConfig {
            order_timeout_minutes: config.order.timeout_minutes,
            order_cancel_grace_period_minutes: config.order.cancel_grace_period_minutes,
            payment_late_penalty_percent: config.payment.late_penalty_percent,
            max_strikes_before_ban: config.accounts.max_strikes_before_ban,
            exempt_admins_from_ban: config.accounts.exempt_admins_from_ban,
        },
        notifier.clone(),
    ));

    let payment_service = Arc::new(PaymentService::new(
        PaymentServiceConfig {
            tolerance_overpayment_percent: config.payment.tolerance_overpayment_percent,
            underpayment_retry_enabled: config.payment.underpayment_retry_enabled,
            underpayment_retry_timeout_minutes: config.payment.underpayment_retry_timeout_minutes,
            underpayment_penalty_percent: config.payment.underpayment_penalty_percent,
            late_payment_penalty_percent: config.payment.late_penalty_percent,
            unban_top_up_amount: Fiat::new(config.accounts.unban_top_up_amount),
            order_timeout_minutes: config.order.timeout_minutes,
        },
        notifier.clone(),
    ));

    let strike_enforcer = Arc::new(StrikeEnforcer::new(
        config.accounts.max_strikes_before_ban,
        config.accounts.exempt_admins_from_ban,
        notifier.clone(),
    ));

    let config = Arc::new(config);

    let state = AppState {
        config: config.clone(),
        db: db.clone(),
        redis: redis.clone(),
        processor,
        users,
        strikes_repo,
        items,
        carts,
        orders,
        invoices,
        transactions,
        shipping_addresses,
        deposits,
        buy_history,
        order_service,
        payment_service,
        strike_enforcer,
        notifier,
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let scheduler_state = state.clone();
    let scheduler_shutdown = shutdown_rx.clone();
    let scheduler_interval = Duration::from_secs(config.scheduler.interval_seconds);
    let scheduler_handle = tokio::spawn(async move {
        shopcore_api::scheduler::run_forever(scheduler_state, scheduler_interval, scheduler_shutdown).await;
    });

    let backup_handle = if config.backup.enabled {
        let backup_db = db.clone();
        let backup_dir = std::path::PathBuf::from(&config.backup.path);
        let backup_key = config.secrets.backup_encryption_key.clone();
        let retention_days = config.backup.retention_days;
        let interval = Duration::from_secs((config.backup.interval_hours * 3600) as u64);
        let worker = BackupWorker::new(backup_db, backup_dir, &backup_key, retention_days, state.notifier.clone())
            .expect("backup enabled but encryption key is invalid; refusing to start unencrypted");
        Some(tokio::spawn(async move {
            worker.run_forever(interval).await;
        }))
    } else {
        tracing::warn!("DB_BACKUP_ENABLED=false; backup worker disabled");
        None
    };

    let router = app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!(%addr, "starting shopcore-api");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    scheduler_handle.abort();
    if let Some(handle) = backup_handle {
        handle.abort();
    }
    db.pool.close().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
