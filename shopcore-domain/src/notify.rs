use async_trait::async_trait;
use uuid::Uuid;

/// Outbound notification interface the core calls to reach buyers and
/// administrators. Kept deliberately small and statically dispatched —
/// services take `N: NotificationPort` as a generic parameter rather than
/// boxing a trait object, the same shape as the payment-processor adapter.
#[async_trait]
pub trait NotificationPort: Send + Sync + Clone + 'static {
    async fn notify_user(&self, target_id: Uuid, message: String);
    async fn notify_admins(&self, message: String);
}

/// Test double that discards every notification. Production wiring supplies
/// a chat-platform-backed implementation external to this crate.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationPort for NoopNotifier {
    async fn notify_user(&self, _target_id: Uuid, _message: String) {}
    async fn notify_admins(&self, _message: String) {}
}
