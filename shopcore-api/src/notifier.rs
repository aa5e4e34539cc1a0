use std::sync::Arc;

use async_trait::async_trait;
use shopcore_core::UserRepository;
use shopcore_domain::NotificationPort;
use uuid::Uuid;

/// Forwards order/payment/strike notifications to the chat platform's own
/// send-message API, resolving the internal user id to the platform's
/// external id first. Admin broadcasts fan out to the configured admin list.
#[derive(Clone)]
pub struct ChatNotifier<U: UserRepository + Clone> {
    http: reqwest::Client,
    bot_api_base: String,
    bot_token: String,
    users: Arc<U>,
    admin_external_ids: Arc<Vec<String>>,
}

impl<U: UserRepository + Clone> ChatNotifier<U> {
    pub fn new(bot_api_base: String, bot_token: String, users: U, admin_external_ids: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_api_base,
            bot_token,
            users: Arc::new(users),
            admin_external_ids: Arc::new(admin_external_ids),
        }
    }

    async fn send_to_external_id(&self, external_id: &str, message: &str) {
        let url = format!("{}/bot{}/sendMessage", self.bot_api_base, self.bot_token);
        let result = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "chat_id": external_id, "text": message }))
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!(external_id, error = %e, "failed to deliver chat notification");
        }
    }
}

#[async_trait]
impl<U: UserRepository + Clone> NotificationPort for ChatNotifier<U> {
    async fn notify_user(&self, target_id: Uuid, message: String) {
        match self.users.find_by_id(target_id).await {
            Ok(Some(user)) => self.send_to_external_id(&user.external_id, &message).await,
            Ok(None) => tracing::warn!(%target_id, "notify_user: user not found"),
            Err(e) => tracing::warn!(%target_id, error = %e, "notify_user: lookup failed"),
        }
    }

    async fn notify_admins(&self, message: String) {
        for admin_id in self.admin_external_ids.iter() {
            self.send_to_external_id(admin_id, &message).await;
        }
    }
}
