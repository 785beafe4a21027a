//! Pipeline notifications
//!
//! Notifiers report pipeline events to humans. Delivery is best effort: the
//! orchestrator logs and discards notifier failures.

use async_trait::async_trait;
use tenantry_client::TelegramClient;
use tenantry_core::Result;
use tenantry_core::domain::pipeline::PipelineEvent;
use tracing::{info, warn};

use crate::repository::backend::map_client_error;

/// Repository trait for event notification
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &PipelineEvent) -> Result<()>;
}

/// Posts event summaries to a Telegram chat
pub struct TelegramNotifier {
    client: TelegramClient,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: &PipelineEvent) -> Result<()> {
        self.client
            .send_message(&self.chat_id, &event.summary())
            .await
            .map_err(map_client_error)
    }
}

/// Writes events to the log only
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &PipelineEvent) -> Result<()> {
        match event {
            PipelineEvent::Failed { .. } | PipelineEvent::RollbackFailed { .. } => {
                warn!("{}", event.summary())
            }
            _ => info!("{}", event.summary()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let event = PipelineEvent::Cancelled {
            tenant_id: "acme".to_string(),
            run_id: Uuid::new_v4(),
            phase: tenantry_core::domain::pipeline::Phase::Build,
        };
        assert!(LogNotifier.notify(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_telegram_is_an_error() {
        let client = TelegramClient::with_base_url("http://127.0.0.1:9", "123:abc");
        let notifier = TelegramNotifier::new(client, "42");
        let event = PipelineEvent::RolledBack {
            tenant_id: "acme".to_string(),
            tag: "acme/v1.0.0+1".to_string(),
            marker: "acme/v1.0.0+1-rollback-20261018090000".to_string(),
            redeployed: Vec::new(),
            redeploy_failed: Vec::new(),
        };
        assert!(notifier.notify(&event).await.is_err());
    }
}
