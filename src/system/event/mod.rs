//! Outbound notification queue
//!
//! The click recorder emits milestone notifications here instead of
//! awaiting delivery inline: publishing never blocks and never fails the
//! operation that triggered it. A spawned worker drains the queue and
//! hands each event to the configured [`Notifier`]; delivery failures are
//! logged and dropped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 出站通知事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationEvent {
    /// Every Nth cumulative click on a card
    ClickMilestone {
        user_id: String,
        email: Option<String>,
        card_title: String,
        click_count: usize,
    },
}

/// Delivery backend (email gateway in production)
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent) -> anyhow::Result<()>;
}

/// Logs deliveries instead of sending them; default when no gateway is wired
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        match event {
            NotificationEvent::ClickMilestone {
                user_id,
                card_title,
                click_count,
                ..
            } => {
                debug!(
                    "Milestone notification for user {}: \"{}\" reached {} clicks",
                    user_id, card_title, click_count
                );
            }
        }
        Ok(())
    }
}

/// Fire-and-forget queue in front of a [`Notifier`]
///
/// The worker task ends once every queue handle has been dropped.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationQueue {
    pub fn start(notifier: Arc<dyn Notifier>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = notifier.deliver(&event).await {
                    warn!("Notification delivery failed: {}", e);
                }
            }
        });
        Self { tx }
    }

    /// 入队即返回；队列关闭时仅记录日志
    pub fn publish(&self, event: NotificationEvent) {
        if self.tx.send(event).is_err() {
            warn!("Notification queue is closed, event dropped");
        }
    }
}
