//! Realtime click bridge
//!
//! Bridges the store's click change feed to a per-user callback. The
//! bridge holds no state and performs no aggregation: the subscriber
//! folds each event into whatever result it is displaying, typically via
//! [`AggregationResult::apply_click`](crate::analytics::AggregationResult::apply_click).
//!
//! Events are delivered in feed order, without deduplication. Dropping
//! the returned [`ClickSubscription`] (or calling
//! [`unsubscribe`](ClickSubscription::unsubscribe)) releases the
//! subscription.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::storage::ReferralStore;
use crate::storage::models::ClickEvent;

pub struct RealtimeBridge {
    store: Arc<dyn ReferralStore>,
}

impl RealtimeBridge {
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        Self { store }
    }

    /// 订阅某个用户的新点击事件
    ///
    /// The callback runs on the subscription task, one event at a time,
    /// in arrival order.
    pub fn subscribe<F>(&self, user_id: &str, on_click: F) -> ClickSubscription
    where
        F: Fn(ClickEvent) + Send + Sync + 'static,
    {
        let mut receiver = self.store.subscribe_clicks();
        let user_id = user_id.to_string();

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if event.user_id == user_id {
                            on_click(event);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // 消费太慢，feed 丢弃了部分事件；继续接收
                        warn!(
                            "Click subscription for user {} lagged, {} events skipped",
                            user_id, skipped
                        );
                    }
                    Err(RecvError::Closed) => {
                        debug!("Click feed closed, ending subscription for {}", user_id);
                        break;
                    }
                }
            }
        });

        ClickSubscription { handle }
    }
}

/// Handle to a standing click subscription
///
/// The underlying task is aborted on [`unsubscribe`](Self::unsubscribe)
/// and on drop, so an abandoned handle cannot leak the subscription.
pub struct ClickSubscription {
    handle: JoinHandle<()>,
}

impl ClickSubscription {
    pub fn unsubscribe(self) {
        self.handle.abort();
    }
}

impl Drop for ClickSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
