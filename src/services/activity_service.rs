//! Activity logging service
//!
//! Persists typed activity records, plus the error- and
//! performance-tracking paths built on top of them. Everything here is
//! append-only bookkeeping; failures are reported to the caller but are
//! never fatal to the triggering operation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::storage::models::{ActivityLogEntry, ActivityType};
use crate::storage::ReferralStore;

/// 性能阈值
const API_RESPONSE_TIME_MS: f64 = 1000.0;
const RENDER_TIME_MS: f64 = 100.0;
const MEMORY_USAGE_BYTES: u64 = 50 * 1024 * 1024;

/// Error severity, derived from the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 根据错误消息内容推断严重级别
    pub fn from_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("database") || lowered.contains("auth") {
            ErrorSeverity::Critical
        } else if lowered.contains("payment") || lowered.contains("subscription") {
            ErrorSeverity::High
        } else if lowered.contains("api") || lowered.contains("network") {
            ErrorSeverity::Medium
        } else {
            ErrorSeverity::Low
        }
    }
}

/// Client-side performance sample reported by the UI layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub api_response_time_ms: f64,
    pub render_time_ms: f64,
    pub memory_usage_bytes: u64,
}

#[derive(Clone)]
pub struct ActivityLogger {
    store: Arc<dyn ReferralStore>,
}

impl ActivityLogger {
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        Self { store }
    }

    /// 记录一条用户活动
    pub async fn log_activity(
        &self,
        user_id: &str,
        activity_type: ActivityType,
        details: serde_json::Value,
    ) -> Result<()> {
        self.store
            .insert_activity(ActivityLogEntry::new(user_id, activity_type, details))
            .await?;
        debug!("Logged {} activity for user {}", activity_type, user_id);
        Ok(())
    }

    /// 记录错误，附带推断出的严重级别
    pub async fn track_error(
        &self,
        user_id: &str,
        message: &str,
        context: serde_json::Value,
    ) -> Result<()> {
        let severity = ErrorSeverity::from_message(message);
        let details = serde_json::json!({
            "message": message,
            "severity": severity,
            "context": context,
        });
        self.log_activity(user_id, ActivityType::ErrorOccurred, details)
            .await
    }

    /// Error-path variant: a failure to log must never mask the original
    /// error, so it is swallowed with a warning.
    pub async fn track_error_silently(
        &self,
        user_id: &str,
        message: &str,
        context: serde_json::Value,
    ) {
        if let Err(e) = self.track_error(user_id, message, context).await {
            warn!("Error tracking itself failed: {}", e);
        }
    }

    /// 记录性能采样；超过阈值时追加一条 performance_issue 活动
    pub async fn track_performance(
        &self,
        user_id: &str,
        metrics: PerformanceMetrics,
    ) -> Result<()> {
        let mut issues: Vec<&str> = Vec::new();
        if metrics.api_response_time_ms > API_RESPONSE_TIME_MS {
            issues.push("API response time exceeded threshold");
        }
        if metrics.render_time_ms > RENDER_TIME_MS {
            issues.push("Render time exceeded threshold");
        }
        if metrics.memory_usage_bytes > MEMORY_USAGE_BYTES {
            issues.push("Memory usage exceeded threshold");
        }

        if issues.is_empty() {
            return Ok(());
        }

        let details = serde_json::json!({
            "issues": issues,
            "metrics": metrics,
        });
        self.log_activity(user_id, ActivityType::PerformanceIssue, details)
            .await
    }
}
