//! Analytics aggregation service
//!
//! Unified entry point for aggregation queries: computes the window,
//! consults the TTL cache, issues the click and activity queries
//! concurrently and reduces the rows into an
//! [`AggregationResult`]. Query failures are recorded through the
//! activity logger (`error_occurred`, with the range and filters as
//! context) before being returned as tagged errors.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use crate::analytics::{AggregationResult, AnalyticsFilters, TimeRange, aggregate};
use crate::cache::{AggregationCache, CacheKey, Clock, SystemClock};
use crate::errors::{RefStackError, Result};
use crate::services::ActivityLogger;
use crate::storage::ReferralStore;

const ACTIVITY_QUERY_LIMIT: usize = 10;

pub struct AnalyticsService {
    store: Arc<dyn ReferralStore>,
    cache: Arc<AggregationCache>,
    activity: ActivityLogger,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    /// 使用配置中的缓存 TTL 和系统时钟创建服务
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        let ttl_secs = crate::config::get_config().analytics.cache_ttl_secs;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            activity: ActivityLogger::new(store.clone()),
            cache: Arc::new(AggregationCache::new(
                Duration::seconds(ttl_secs as i64),
                clock.clone(),
            )),
            store,
            clock,
        }
    }

    /// Full dependency injection, used by tests and by callers that share
    /// the cache with a [`ClickRecorder`](crate::services::ClickRecorder)
    pub fn with_parts(
        store: Arc<dyn ReferralStore>,
        cache: Arc<AggregationCache>,
        activity: ActivityLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            activity,
            clock,
        }
    }

    /// The cache instance, shared with the click recorder for invalidation
    pub fn cache(&self) -> Arc<AggregationCache> {
        self.cache.clone()
    }

    /// 获取聚合结果（带缓存）
    ///
    /// An empty window is a valid, empty result; only query and window
    /// errors surface as `Err`.
    pub async fn get_aggregation(
        &self,
        user_id: &str,
        time_range: TimeRange,
        filters: &AnalyticsFilters,
    ) -> Result<Arc<AggregationResult>> {
        match self.compute(user_id, time_range, filters).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.log_failure(user_id, &e, time_range, filters).await;
                Err(e)
            }
        }
    }

    async fn compute(
        &self,
        user_id: &str,
        time_range: TimeRange,
        filters: &AnalyticsFilters,
    ) -> Result<Arc<AggregationResult>> {
        let key = CacheKey::new(user_id, time_range, filters);
        if let Some(cached) = self.cache.get(&key) {
            debug!(
                "Aggregation cache hit for user {} range {}",
                user_id, time_range
            );
            return Ok(cached);
        }

        let (start, end) = time_range.window(filters, self.clock.now())?;
        info!(
            "Aggregating clicks for user {} from {} to {}",
            user_id, start, end
        );

        // no cross-query snapshot: a click landing between the two reads
        // may show up in one result set and not the other
        let click_filter = filters.to_click_filter();
        let (rows, activity) = tokio::try_join!(
            self.store.query_clicks(user_id, start, end, &click_filter),
            self.store
                .recent_activity(user_id, start, end, ACTIVITY_QUERY_LIMIT),
        )
        .map_err(|e| RefStackError::analytics_query_failed(e.to_string()))?;

        let result = Arc::new(aggregate(&rows, &activity));
        debug!(
            "Aggregated {} clicks across {} cards for user {}",
            result.total_clicks,
            result.top_referrals.len(),
            user_id
        );

        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// 失败时通过活动日志记录上下文；记录本身失败则静默
    async fn log_failure(
        &self,
        user_id: &str,
        error: &RefStackError,
        time_range: TimeRange,
        filters: &AnalyticsFilters,
    ) {
        let context = serde_json::json!({
            "timeRange": time_range.to_string(),
            "filters": filters,
        });
        self.activity
            .track_error_silently(user_id, &error.format_simple(), context)
            .await;
    }
}
