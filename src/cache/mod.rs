//! Aggregation result cache
//!
//! Explicit TTL cache owned by the analytics service, keyed by
//! (user, time range, serialized filters). Time is injected through the
//! [`Clock`] trait so tests control expiry deterministically. A recorded
//! click clears the whole cache (coarse invalidation).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::analytics::{AggregationResult, AnalyticsFilters, TimeRange};

/// Time source for TTL decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 缓存键：(用户, 时间范围, 序列化后的过滤条件)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    pub time_range: TimeRange,
    pub filters: String,
}

impl CacheKey {
    pub fn new(user_id: &str, time_range: TimeRange, filters: &AnalyticsFilters) -> Self {
        Self {
            user_id: user_id.to_string(),
            time_range,
            filters: filters.cache_fragment(),
        }
    }
}

struct CachedEntry {
    result: Arc<AggregationResult>,
    cached_at: DateTime<Utc>,
}

pub struct AggregationCache {
    inner: DashMap<CacheKey, CachedEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AggregationCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn with_ttl_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs as i64), Arc::new(SystemClock))
    }

    /// 命中且未过期时返回缓存结果；过期条目顺带清除
    pub fn get(&self, key: &CacheKey) -> Option<Arc<AggregationResult>> {
        let now = self.clock.now();
        match self.inner.get(key) {
            Some(entry) if now - entry.cached_at < self.ttl => Some(entry.result.clone()),
            Some(_) => {
                drop(self.inner.remove(key));
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, result: Arc<AggregationResult>) {
        self.inner.insert(
            key,
            CachedEntry {
                result,
                cached_at: self.clock.now(),
            },
        );
    }

    /// 全量失效（记录点击后调用）
    pub fn clear(&self) {
        let evicted = self.inner.len();
        self.inner.clear();
        if evicted > 0 {
            debug!("Aggregation cache cleared ({} entries)", evicted);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
