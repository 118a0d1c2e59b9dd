//! Analytics core types
//!
//! Defines the aggregation window, filter set and [`AggregationResult`]
//! produced by the aggregation engine. The result serializes with
//! camelCase keys; that is the shape the dashboard and the JSON export
//! consume.

pub mod aggregator;

pub use aggregator::aggregate;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::errors::{RefStackError, Result};
use crate::storage::models::{ActivityLogEntry, ClickEvent, ClickFilter, ClickRow, Link};

/// 聚合时间范围
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    #[strum(serialize = "24h")]
    Last24Hours,
    #[default]
    #[serde(rename = "7d")]
    #[strum(serialize = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    #[strum(serialize = "30d")]
    Last30Days,
    #[serde(rename = "custom")]
    #[strum(serialize = "custom")]
    Custom,
}

/// Filters applied to an aggregation query
///
/// `start_date`/`end_date` are only consulted for [`TimeRange::Custom`];
/// the remaining fields are equality restrictions on the click query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl AnalyticsFilters {
    pub fn to_click_filter(&self) -> ClickFilter {
        ClickFilter {
            category: self.category.clone(),
            referral_id: self.referral_id.clone(),
            source: self.source.clone(),
        }
    }

    /// Canonical serialization used as a cache key fragment
    pub fn cache_fragment(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 解析日期，支持 RFC3339 和 YYYY-MM-DD 格式
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

impl TimeRange {
    /// 计算聚合窗口 `[start, end]`
    ///
    /// Fixed ranges are now-relative; `Custom` requires both bounds in
    /// `filters` and rejects malformed or inverted ranges.
    pub fn window(
        &self,
        filters: &AnalyticsFilters,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            TimeRange::Last24Hours => Ok((now - Duration::hours(24), now)),
            TimeRange::Last7Days => Ok((now - Duration::days(7), now)),
            TimeRange::Last30Days => Ok((now - Duration::days(30), now)),
            TimeRange::Custom => {
                let (start_raw, end_raw) =
                    match (filters.start_date.as_deref(), filters.end_date.as_deref()) {
                        (Some(s), Some(e)) => (s, e),
                        _ => {
                            return Err(RefStackError::analytics_invalid_date_range(
                                "Custom range requires both startDate and endDate",
                            ));
                        }
                    };
                let start = parse_date(start_raw).ok_or_else(|| {
                    RefStackError::analytics_invalid_date_range(format!(
                        "Invalid start date '{}'. Supported formats: RFC3339 or YYYY-MM-DD",
                        start_raw
                    ))
                })?;
                let end = parse_date(end_raw).ok_or_else(|| {
                    RefStackError::analytics_invalid_date_range(format!(
                        "Invalid end date '{}'. Supported formats: RFC3339 or YYYY-MM-DD",
                        end_raw
                    ))
                })?;
                if start > end {
                    return Err(RefStackError::analytics_invalid_date_range(
                        "Start date must not be later than end date",
                    ));
                }
                Ok((start, end))
            }
        }
    }
}

/// Per-card click total with associated link metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralClicks {
    pub id: String,
    pub title: String,
    pub clicks: u64,
    pub links: Vec<Link>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryClicks {
    pub category: String,
    pub clicks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceClicks {
    pub source: String,
    pub clicks: u64,
}

/// Summary statistics for one (user, window, filter set)
///
/// Derived, never persisted. Breakdown arrays are sorted descending by
/// count with first-seen order preserved on ties; time buckets are UTC
/// day granularity in ascending date order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub total_clicks: u64,
    pub top_referrals: Vec<ReferralClicks>,
    pub categories: Vec<CategoryClicks>,
    pub sources: Vec<SourceClicks>,
    pub clicks_by_time: BTreeMap<String, u64>,
    pub recent_activity: Vec<ClickRow>,
    pub user_activity: Vec<ActivityLogEntry>,
}

impl AggregationResult {
    /// Fold one realtime click into an already-computed result
    ///
    /// Increments the total and the event's day bucket and prepends the
    /// event to `recent_activity` (capped at 10). The sorted breakdowns
    /// are left untouched; a full recompute refreshes them.
    pub fn apply_click(&mut self, event: &ClickEvent) {
        self.total_clicks += 1;
        *self.clicks_by_time.entry(event.day_bucket()).or_insert(0) += 1;
        self.recent_activity.insert(
            0,
            ClickRow {
                event: event.clone(),
                card: None,
            },
        );
        self.recent_activity.truncate(10);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(day: &str) -> ClickEvent {
        ClickEvent {
            id: uuid::Uuid::new_v4().to_string(),
            referral_id: "card-1".into(),
            user_id: "user-1".into(),
            link_index: 0,
            clicked_at: format!("{}T12:00:00Z", day).parse().unwrap(),
            user_agent: String::new(),
            referrer: String::new(),
        }
    }

    #[test]
    fn fixed_windows_are_now_relative() {
        let now = Utc::now();
        let filters = AnalyticsFilters::default();
        let (start, end) = TimeRange::Last24Hours.window(&filters, now).unwrap();
        assert_eq!(end, now);
        assert_eq!(end - start, Duration::hours(24));

        let (start, _) = TimeRange::Last30Days.window(&filters, now).unwrap();
        assert_eq!(now - start, Duration::days(30));
    }

    #[test]
    fn custom_window_requires_both_bounds() {
        let now = Utc::now();
        let mut filters = AnalyticsFilters {
            start_date: Some("2026-08-01".into()),
            ..Default::default()
        };
        assert!(TimeRange::Custom.window(&filters, now).is_err());

        filters.end_date = Some("2026-08-15".into());
        let (start, end) = TimeRange::Custom.window(&filters, now).unwrap();
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2026-08-01");
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2026-08-15");
    }

    #[test]
    fn custom_window_rejects_inverted_and_garbage_bounds() {
        let now = Utc::now();
        let inverted = AnalyticsFilters {
            start_date: Some("2026-08-15".into()),
            end_date: Some("2026-08-01".into()),
            ..Default::default()
        };
        assert!(TimeRange::Custom.window(&inverted, now).is_err());

        let garbage = AnalyticsFilters {
            start_date: Some("not-a-date".into()),
            end_date: Some("2026-08-01".into()),
            ..Default::default()
        };
        assert!(TimeRange::Custom.window(&garbage, now).is_err());
    }

    #[test]
    fn time_range_string_forms() {
        assert_eq!(TimeRange::Last7Days.to_string(), "7d");
        assert_eq!("30d".parse::<TimeRange>().unwrap(), TimeRange::Last30Days);
        assert_eq!(
            serde_json::to_string(&TimeRange::Custom).unwrap(),
            "\"custom\""
        );
    }

    #[test]
    fn apply_click_updates_total_bucket_and_recent() {
        let mut result = AggregationResult::default();
        result.apply_click(&event_at("2026-08-30"));
        result.apply_click(&event_at("2026-08-30"));
        result.apply_click(&event_at("2026-08-31"));

        assert_eq!(result.total_clicks, 3);
        assert_eq!(result.clicks_by_time["2026-08-30"], 2);
        assert_eq!(result.clicks_by_time["2026-08-31"], 1);
        // newest first
        assert_eq!(result.recent_activity[0].event.day_bucket(), "2026-08-31");
    }

    #[test]
    fn recent_activity_is_capped_at_ten() {
        let mut result = AggregationResult::default();
        for _ in 0..15 {
            result.apply_click(&event_at("2026-08-31"));
        }
        assert_eq!(result.recent_activity.len(), 10);
        assert_eq!(result.total_clicks, 15);
    }
}
