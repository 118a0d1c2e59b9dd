//! Single-pass click aggregation
//!
//! Reduces an ordered (newest first) click row set and the matching
//! activity rows into an [`AggregationResult`]. Pure; all I/O lives in
//! the service layer.

use std::collections::HashMap;

use super::{AggregationResult, CategoryClicks, ReferralClicks, SourceClicks};
use crate::storage::models::{ActivityLogEntry, ClickRow};

const RECENT_LIMIT: usize = 10;

/// 一次遍历完成所有分组统计
///
/// Rows whose owning card has been deleted (no joined metadata) still
/// count toward the total, the source buckets and the time buckets, but
/// cannot contribute to the per-card or per-category breakdowns.
pub fn aggregate(rows: &[ClickRow], activity: &[ActivityLogEntry]) -> AggregationResult {
    let mut result = AggregationResult {
        total_clicks: rows.len() as u64,
        ..Default::default()
    };

    // first-seen insertion order is kept so the stable sort below breaks
    // ties the same way every run
    let mut referral_index: HashMap<String, usize> = HashMap::new();
    let mut category_index: HashMap<String, usize> = HashMap::new();
    let mut source_index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        if let Some(card) = &row.card {
            let slot = *referral_index.entry(card.id.clone()).or_insert_with(|| {
                result.top_referrals.push(ReferralClicks {
                    id: card.id.clone(),
                    title: card.title.clone(),
                    clicks: 0,
                    links: card.links.clone(),
                    category: card.category.clone(),
                });
                result.top_referrals.len() - 1
            });
            result.top_referrals[slot].clicks += 1;

            if let Some(category) = &card.category {
                let slot = *category_index.entry(category.clone()).or_insert_with(|| {
                    result.categories.push(CategoryClicks {
                        category: category.clone(),
                        clicks: 0,
                    });
                    result.categories.len() - 1
                });
                result.categories[slot].clicks += 1;
            }
        }

        let source = row.event.source();
        let slot = *source_index.entry(source.to_string()).or_insert_with(|| {
            result.sources.push(SourceClicks {
                source: source.to_string(),
                clicks: 0,
            });
            result.sources.len() - 1
        });
        result.sources[slot].clicks += 1;

        *result
            .clicks_by_time
            .entry(row.event.day_bucket())
            .or_insert(0) += 1;
    }

    // Vec::sort_by is stable, ties keep first-seen order
    result
        .top_referrals
        .sort_by(|a, b| b.clicks.cmp(&a.clicks));
    result.categories.sort_by(|a, b| b.clicks.cmp(&a.clicks));
    result.sources.sort_by(|a, b| b.clicks.cmp(&a.clicks));

    result.recent_activity = rows.iter().take(RECENT_LIMIT).cloned().collect();
    result.user_activity = activity.iter().take(RECENT_LIMIT).cloned().collect();

    result
}
