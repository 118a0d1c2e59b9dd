//! Export integration tests
//!
//! Verifies the JSON round trip, the CSV row shape, filename/mime
//! metadata, file writing and the tracked failure path.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use refstack::analytics::{AnalyticsFilters, TimeRange};
use refstack::cache::{AggregationCache, Clock, SystemClock};
use refstack::services::{ActivityLogger, AnalyticsService, ExportFormat, ExportService};
use refstack::storage::models::{ClickEvent, Link, ReferralCard};
use refstack::storage::{InMemoryStore, ReferralStore};

// =============================================================================
// helpers
// =============================================================================

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

async fn seeded_exporter() -> (ExportService, Arc<AnalyticsService>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());

    let card = {
        let mut card = ReferralCard::new("user-1", "Tech deals").with_links(vec![
            Link {
                label: "Store".into(),
                url: "https://example.com/store".into(),
            },
            Link {
                label: "Blog".into(),
                url: "https://example.com/blog".into(),
            },
        ]);
        card.id = "card-1".to_string();
        card.category = Some("tech".to_string());
        card
    };
    store.insert_card(card).await.unwrap();

    let now = Utc::now();
    for offset_hours in [1, 2, 26] {
        store
            .insert_click(ClickEvent {
                id: uuid::Uuid::new_v4().to_string(),
                referral_id: "card-1".into(),
                user_id: "user-1".into(),
                link_index: 0,
                clicked_at: now - Duration::hours(offset_hours),
                user_agent: String::new(),
                referrer: String::new(),
            })
            .await
            .unwrap();
    }

    let analytics = Arc::new(AnalyticsService::with_parts(
        store.clone(),
        Arc::new(AggregationCache::with_ttl_secs(300)),
        ActivityLogger::new(store.clone()),
        Arc::new(SystemClock),
    ));
    let exporter = ExportService::new(analytics.clone(), ActivityLogger::new(store.clone()));
    (exporter, analytics, store)
}

// =============================================================================
// JSON
// =============================================================================

#[tokio::test]
async fn json_export_round_trips_the_aggregation() {
    let (exporter, analytics, _store) = seeded_exporter().await;
    let source = analytics
        .get_aggregation("user-1", TimeRange::Last7Days, &AnalyticsFilters::default())
        .await
        .unwrap();

    let file = exporter
        .export(
            "user-1",
            TimeRange::Last7Days,
            &AnalyticsFilters::default(),
            ExportFormat::Json,
        )
        .await
        .unwrap();
    assert_eq!(file.mime_type, "application/json");
    assert!(file.filename.starts_with("analytics-7d-"));
    assert!(file.filename.ends_with(".json"));

    let parsed: serde_json::Value = serde_json::from_slice(&file.content).unwrap();
    assert_eq!(parsed["totalClicks"], source.total_clicks);
    assert_eq!(
        parsed["topReferrals"].as_array().unwrap().len(),
        source.top_referrals.len()
    );
    assert_eq!(parsed["topReferrals"][0]["title"], "Tech deals");
    let parsed_days: Vec<&str> = parsed["clicksByTime"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    let source_days: Vec<&str> = source.clicks_by_time.keys().map(String::as_str).collect();
    assert_eq!(parsed_days, source_days);
}

// =============================================================================
// CSV
// =============================================================================

#[tokio::test]
async fn csv_export_has_header_bucket_rows_and_link_rows() {
    let (exporter, _analytics, _store) = seeded_exporter().await;

    let file = exporter
        .export(
            "user-1",
            TimeRange::Last7Days,
            &AnalyticsFilters::default(),
            ExportFormat::Csv,
        )
        .await
        .unwrap();
    assert_eq!(file.mime_type, "text/csv;charset=utf-8");

    let text = String::from_utf8(file.content).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Date,Referral Title,Link Label,Clicks,Source");

    let bucket_rows: Vec<&&str> = lines.iter().filter(|l| l.contains("All Referrals")).collect();
    let day_count = lines.len() - 1 - 2; // total minus header minus one row per link
    assert_eq!(bucket_rows.len(), day_count);

    // both links repeat the card's aggregate count
    assert!(lines.iter().any(|l| l.contains("Tech deals,Store,3")));
    assert!(lines.iter().any(|l| l.contains("Tech deals,Blog,3")));
}

#[tokio::test]
async fn filename_uses_the_injected_clock() {
    let (exporter, _analytics, _store) = seeded_exporter().await;
    let fixed: DateTime<Utc> = "2026-08-31T09:00:00Z".parse().unwrap();
    let exporter = exporter.with_clock(Arc::new(FixedClock(fixed)));

    let file = exporter
        .export(
            "user-1",
            TimeRange::Last30Days,
            &AnalyticsFilters::default(),
            ExportFormat::Csv,
        )
        .await
        .unwrap();
    assert_eq!(file.filename, "analytics-30d-2026-08-31.csv");
}

#[tokio::test]
async fn export_file_writes_to_a_directory() {
    let (exporter, _analytics, _store) = seeded_exporter().await;
    let dir = tempfile::tempdir().unwrap();

    let file = exporter
        .export(
            "user-1",
            TimeRange::Last7Days,
            &AnalyticsFilters::default(),
            ExportFormat::Json,
        )
        .await
        .unwrap();
    let path = file.write_to_dir(dir.path()).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, file.content);
    assert_eq!(path.file_name().unwrap().to_str().unwrap(), file.filename);
}

// =============================================================================
// failure path
// =============================================================================

#[tokio::test]
async fn failed_export_produces_no_file_and_is_tracked() {
    let (exporter, _analytics, store) = seeded_exporter().await;

    // custom range without bounds: aggregation fails, export must too
    let err = exporter
        .export(
            "user-1",
            TimeRange::Custom,
            &AnalyticsFilters::default(),
            ExportFormat::Json,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        refstack::errors::RefStackError::ExportFailed(_)
    ));

    let now = Utc::now();
    let logged = store
        .recent_activity("user-1", now - Duration::hours(1), now, 10)
        .await
        .unwrap();
    assert!(
        logged
            .iter()
            .any(|entry| entry.details["context"]["format"] == "json")
    );
}
