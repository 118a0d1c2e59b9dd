//! Aggregation export
//!
//! Serializes an aggregation result to CSV or JSON and hands it back as a
//! named, timestamped in-memory file for the embedding layer to deliver.
//! The aggregation is obtained through the analytics service, so the TTL
//! cache applies.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, info};

use crate::analytics::{AnalyticsFilters, TimeRange};
use crate::cache::{Clock, SystemClock};
use crate::errors::{RefStackError, Result};
use crate::services::{ActivityLogger, AnalyticsService};

const CSV_MIME: &str = "text/csv;charset=utf-8";
const JSON_MIME: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_MIME,
            ExportFormat::Json => JSON_MIME,
        }
    }
}

/// A rendered export, ready for download delivery
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub content: Vec<u8>,
}

impl ExportFile {
    /// 写入目录，返回完整路径
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.content)?;
        Ok(path)
    }
}

pub struct ExportService {
    analytics: Arc<AnalyticsService>,
    activity: ActivityLogger,
    clock: Arc<dyn Clock>,
}

impl ExportService {
    pub fn new(analytics: Arc<AnalyticsService>, activity: ActivityLogger) -> Self {
        Self {
            analytics,
            activity,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 导出聚合结果
    ///
    /// Fails without producing a file when the aggregation itself is
    /// unavailable; any failure is also tracked as an `error_occurred`
    /// activity with the request parameters as context.
    pub async fn export(
        &self,
        user_id: &str,
        time_range: TimeRange,
        filters: &AnalyticsFilters,
        format: ExportFormat,
    ) -> Result<ExportFile> {
        match self.render(user_id, time_range, filters, format).await {
            Ok(file) => {
                info!(
                    "Exported analytics for user {} as {} ({} bytes)",
                    user_id,
                    file.filename,
                    file.content.len()
                );
                Ok(file)
            }
            Err(e) => {
                let context = serde_json::json!({
                    "timeRange": time_range.to_string(),
                    "filters": filters,
                    "format": format.to_string(),
                });
                self.activity
                    .track_error_silently(user_id, &e.format_simple(), context)
                    .await;
                Err(e)
            }
        }
    }

    async fn render(
        &self,
        user_id: &str,
        time_range: TimeRange,
        filters: &AnalyticsFilters,
        format: ExportFormat,
    ) -> Result<ExportFile> {
        let result = self
            .analytics
            .get_aggregation(user_id, time_range, filters)
            .await
            .map_err(|e| RefStackError::export_failed(e.format_simple()))?;

        let today = self.clock.now().format("%Y-%m-%d").to_string();
        let content = match format {
            ExportFormat::Json => serde_json::to_vec_pretty(&*result)?,
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer.write_record(["Date", "Referral Title", "Link Label", "Clicks", "Source"])?;

                for (date, clicks) in &result.clicks_by_time {
                    writer.write_record([
                        date.as_str(),
                        "All Referrals",
                        "Total",
                        &clicks.to_string(),
                        "",
                    ])?;
                }

                // per-link click attribution is not tracked; each link row
                // repeats its card's aggregate count
                for referral in &result.top_referrals {
                    for link in &referral.links {
                        writer.write_record([
                            today.as_str(),
                            referral.title.as_str(),
                            link.label.as_str(),
                            &referral.clicks.to_string(),
                            "",
                        ])?;
                    }
                }

                writer
                    .into_inner()
                    .map_err(|e| RefStackError::serialization(e.to_string()))?
            }
        };

        let filename = format!("analytics-{}-{}.{}", time_range, today, format.extension());
        debug!("Rendered {} export '{}'", format, filename);
        Ok(ExportFile {
            filename,
            mime_type: format.mime_type(),
            content,
        })
    }
}

/// Parse a user-supplied format string ("csv" or "json")
pub fn parse_export_format(raw: &str) -> Result<ExportFormat> {
    ExportFormat::from_str(&raw.to_lowercase())
        .map_err(|_| RefStackError::validation(format!("Unsupported export format: '{}'", raw)))
}
