//! Service layer
//!
//! Business logic shared by whatever surface embeds this crate (web
//! handlers, background jobs, admin tooling). Services hold `Arc`s to the
//! storage trait and to each other's shared pieces (cache, notification
//! queue) and expose explicit `Result`s.

pub mod activity_service;
pub mod analytics_service;
pub mod click_service;
pub mod export_service;
pub mod quota_service;

pub use activity_service::{ActivityLogger, ErrorSeverity, PerformanceMetrics};
pub use analytics_service::AnalyticsService;
pub use click_service::{ClickContext, ClickRecorder, RecordedClick};
pub use export_service::{ExportFile, ExportFormat, ExportService, parse_export_format};
pub use quota_service::QuotaService;
