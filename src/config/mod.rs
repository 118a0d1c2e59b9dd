//! Application configuration
//!
//! Settings are read from the environment (prefix `REFSTACK`, nested keys
//! separated by `__`, e.g. `REFSTACK__DATABASE__DATABASE_URL`), with `.env`
//! support via dotenvy. Call [`init_config`] once at startup, then access
//! the loaded configuration through [`get_config`].

use std::sync::OnceLock;

use serde::Deserialize;
use tracing::debug;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub analytics: AnalyticsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Aggregation cache TTL in seconds
    pub cache_ttl_secs: u64,
    /// 免费用户的链接总数上限
    pub free_link_limit: usize,
    /// Milestone notification interval (every N cumulative clicks)
    pub milestone_interval: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "plain" or "json"
    pub format: String,
    /// Optional log file path; empty means stdout
    pub file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            analytics: AnalyticsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://refstack.db?mode=rwc".to_string(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            free_link_limit: 5,
            milestone_interval: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
            file: None,
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("REFSTACK")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build().and_then(|c| c.try_deserialize()) {
            Ok(cfg) => cfg,
            Err(e) => {
                debug!("Config load failed ({}), using defaults", e);
                AppConfig::default()
            }
        }
    }
}

/// 初始化全局配置（只允许初始化一次）
pub fn init_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::load)
}

/// 获取全局配置，未初始化时惰性加载
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::load)
}
