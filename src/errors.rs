use std::fmt;

#[derive(Debug, Clone)]
pub enum RefStackError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Validation(String),
    NotFound(String),
    Serialization(String),
    DateParse(String),
    AnalyticsQueryFailed(String),
    AnalyticsInvalidDateRange(String),
    ExportFailed(String),
    NotificationDispatch(String),
}

impl RefStackError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            RefStackError::DatabaseConfig(_) => "E001",
            RefStackError::DatabaseConnection(_) => "E002",
            RefStackError::DatabaseOperation(_) => "E003",
            RefStackError::Validation(_) => "E004",
            RefStackError::NotFound(_) => "E005",
            RefStackError::Serialization(_) => "E006",
            RefStackError::DateParse(_) => "E007",
            RefStackError::AnalyticsQueryFailed(_) => "E008",
            RefStackError::AnalyticsInvalidDateRange(_) => "E009",
            RefStackError::ExportFailed(_) => "E010",
            RefStackError::NotificationDispatch(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            RefStackError::DatabaseConfig(_) => "Database Configuration Error",
            RefStackError::DatabaseConnection(_) => "Database Connection Error",
            RefStackError::DatabaseOperation(_) => "Database Operation Error",
            RefStackError::Validation(_) => "Validation Error",
            RefStackError::NotFound(_) => "Resource Not Found",
            RefStackError::Serialization(_) => "Serialization Error",
            RefStackError::DateParse(_) => "Date Parse Error",
            RefStackError::AnalyticsQueryFailed(_) => "Analytics Query Failed",
            RefStackError::AnalyticsInvalidDateRange(_) => "Invalid Analytics Date Range",
            RefStackError::ExportFailed(_) => "Export Failed",
            RefStackError::NotificationDispatch(_) => "Notification Dispatch Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            RefStackError::DatabaseConfig(msg) => msg,
            RefStackError::DatabaseConnection(msg) => msg,
            RefStackError::DatabaseOperation(msg) => msg,
            RefStackError::Validation(msg) => msg,
            RefStackError::NotFound(msg) => msg,
            RefStackError::Serialization(msg) => msg,
            RefStackError::DateParse(msg) => msg,
            RefStackError::AnalyticsQueryFailed(msg) => msg,
            RefStackError::AnalyticsInvalidDateRange(msg) => msg,
            RefStackError::ExportFailed(msg) => msg,
            RefStackError::NotificationDispatch(msg) => msg,
        }
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for RefStackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for RefStackError {}

// 便捷的构造函数
impl RefStackError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        RefStackError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        RefStackError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        RefStackError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        RefStackError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        RefStackError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        RefStackError::Serialization(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        RefStackError::DateParse(msg.into())
    }

    pub fn analytics_query_failed<T: Into<String>>(msg: T) -> Self {
        RefStackError::AnalyticsQueryFailed(msg.into())
    }

    pub fn analytics_invalid_date_range<T: Into<String>>(msg: T) -> Self {
        RefStackError::AnalyticsInvalidDateRange(msg.into())
    }

    pub fn export_failed<T: Into<String>>(msg: T) -> Self {
        RefStackError::ExportFailed(msg.into())
    }

    pub fn notification_dispatch<T: Into<String>>(msg: T) -> Self {
        RefStackError::NotificationDispatch(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for RefStackError {
    fn from(err: sea_orm::DbErr) -> Self {
        RefStackError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for RefStackError {
    fn from(err: std::io::Error) -> Self {
        RefStackError::ExportFailed(err.to_string())
    }
}

impl From<serde_json::Error> for RefStackError {
    fn from(err: serde_json::Error) -> Self {
        RefStackError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for RefStackError {
    fn from(err: chrono::ParseError) -> Self {
        RefStackError::DateParse(err.to_string())
    }
}

impl From<csv::Error> for RefStackError {
    fn from(err: csv::Error) -> Self {
        RefStackError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RefStackError>;
