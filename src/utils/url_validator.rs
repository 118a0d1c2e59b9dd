//! URL 验证模块
//!
//! 验证链接 URL 安全性，阻止危险协议

use url::Url;

/// URL 验证错误
#[derive(Debug)]
pub enum UrlValidationError {
    EmptyUrl,
    InvalidProtocol(String),
    DangerousProtocol(String),
    InvalidFormat(String),
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUrl => write!(f, "URL cannot be empty"),
            Self::InvalidProtocol(proto) => write!(
                f,
                "Invalid protocol: {}. Only http:// and https:// are allowed",
                proto
            ),
            Self::DangerousProtocol(proto) => {
                write!(f, "Dangerous protocol blocked: {}", proto)
            }
            Self::InvalidFormat(msg) => write!(f, "Invalid URL format: {}", msg),
        }
    }
}

impl std::error::Error for UrlValidationError {}

/// 危险协议列表
const DANGEROUS_PROTOCOLS: &[&str] = &[
    "javascript:",
    "data:",
    "file:",
    "vbscript:",
    "about:",
    "blob:",
];

/// 验证 URL 安全性
///
/// 检查项目：
/// 1. URL 不为空
/// 2. 不是危险协议（javascript:, data:, file: 等）
/// 3. 必须是 http:// 或 https://
pub fn validate_url(raw: &str) -> Result<Url, UrlValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::EmptyUrl);
    }

    let lowered = trimmed.to_ascii_lowercase();
    for proto in DANGEROUS_PROTOCOLS {
        if lowered.starts_with(proto) {
            return Err(UrlValidationError::DangerousProtocol(proto.to_string()));
        }
    }

    let parsed =
        Url::parse(trimmed).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(UrlValidationError::InvalidProtocol(format!("{}:", other))),
    }
}
