use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortlinkError {
    InvalidInput(String),
    NotFound(String),
    RateLimited(String),
    StoreUnavailable(String),
    StoreRejected(String),
    ServerError(String),
    Config(String),
    Transport(String),
    Serialization(String),
}

impl ShortlinkError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortlinkError::InvalidInput(_) => "E001",
            ShortlinkError::NotFound(_) => "E002",
            ShortlinkError::RateLimited(_) => "E003",
            ShortlinkError::StoreUnavailable(_) => "E004",
            ShortlinkError::StoreRejected(_) => "E005",
            ShortlinkError::ServerError(_) => "E006",
            ShortlinkError::Config(_) => "E007",
            ShortlinkError::Transport(_) => "E008",
            ShortlinkError::Serialization(_) => "E009",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortlinkError::InvalidInput(_) => "Invalid Input",
            ShortlinkError::NotFound(_) => "Resource Not Found",
            ShortlinkError::RateLimited(_) => "Rate Limited",
            ShortlinkError::StoreUnavailable(_) => "Store Unavailable",
            ShortlinkError::StoreRejected(_) => "Store Rejected",
            ShortlinkError::ServerError(_) => "Server Error",
            ShortlinkError::Config(_) => "Configuration Error",
            ShortlinkError::Transport(_) => "Transport Error",
            ShortlinkError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortlinkError::InvalidInput(msg)
            | ShortlinkError::NotFound(msg)
            | ShortlinkError::RateLimited(msg)
            | ShortlinkError::StoreUnavailable(msg)
            | ShortlinkError::StoreRejected(msg)
            | ShortlinkError::ServerError(msg)
            | ShortlinkError::Config(msg)
            | ShortlinkError::Transport(msg)
            | ShortlinkError::Serialization(msg) => msg,
        }
    }

    /// 对应的 HTTP 状态码
    ///
    /// `InvalidInput` 在 `/short` 上按 415 返回（请求体或 URL 不合法）。
    pub fn http_status(&self) -> StatusCode {
        match self {
            ShortlinkError::InvalidInput(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ShortlinkError::NotFound(_) => StatusCode::NOT_FOUND,
            ShortlinkError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ShortlinkError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ShortlinkError::StoreRejected(_) => StatusCode::BAD_GATEWAY,
            ShortlinkError::ServerError(_)
            | ShortlinkError::Config(_)
            | ShortlinkError::Transport(_)
            | ShortlinkError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 是否属于存储层的故障（而非"记录不存在"）
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            ShortlinkError::StoreUnavailable(_) | ShortlinkError::StoreRejected(_)
        )
    }

    /// 格式化为彩色输出（用于 Server 模式）
    #[cfg(feature = "server")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ShortlinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortlinkError {}

// 便捷的构造函数
impl ShortlinkError {
    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::InvalidInput(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::NotFound(msg.into())
    }

    pub fn rate_limited<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::RateLimited(msg.into())
    }

    pub fn store_unavailable<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::StoreUnavailable(msg.into())
    }

    pub fn store_rejected<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::StoreRejected(msg.into())
    }

    pub fn server_error<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::ServerError(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::Config(msg.into())
    }

    pub fn transport<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::Transport(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ShortlinkError::Serialization(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<reqwest::Error> for ShortlinkError {
    fn from(err: reqwest::Error) -> Self {
        ShortlinkError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for ShortlinkError {
    fn from(err: serde_json::Error) -> Self {
        ShortlinkError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ShortlinkError {
    fn from(err: std::io::Error) -> Self {
        ShortlinkError::ServerError(err.to_string())
    }
}

impl From<config::ConfigError> for ShortlinkError {
    fn from(err: config::ConfigError) -> Self {
        ShortlinkError::Config(err.to_string())
    }
}

impl ResponseError for ShortlinkError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!("{} {}", self.code(), self.format_simple());
        }
        HttpResponse::build(status)
            .insert_header(("Content-Type", "text/plain; charset=utf-8"))
            .body(self.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShortlinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let errors = [
            ShortlinkError::invalid_input("x"),
            ShortlinkError::not_found("x"),
            ShortlinkError::rate_limited("x"),
            ShortlinkError::store_unavailable("x"),
            ShortlinkError::store_rejected("x"),
            ShortlinkError::server_error("x"),
            ShortlinkError::config("x"),
            ShortlinkError::transport("x"),
            ShortlinkError::serialization("x"),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            ShortlinkError::invalid_input("bad").http_status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ShortlinkError::not_found("nope").http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ShortlinkError::rate_limited("slow down").http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ShortlinkError::store_unavailable("down").http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ShortlinkError::server_error("boom").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_format_simple() {
        let err = ShortlinkError::not_found("code 123");
        assert_eq!(err.format_simple(), "Resource Not Found: code 123");
        assert_eq!(err.to_string(), "Resource Not Found: code 123");
    }

    #[test]
    fn test_store_failure_classification() {
        assert!(ShortlinkError::store_unavailable("timeout").is_store_failure());
        assert!(ShortlinkError::store_rejected("duplicate").is_store_failure());
        assert!(!ShortlinkError::not_found("absent").is_store_failure());
    }
}
