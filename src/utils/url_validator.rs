//! URL 验证模块
//!
//! 只接受 http:// 与 https://，协议后至少还要有一个字符。
//! 校验发生在任何副作用之前（哈希、缓存、存储）。

/// URL 验证错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    EmptyUrl,
    InvalidProtocol(String),
    MissingTarget,
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
            Self::MissingTarget => write!(f, "URL has nothing after the scheme"),
        }
    }
}

impl std::error::Error for UrlValidationError {}

const ALLOWED_SCHEMES: &[&str] = &["http://", "https://"];

/// 验证 URL
///
/// 协议名大小写不敏感；不做更严格的语法解析，`http://a b` 这种也放行。
pub fn validate_url(url: &str) -> Result<(), UrlValidationError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(UrlValidationError::EmptyUrl);
    }

    let url_lower = url.to_lowercase();

    let Some(scheme) = ALLOWED_SCHEMES.iter().find(|s| url_lower.starts_with(*s)) else {
        let proto = url_lower
            .split(':')
            .next()
            .map(|s| format!("{}:", s))
            .unwrap_or_default();
        return Err(UrlValidationError::InvalidProtocol(proto));
    };

    if url.len() == scheme.len() {
        return Err(UrlValidationError::MissingTarget);
    }

    Ok(())
}

/// 获取 URL 验证错误的用户友好消息
pub fn validation_error_message(error: &UrlValidationError) -> &'static str {
    match error {
        UrlValidationError::EmptyUrl => "URL cannot be empty",
        UrlValidationError::InvalidProtocol(_) => "URL must start with http:// or https://",
        UrlValidationError::MissingTarget => "Invalid URL format",
    }
}
