use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::errors::{Result, ShortlinkError};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// 环境变量前缀，示例：SHORTLINK__SERVER__PORT=9000
pub const ENV_PREFIX: &str = "SHORTLINK";

/// `GET /{code}` 命中后的响应方式
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RedirectMode {
    /// 302 + Location
    #[default]
    Redirect,
    /// 200 文本 "From cache: ..." / "Fetched and cached: ..."
    Echo,
}

/// 存储后端
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreBackend {
    /// PostgREST / Supabase 风格的 REST 接口
    #[default]
    Rest,
    /// 进程内存储，重启即丢失
    Memory,
}

/// 静态配置（启动时从 YAML + 环境变量加载）
///
/// - server: 监听地址、公开域名、重定向方式
/// - store: 持久化存储
/// - cache: 短码缓存
/// - rate_limit: 按客户端限流
/// - bot: Telegram Bot
/// - logging: 日志
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 YAML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > 配置文件 > 默认值。文件不存在时只用环境变量和默认值。
    pub fn load(path: &str) -> Result<Self> {
        use config::{Config, Environment, File};

        let settings = Config::builder()
            // 1. 配置文件（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 环境变量覆盖
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: StaticConfig = settings.try_deserialize()?;

        if std::path::Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }

        Ok(config)
    }

    /// 短链接前缀（不带结尾斜杠）
    ///
    /// 显式配置的 `public_url` 优先；否则 443 → https，80 → http，其它端口带上端口号。
    pub fn public_base_url(&self) -> String {
        if let Some(url) = self
            .server
            .public_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            return url.trim_end_matches('/').to_string();
        }

        let host = &self.server.host_name;
        match self.server.port {
            443 => format!("https://{}", host),
            80 => format!("http://{}", host),
            port => format!("http://{}:{}", host, port),
        }
    }

    /// 加载后校验
    pub fn validated(self) -> Result<Self> {
        super::validators::validate_config(&self)
            .map_err(|errors| ShortlinkError::config(errors.join("; ")))?;
        Ok(self)
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 对外域名，用于拼接短链接
    #[serde(default = "default_host_name")]
    pub host_name: String,
    /// 完整的对外前缀（如 https://s.example.com），优先于 host_name
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub redirect_mode: RedirectMode,
    /// 为 true 时 `POST /short` 必须带 X-Telegram-ID
    #[serde(default)]
    pub require_owner_header: bool,
    /// 这些代理转发的 X-Forwarded-For 才会被采信（IP 或 CIDR）
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 持久化存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// REST 基础地址，如 https://xyz.supabase.co
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// 单次请求超时（秒）
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
    /// 启动时检查并创建表
    #[serde(default)]
    pub run_migrations: bool,
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_sweep_interval")]
    pub sweep_interval_secs: u64,
}

/// 限流配置（令牌桶）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 桶容量
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// 每个周期补充的令牌数
    #[serde(default = "default_refill_tokens")]
    pub refill_tokens: u32,
    #[serde(default = "default_refill_period")]
    pub refill_period_secs: u64,
    /// 超过该时长未访问的客户端会被清理
    #[serde(default = "default_inactivity")]
    pub inactivity_secs: u64,
    #[serde(default = "default_limiter_sweep_interval")]
    pub sweep_interval_secs: u64,
}

/// Telegram Bot 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    /// 对每个会话也做限流（键为 chat:<id>）
    #[serde(default = "default_rate_limit_chats")]
    pub rate_limit_chats: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_host_name() -> String {
    "localhost".to_string()
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_store_timeout() -> u64 {
    10
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_cache_sweep_interval() -> u64 {
    1200
}

fn default_burst() -> u32 {
    2
}

fn default_refill_tokens() -> u32 {
    2
}

fn default_refill_period() -> u64 {
    30
}

fn default_inactivity() -> u64 {
    180
}

fn default_limiter_sweep_interval() -> u64 {
    60
}

fn default_bot_enabled() -> bool {
    false
}

fn default_rate_limit_chats() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            host_name: default_host_name(),
            public_url: None,
            redirect_mode: RedirectMode::default(),
            require_owner_header: false,
            trusted_proxies: Vec::new(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: String::new(),
            api_key: String::new(),
            timeout_secs: default_store_timeout(),
            run_migrations: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_cache_sweep_interval(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: default_burst(),
            refill_tokens: default_refill_tokens(),
            refill_period_secs: default_refill_period(),
            inactivity_secs: default_inactivity(),
            sweep_interval_secs: default_limiter_sweep_interval(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            enabled: default_bot_enabled(),
            token: String::new(),
            rate_limit_chats: default_rate_limit_chats(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
