use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// 消息通道提供商类型
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Default,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    /// 本地沙箱，不发起任何网络请求
    #[default]
    Sandbox,
    /// Twilio REST API
    Twilio,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// 未登记号码的授权策略
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Default,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConsentPolicy {
    /// 必须显式 opt-in 才能发送
    #[default]
    RequireOptIn,
    /// 只要没有 opt-out 就允许发送
    AllowUnlessOptedOut,
}

impl std::fmt::Display for ConsentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 服务器地址、端口、CPU 数量
/// - logging: 日志配置
/// - api: API 鉴权和限流
/// - provider: 消息通道提供商
/// - quota: 每分钟发送配额
/// - consent: 授权策略和快照
/// - phone: 号码规范化
/// - callbacks: 回调鉴权和公网地址
/// - delivery: 投递状态保留策略
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub consent: ConsentConfig,
    #[serde(default)]
    pub phone: PhoneConfig,
    #[serde(default)]
    pub callbacks: CallbackConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：SR，分隔符：__
    /// 示例：SR__SERVER__PORT=9999
    pub fn load() -> Self {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 SR，分隔符 __
            .add_source(
                Environment::with_prefix("SR")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default)]
    pub unix_socket: Option<String>,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
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

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token，为空时 API 关闭
    #[serde(default)]
    pub token: String,
    /// 单个 IP 每秒请求数
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u64,
    /// 单个 IP 突发请求数
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// 请求体大小上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// 消息通道提供商配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// 默认发送号码（E.164）
    #[serde(default)]
    pub from_number: Option<String>,
    /// Messaging Service SID，设置后优先于 from_number
    #[serde(default)]
    pub messaging_service_sid: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_lookup_base_url")]
    pub lookup_base_url: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    /// 语音播报使用的音色
    #[serde(default = "default_voice")]
    pub default_voice: String,
}

/// 发送配额配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// 全局每分钟发送上限，0 表示不限制
    #[serde(default = "default_quota_per_minute")]
    pub per_minute: u32,
    /// 单个号码每分钟发送上限，0 表示不限制
    #[serde(default)]
    pub per_recipient_per_minute: u32,
}

/// 授权（consent）配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConsentConfig {
    #[serde(default)]
    pub policy: ConsentPolicy,
    /// JSON 快照文件路径，为空时只保存在内存中
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

/// 号码规范化配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhoneConfig {
    /// 未带 `+` 的号码使用的默认国家码，如 "1"
    #[serde(default)]
    pub default_country_code: Option<String>,
}

/// 运营商回调配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallbackConfig {
    /// 回调共享密钥，为空时不校验
    #[serde(default)]
    pub token: String,
    /// 对外可访问的地址，如 https://relay.example.com，用于生成 StatusCallback
    #[serde(default)]
    pub public_base_url: Option<String>,
}

/// 投递状态配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_delivery_max_records")]
    pub max_records: u64,
    #[serde(default = "default_delivery_ttl")]
    pub ttl_secs: u64,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
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

fn default_requests_per_second() -> u64 {
    20
}

fn default_burst() -> u32 {
    40
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_api_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_lookup_base_url() -> String {
    "https://lookups.twilio.com".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_voice() -> String {
    "alice".to_string()
}

fn default_quota_per_minute() -> u32 {
    60
}

fn default_delivery_max_records() -> u64 {
    100_000
}

fn default_delivery_ttl() -> u64 {
    7 * 24 * 3600
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            unix_socket: None,
            cpu_count: default_cpu_count(),
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

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: None,
            messaging_service_sid: None,
            api_base_url: default_api_base_url(),
            lookup_base_url: default_lookup_base_url(),
            timeout_secs: default_provider_timeout(),
            default_voice: default_voice(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            per_minute: default_quota_per_minute(),
            per_recipient_per_minute: 0,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_records: default_delivery_max_records(),
            ttl_secs: default_delivery_ttl(),
        }
    }
}
