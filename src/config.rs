//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AGORA__*` 覆盖（双下划线表示嵌套，如 `AGORA__GATEWAY__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub gateway: GatewaySection,
    pub scheduler: SchedulerSection,
}

/// [app] 段：可选模型列表
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 可参与会话的模型；reset 不保留时恢复为此列表
    #[serde(default = "default_usable_models")]
    pub usable_models: Vec<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            usable_models: default_usable_models(),
        }
    }
}

fn default_usable_models() -> Vec<String> {
    vec![
        "gpt-4o".into(),
        "claude-3-5-haiku-latest".into(),
        "claude-3-7-sonnet-latest".into(),
    ]
}

/// [gateway] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    /// 后端：http / openai / anthropic / routed / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    /// http 后端的服务地址，或 openai 兼容端点
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "routed".to_string()
}

fn default_timeout_secs() -> u64 {
    crate::llm::DEFAULT_TIMEOUT_SECS
}

/// [scheduler] 段：重试、延迟、提示时长、讨论阶段数
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// 自动推进时两次发言之间的间隔
    #[serde(default = "default_turn_delay_ms")]
    pub turn_delay_ms: u64,
    #[serde(default = "default_notice_ttl_secs")]
    pub notice_ttl_secs: u64,
    #[serde(default = "default_max_conversation_stages")]
    pub max_conversation_stages: u32,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_retry: default_max_retry(),
            retry_backoff_ms: default_retry_backoff_ms(),
            turn_delay_ms: default_turn_delay_ms(),
            notice_ttl_secs: default_notice_ttl_secs(),
            max_conversation_stages: default_max_conversation_stages(),
        }
    }
}

fn default_max_retry() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1500
}

fn default_turn_delay_ms() -> u64 {
    1000
}

fn default_notice_ttl_secs() -> u64 {
    5
}

fn default_max_conversation_stages() -> u32 {
    crate::session::MAX_CONVERSATION_STAGES
}

/// 从 config 目录加载配置，环境变量 AGORA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AGORA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AGORA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
