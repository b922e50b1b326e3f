//! 编排器：由配置组装网关与调度器，并提供命令驱动的会话控制循环
//!
//! 负责：加载配置、选择 LLM 后端、创建 TurnScheduler；
//! spawn_controller 在后台任务中消费调用方命令（Step / StartAuto / StopAuto / Summarize / Reset / Quit）。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{load_config, AppConfig};
use crate::core::{SchedulerSettings, StepOutcome, TurnScheduler};
use crate::llm::{
    AnthropicClient, HttpLlmClient, LlmClient, MockLlmClient, ModelGateway, ModelRouter,
    OpenAiClient, RoutingLlmClient,
};

const DEFAULT_HTTP_BASE_URL: &str = "http://localhost:3000";

/// 调用方发往调度器的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 手动推进一步
    Step,
    StartAuto,
    StopAuto,
    /// 辩论结束后用指定模型生成总结
    Summarize(String),
    /// 清空会话（保留可用模型列表）
    Reset,
    Quit,
}

fn has_env(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| !v.trim().is_empty())
}

/// 按模型前缀分发：gpt / o1 / o3 走 OpenAI，claude 走 Anthropic；缺少 Key 的后端回退到 Mock
fn routed_client(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let mut router = ModelRouter::new();
    let mut any_real = false;

    if has_env("OPENAI_API_KEY") {
        let openai: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(cfg.gateway.base_url.as_deref(), None));
        router = router
            .route_prefix("gpt", openai.clone())
            .route_prefix("o1", openai.clone())
            .route_prefix("o3", openai);
        any_real = true;
    }
    if has_env("ANTHROPIC_API_KEY") || has_env("CLAUDE_API_KEY") {
        router = router.route_prefix("claude", Arc::new(AnthropicClient::new(None)));
        any_real = true;
    }
    if !any_real {
        tracing::warn!("No API key set, routed gateway falls back to Mock LLM");
    }
    Arc::new(RoutingLlmClient::new(router.fallback(Arc::new(MockLlmClient))))
}

/// 根据配置选择 LLM 后端（HTTP 代理 / OpenAI / Anthropic / 路由 / Mock）
pub fn create_client_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.gateway.provider.to_lowercase();
    match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient)
        }
        "http" => {
            let base = cfg.gateway.base_url.as_deref().unwrap_or(DEFAULT_HTTP_BASE_URL);
            tracing::info!("Using HTTP gateway ({})", base);
            Arc::new(HttpLlmClient::new(base))
        }
        "openai" => {
            tracing::info!("Using OpenAI LLM");
            Arc::new(OpenAiClient::new(cfg.gateway.base_url.as_deref(), None))
        }
        "anthropic" => {
            tracing::info!("Using Anthropic LLM");
            Arc::new(AnthropicClient::new(None))
        }
        "routed" => routed_client(cfg),
        other => {
            tracing::warn!("Unknown gateway provider '{}', using routed backends", other);
            routed_client(cfg)
        }
    }
}

pub fn create_gateway_from_config(cfg: &AppConfig) -> ModelGateway {
    ModelGateway::new(create_client_from_config(cfg), cfg.gateway.timeout_secs)
}

/// 加载配置并创建调度器；配置加载失败时使用默认配置
pub fn create_scheduler(config_path: Option<PathBuf>) -> (Arc<TurnScheduler>, AppConfig) {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let scheduler = TurnScheduler::new(
        create_gateway_from_config(&cfg),
        cfg.app.usable_models.clone(),
        SchedulerSettings::from(&cfg.scheduler),
    );
    (Arc::new(scheduler), cfg)
}

/// 后台消费命令；cmd_tx 关闭或收到 Quit 时退出并停止自动推进
pub fn spawn_controller(
    scheduler: Arc<TurnScheduler>,
) -> (mpsc::UnboundedSender<Command>, JoinHandle<()>) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();

    let handle = tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Step => {
                    let outcome = scheduler.step().await;
                    if outcome == StepOutcome::Busy {
                        tracing::debug!("step ignored while another action is in flight");
                    }
                }
                Command::StartAuto => {
                    if !scheduler.start_auto().await {
                        tracing::debug!("auto-progress not started");
                    }
                }
                Command::StopAuto => {
                    scheduler.stop_auto().await;
                }
                Command::Summarize(model) => {
                    if let Err(e) = scheduler.summarize_debate(&model).await {
                        tracing::warn!("summary failed: {}", e);
                    }
                }
                Command::Reset => scheduler.reset(true).await,
                Command::Quit => break,
            }
        }
        scheduler.stop_auto().await;
    });

    (cmd_tx, handle)
}
