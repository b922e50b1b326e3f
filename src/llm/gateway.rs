//! 模型网关
//!
//! 持有一个 LlmClient 与硬超时，invoke 时：
//! - 超时返回 GatewayError::Timeout（时间到即丢弃请求 future，相当于中止出站调用）
//! - 空白输出不报错，返回 GatewayReply::Empty（带占位文本），交给调度器决定是否重试
//! - 不做任何重试，也不接触会话状态

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::llm::{GatewayError, GatewayRequest, InvocationMode, LlmClient};

/// 默认超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// 网关成功返回：正常内容，或空响应哨兵
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayReply {
    Content(String),
    Empty { placeholder: String },
}

impl GatewayReply {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    /// 展示用文本（空响应时为占位提示）
    pub fn text(&self) -> &str {
        match self {
            Self::Content(text) => text,
            Self::Empty { placeholder } => placeholder,
        }
    }
}

/// 调度器唯一依赖的外部能力：「用某个模式/角色调用模型 M」
#[derive(Clone)]
pub struct ModelGateway {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl ModelGateway {
    pub fn new(client: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        mode: InvocationMode,
        role: Option<&str>,
    ) -> Result<GatewayReply, GatewayError> {
        let request = GatewayRequest::new(model, prompt, mode).with_role(role);
        let start = Instant::now();
        let result = timeout(self.timeout, self.client.complete(&request)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(text)) if text.trim().is_empty() => {
                tracing::warn!(model, backend = self.client.name(), duration_ms, "empty model response");
                Ok(GatewayReply::Empty {
                    placeholder: format!("[{model} returned no response. Please try again.]"),
                })
            }
            Ok(Ok(text)) => {
                tracing::debug!(model, backend = self.client.name(), duration_ms, chars = text.chars().count(), "model response");
                Ok(GatewayReply::Content(text))
            }
            Ok(Err(e)) => {
                tracing::warn!(model, backend = self.client.name(), duration_ms, error = %e, "model call failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(model, backend = self.client.name(), "model call timed out");
                Err(GatewayError::Timeout {
                    model: model.to_string(),
                    after_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("client", &self.client.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[tokio::test]
    async fn test_content_passes_through() {
        let client = Arc::new(ScriptedLlmClient::new().reply("Nuclear power is safe."));
        let gateway = ModelGateway::new(client.clone(), DEFAULT_TIMEOUT_SECS);
        let reply = gateway
            .invoke("gpt-4o", "prompt", InvocationMode::Debate, None)
            .await
            .unwrap();
        assert_eq!(reply, GatewayReply::Content("Nuclear power is safe.".into()));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_response_becomes_sentinel() {
        let client = Arc::new(ScriptedLlmClient::new().reply("   \n"));
        let gateway = ModelGateway::new(client, DEFAULT_TIMEOUT_SECS);
        let reply = gateway
            .invoke("claude-3-5-haiku-latest", "prompt", InvocationMode::Conclusion, Some("critic"))
            .await
            .unwrap();
        assert!(reply.is_empty());
        assert!(reply.text().contains("claude-3-5-haiku-latest"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .with_latency(Duration::from_secs(30))
                .reply("too late"),
        );
        let gateway = ModelGateway::new(client, DEFAULT_TIMEOUT_SECS);
        let err = gateway
            .invoke("gpt-4o", "prompt", InvocationMode::Debate, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Timeout {
                model: "gpt-4o".into(),
                after_secs: 20
            }
        );
    }

    #[tokio::test]
    async fn test_upstream_error_is_not_retried() {
        let client = Arc::new(ScriptedLlmClient::new().fail(GatewayError::upstream("boom", Some(500))));
        let gateway = ModelGateway::new(client.clone(), DEFAULT_TIMEOUT_SECS);
        let err = gateway
            .invoke("gpt-4o", "prompt", InvocationMode::Debate, None)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::upstream("boom", Some(500)));
        assert_eq!(client.call_count(), 1);
    }
}
