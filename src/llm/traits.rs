//! LLM 客户端抽象
//!
//! 所有后端（HTTP 代理 / OpenAI 兼容 / Anthropic / Mock）实现 LlmClient：
//! 接收一个 GatewayRequest，返回原始文本（可能为空白，由 ModelGateway 归一化）。

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// 调用模式：决定后端的系统提示词与采样参数
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum InvocationMode {
    Debate,
    Conclusion,
}

impl std::fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debate => write!(f, "Debate"),
            Self::Conclusion => write!(f, "Conclusion"),
        }
    }
}

/// 采样参数；Debate 模式只设 temperature，其余交给后端默认值
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SamplingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
}

impl SamplingOptions {
    /// Conclusion 模式：更低温度、允许自然重复，便于多位专家收敛
    pub fn for_mode(mode: InvocationMode) -> Self {
        match mode {
            InvocationMode::Debate => Self {
                temperature: Some(0.7),
                ..Self::default()
            },
            InvocationMode::Conclusion => Self {
                temperature: Some(0.5),
                top_p: Some(0.9),
                max_tokens: Some(2000),
                presence_penalty: Some(-0.5),
                frequency_penalty: Some(-0.3),
            },
        }
    }
}

/// 一次模型调用的完整请求
#[derive(Clone, Debug, Serialize)]
pub struct GatewayRequest {
    #[serde(skip)]
    pub model: String,
    pub prompt: String,
    pub mode: InvocationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub sampling: SamplingOptions,
}

impl GatewayRequest {
    pub fn new(model: &str, prompt: impl Into<String>, mode: InvocationMode) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.into(),
            mode,
            role: None,
            sampling: SamplingOptions::for_mode(mode),
        }
    }

    pub fn with_role(mut self, role: Option<&str>) -> Self {
        self.role = role.filter(|r| !r.is_empty()).map(String::from);
        self
    }
}

/// 网关错误：超时或上游失败（非 2xx、传输错误、响应无法解析）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{model} timed out after {after_secs}s")]
    Timeout { model: String, after_secs: u64 },

    #[error("{message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },
}

impl GatewayError {
    pub fn upstream(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Upstream {
            message: message.into(),
            status,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Upstream { status: Some(429), .. })
    }

    /// 面向用户的错误文案；429 单独提示限流
    pub fn display_message(&self) -> String {
        match self {
            Self::Timeout { model, .. } => {
                format!("{model} took too long to respond. Please try again.")
            }
            Self::Upstream { status: Some(429), .. } => {
                "API rate limit exceeded. Please wait a moment and try again.".to_string()
            }
            Self::Upstream { message, .. } => message.clone(),
        }
    }
}

/// LLM 客户端 trait：单次非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 返回模型原始输出；空白输出不视为错误
    async fn complete(&self, request: &GatewayRequest) -> Result<String, GatewayError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conclusion_sampling_matches_reference() {
        let opts = SamplingOptions::for_mode(InvocationMode::Conclusion);
        assert_eq!(opts.temperature, Some(0.5));
        assert_eq!(opts.top_p, Some(0.9));
        assert_eq!(opts.max_tokens, Some(2000));
        assert_eq!(opts.presence_penalty, Some(-0.5));
        assert_eq!(opts.frequency_penalty, Some(-0.3));
    }

    #[test]
    fn test_request_body_flattens_sampling() {
        let req = GatewayRequest::new("gpt-4o", "hello", InvocationMode::Conclusion)
            .with_role(Some("critic"));
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["mode"], "Conclusion");
        assert_eq!(body["role"], "critic");
        assert_eq!(body["top_p"], 0.9_f32 as f64);
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_empty_role_is_dropped() {
        let req = GatewayRequest::new("gpt-4o", "p", InvocationMode::Debate).with_role(Some(""));
        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("role").is_none());
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn test_rate_limit_message() {
        let err = GatewayError::upstream("too many", Some(429));
        assert!(err.is_rate_limited());
        assert!(err.display_message().contains("rate limit"));

        let other = GatewayError::upstream("boom", Some(500));
        assert!(!other.is_rate_limited());
        assert_eq!(other.display_message(), "boom");
    }
}
