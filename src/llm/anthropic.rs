//! Anthropic Messages API 客户端（reqwest 直连，非流式）
//!
//! 请求中的 model 直接作为 API 模型名（如 claude-3-7-sonnet-latest）；
//! 只取首个 text 内容块，非文本内容块视为上游错误。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::openai::system_prompt;
use crate::llm::{GatewayError, GatewayRequest, LlmClient};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

pub struct AnthropicClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .or_else(|| std::env::var("CLAUDE_API_KEY").ok())
            .unwrap_or_default();
        Self {
            client: Client::builder().build().unwrap_or_default(),
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key,
        }
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }
}

fn first_text(response: ApiResponse) -> Result<String, GatewayError> {
    match response.content.into_iter().next() {
        Some(ContentBlock::Text { text }) => Ok(text),
        Some(ContentBlock::Other) => Err(GatewayError::upstream(
            "Received a non-text response from Claude",
            None,
        )),
        None => Ok(String::new()),
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &GatewayRequest) -> Result<String, GatewayError> {
        if self.api_key.is_empty() {
            return Err(GatewayError::upstream("ANTHROPIC_API_KEY is not set", None));
        }

        let body = ApiRequest {
            model: &request.model,
            max_tokens: request.sampling.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: system_prompt(request.mode),
            messages: vec![ApiMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.sampling.temperature,
        };

        let resp = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::upstream(format!("Claude request failed: {}", e), None))?;

        let status = resp.status();
        if !status.is_success() {
            let detail: ApiErrorBody = resp.json().await.unwrap_or_default();
            let message = detail
                .error
                .map(|e| format!("Claude error: {}", e.message))
                .unwrap_or_else(|| format!("Claude error: HTTP {}", status.as_u16()));
            return Err(GatewayError::upstream(message, Some(status.as_u16())));
        }

        let parsed: ApiResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::upstream(format!("Claude response parse: {}", e), None))?;
        first_text(parsed)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
