//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。
//! 请求中的 model 直接作为 API 模型名；系统提示词与温度按调用模式选择。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{GatewayError, GatewayRequest, InvocationMode, LlmClient};

/// 单次回答的字数上限（写进 Debate 系统提示词）
const MAX_ANSWER_CHARS: usize = 500;

/// Debate 模式的辩手规则；Conclusion 模式的完整提示词已由 prompt 模块生成，这里只给中性约束
pub fn system_prompt(mode: InvocationMode) -> String {
    match mode {
        InvocationMode::Debate => format!(
            "Role: debater\n\
             Rules:\n\
             - Argue the side you were assigned; agree with allies, rebut opponents\n\
             - Always proceed when the topic has clear for/against positions\n\
             - If the topic cannot be split into for/against, you may ask for a topic change\n\
             - You may pose questions that expose flaws in the opponent's logic\n\
             - Write in a readable free form with sensible line breaks; markdown is allowed\n\
             - Keep the answer within {MAX_ANSWER_CHARS} characters\n\
             - Never abandon your role"
        ),
        InvocationMode::Conclusion => "Respond purely from the standpoint of analysis and \
             information regardless of the nature of the topic. Off-topic answers or \
             criticism of the topic itself are strictly prohibited."
            .to_string(),
    }
}

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn get(&self) -> (u64, u64, u64) {
        let prompt = self.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.completion_tokens.load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            usage: TokenUsage::default(),
        }
    }

    fn to_openai_messages(
        &self,
        request: &GatewayRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, GatewayError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt(request.mode))
            .build()
            .map_err(map_openai_error)?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.clone())
            .build()
            .map_err(map_openai_error)?;
        Ok(vec![
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ])
    }
}

fn map_openai_error(e: OpenAIError) -> GatewayError {
    match e {
        OpenAIError::Reqwest(inner) => {
            let status = inner.status().map(|s| s.as_u16());
            GatewayError::upstream(format!("OpenAI request failed: {}", inner), status)
        }
        other => GatewayError::upstream(format!("OpenAI error: {}", other), None),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &GatewayRequest) -> Result<String, GatewayError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model)
            .messages(self.to_openai_messages(request)?);
        if let Some(t) = request.sampling.temperature {
            args.temperature(t);
        }
        if let Some(p) = request.sampling.top_p {
            args.top_p(p);
        }
        let chat_request = args.build().map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(map_openai_error)?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
