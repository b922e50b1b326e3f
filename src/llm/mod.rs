//! LLM 层：模型网关与后端实现（HTTP 代理 / OpenAI 兼容 / Anthropic / 路由 / Mock）

pub mod anthropic;
pub mod gateway;
pub mod http;
pub mod mock;
pub mod openai;
pub mod router;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use gateway::{GatewayReply, ModelGateway, DEFAULT_TIMEOUT_SECS};
pub use http::HttpLlmClient;
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use router::{ModelRouter, RoutingLlmClient};
pub use traits::{GatewayError, GatewayRequest, InvocationMode, LlmClient, SamplingOptions};
