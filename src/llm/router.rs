//! 按模型路由的客户端
//!
//! 每个参与者是一个模型 ID（如 gpt-4o、claude-3-7-sonnet-latest），不同厂商走不同后端：
//! - 精确匹配：某个模型 ID 绑定指定后端
//! - 前缀匹配：如 `gpt-` → OpenAI，`claude-` → Anthropic（最长前缀优先）
//! - 兜底：默认后端

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{GatewayError, GatewayRequest, LlmClient};

/// 模型路由表
#[derive(Default)]
pub struct ModelRouter {
    exact: HashMap<String, Arc<dyn LlmClient>>,
    prefixes: Vec<(String, Arc<dyn LlmClient>)>,
    fallback: Option<Arc<dyn LlmClient>>,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定单个模型
    pub fn route_model(mut self, model: &str, client: Arc<dyn LlmClient>) -> Self {
        self.exact.insert(model.to_string(), client);
        self
    }

    /// 绑定模型前缀
    pub fn route_prefix(mut self, prefix: &str, client: Arc<dyn LlmClient>) -> Self {
        self.prefixes.push((prefix.to_string(), client));
        // 最长前缀优先
        self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    pub fn fallback(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.fallback = Some(client);
        self
    }

    pub fn select(&self, model: &str) -> Option<&Arc<dyn LlmClient>> {
        if let Some(client) = self.exact.get(model) {
            return Some(client);
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix.as_str()))
            .map(|(_, client)| client)
            .or(self.fallback.as_ref())
    }
}

/// 路由型 LLM 客户端
pub struct RoutingLlmClient {
    router: ModelRouter,
    calls: AtomicUsize,
}

impl RoutingLlmClient {
    pub fn new(router: ModelRouter) -> Self {
        Self {
            router,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmClient for RoutingLlmClient {
    async fn complete(&self, request: &GatewayRequest) -> Result<String, GatewayError> {
        let client = self.router.select(&request.model).ok_or_else(|| {
            GatewayError::upstream(format!("No backend configured for model {}", request.model), None)
        })?;
        self.calls.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(model = %request.model, backend = client.name(), "routing model call");
        client.complete(request).await
    }

    fn name(&self) -> &str {
        "router"
    }
}
