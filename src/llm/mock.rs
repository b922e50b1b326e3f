//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! - MockLlmClient：按模式生成一段固定格式的回答，便于本地跑通完整流程
//! - ScriptedLlmClient：按队列依次返回预设结果，记录调用次数与请求，可模拟延迟

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{GatewayError, GatewayRequest, InvocationMode, LlmClient};

/// Mock 客户端：根据请求生成简短回答
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &GatewayRequest) -> Result<String, GatewayError> {
        let first_line = request
            .prompt
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("(no prompt)");
        Ok(match request.mode {
            InvocationMode::Debate => format!(
                "[mock {}] Regarding \"{}\", my position stands.",
                request.model, first_line
            ),
            InvocationMode::Conclusion => format!(
                "[mock {}] On \"{}\": the evidence points one way. In conclusion, it depends on execution.",
                request.model, first_line
            ),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 脚本化客户端：队列取尽后重复最后一个结果
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    last: Mutex<Option<Result<String, GatewayError>>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    pub fn fail(self, err: GatewayError) -> Self {
        self.push(Err(err))
    }

    /// 每次调用前等待（配合 tokio 暂停时钟测试超时 / 单飞）
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn push(self, item: Result<String, GatewayError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 已收到的请求（按调用顺序）
    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_result(&self) -> Result<String, GatewayError> {
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(item) = next {
            *last = Some(item.clone());
            item
        } else {
            last.clone()
                .unwrap_or_else(|| Err(GatewayError::upstream("script exhausted", None)))
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: &GatewayRequest) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_result()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
