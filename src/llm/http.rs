//! HTTP 代理客户端
//!
//! 对接按模型划分路由的代理服务：`POST {base_url}/api/{model}`，
//! 请求体 `{prompt, mode, role?, temperature?, ...}`，成功返回 `{result}`，失败返回 `{error}` + 非 2xx 状态。

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::llm::{GatewayError, GatewayRequest, LlmClient};

#[derive(Debug, Default, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 代理客户端：超时由 ModelGateway 统一施加，这里不设 reqwest 超时
pub struct HttpLlmClient {
    client: Client,
    base_url: String,
}

impl HttpLlmClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder().build().unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/api/{}", self.base_url, model)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &GatewayRequest) -> Result<String, GatewayError> {
        let resp = self
            .client
            .post(self.endpoint(&request.model))
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::upstream(format!("Request failed: {}", e), None))?;

        let status = resp.status();
        // 错误体可能不是 JSON，解析失败时按空体处理
        let body: ProxyResponse = resp.json().await.unwrap_or_default();

        if !status.is_success() {
            let message = body
                .error
                .unwrap_or_else(|| format!("API error: {}", status.as_u16()));
            return Err(GatewayError::upstream(message, Some(status.as_u16())));
        }

        Ok(body.result.unwrap_or_default())
    }

    fn name(&self) -> &str {
        "http"
    }
}
