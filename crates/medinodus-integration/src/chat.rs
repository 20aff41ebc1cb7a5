//! 对话模型客户端
//!
//! 对接Ollama兼容的 `/api/chat` 接口，同一个客户端既用于带图片的文字提取，
//! 也用于纯文本的分析生成。进程内只创建一个实例并显式注入。

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::connectors::Connector;

/// 对话请求
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

/// 单条消息，图片以base64编码
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// 对话模型客户端
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            api_key,
        })
    }

    /// 发送一轮对话，返回模型输出文本
    pub async fn chat(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
        images: &[&[u8]],
    ) -> Result<String> {
        let start = Instant::now();
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system.to_string(),
                images: None,
            });
        }

        let encoded: Vec<String> = images
            .iter()
            .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
            .collect();
        messages.push(ChatMessage {
            role: "user",
            content: prompt.to_string(),
            images: if encoded.is_empty() { None } else { Some(encoded) },
        });

        let body = ChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: 0.0,
                num_predict: 2048,
            },
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("Chat request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("Chat model returned {}", status));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to decode chat response")?;

        info!(
            model = %model,
            images = images.len(),
            elapsed_ms = %start.elapsed().as_millis(),
            output_len = parsed.message.content.len(),
            "Chat completion finished"
        );
        Ok(parsed.message.content)
    }
}

#[async_trait]
impl Connector for ChatClient {
    fn name(&self) -> &str {
        "chat-model"
    }

    async fn check_connection(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;
        debug!("Chat model health check: {}", response.status());
        Ok(response.status().is_success())
    }
}
