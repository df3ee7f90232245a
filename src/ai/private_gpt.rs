//! PrivateGPT API クライアント（セルフホスト型バックエンド）

use super::chat::{ChatMessage, ChatResponse};
use super::CompletionError;
use crate::parser::PostProcessor;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// セルフホスト型バックエンドの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateGptConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub post_processor: PostProcessor,
}

impl Default for PrivateGptConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 8001,
            timeout: Duration::from_secs(720),
            post_processor: PostProcessor::Ollama,
        }
    }
}

impl PrivateGptConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// PrivateGPT クライアント
pub struct PrivateGptClient {
    config: PrivateGptConfig,
    base_url: String,
    http_client: reqwest::Client,
}

impl PrivateGptClient {
    pub fn new(config: PrivateGptConfig) -> Result<Self, CompletionError> {
        let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let base_url = config.base_url();
        Ok(Self {
            config,
            base_url,
            http_client,
        })
    }

    pub fn post_processor(&self) -> PostProcessor {
        self.config.post_processor
    }

    /// ヘルスチェック（`/health`）
    pub async fn health(&self) -> Result<String, CompletionError> {
        let response = self
            .http_client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let health: HealthResponse = response.json().await?;
        Ok(health.status)
    }

    /// コンテキスト検索なしでチャット補完を呼び出す
    pub async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, CompletionError> {
        let request = build_request(system_prompt, user_text);

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.into_content().ok_or(CompletionError::EmptyResponse)
    }
}

fn build_request(system_prompt: &str, user_text: &str) -> PrivateGptRequest {
    PrivateGptRequest {
        messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_text)],
        use_context: false,
        include_sources: false,
        stream: false,
    }
}

// PrivateGPT リクエスト/レスポンス構造体

#[derive(Debug, Serialize)]
struct PrivateGptRequest {
    messages: Vec<ChatMessage>,
    use_context: bool,
    include_sources: bool,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}
