//! OpenAI API クライアント（ホスト型バックエンド）

use super::chat::{ChatMessage, ChatResponse};
use super::CompletionError;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// ホスト型バックエンドの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// OpenAI Chat Completions クライアント
pub struct OpenAiClient {
    config: OpenAiConfig,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http_client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// システムプロンプトとユーザーテキストを送り、応答本文を返す
    pub async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, CompletionError> {
        let request = build_request(&self.config.model, system_prompt, user_text);
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
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

fn build_request(model: &str, system_prompt: &str, user_text: &str) -> OpenAiRequest {
    OpenAiRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_text)],
        response_format: ResponseFormatParam {
            format_type: "json_object".to_string(),
        },
    }
}

// OpenAI リクエスト構造体

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormatParam,
}

#[derive(Debug, Serialize)]
struct ResponseFormatParam {
    #[serde(rename = "type")]
    format_type: String,
}
