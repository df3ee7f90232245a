//! AI補完モジュール - ホスト型（OpenAI）とセルフホスト型（PrivateGPT）のバックエンド

mod chat;
pub mod openai;
pub mod private_gpt;
pub mod prompt;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use private_gpt::{PrivateGptClient, PrivateGptConfig};
pub use prompt::{build_prompt, user_message, PromptSettings};

use crate::parser::{normalize, ExtractionResult, ResponseFormat};
use async_trait::async_trait;
use tracing::{error, info, warn};

/// 補完呼び出しのエラー
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("APIリクエストに失敗: {0}")]
    Http(#[from] reqwest::Error),
    #[error("APIエラー ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("APIの応答に本文がありません")]
    EmptyResponse,
}

/// プロンプトを送って生の応答文字列を受け取る能力
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, CompletionError>;

    /// 応答の形（後処理が必要かどうか）
    fn response_format(&self) -> ResponseFormat;
}

/// 設定で選択されたバックエンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Hosted(OpenAiConfig),
    SelfHosted(PrivateGptConfig),
}

/// 起動時に一度だけ構築し、参照で各処理に渡す
pub enum CompletionBackend {
    Hosted(OpenAiClient),
    SelfHosted(PrivateGptClient),
}

impl CompletionBackend {
    /// 設定からクライアントを構築する。セルフホスト型ではヘルスチェックも行う（失敗は警告のみ）
    pub async fn connect(config: BackendConfig) -> Result<Self, CompletionError> {
        match config {
            BackendConfig::Hosted(config) => {
                let client = OpenAiClient::new(config)?;
                info!("OpenAI バックエンドを使用 (model: {})", client.model());
                Ok(Self::Hosted(client))
            }
            BackendConfig::SelfHosted(config) => {
                let base_url = config.base_url();
                let client = PrivateGptClient::new(config)?;
                info!(
                    "PrivateGPT バックエンドを使用 ({}, 後処理: {})",
                    base_url,
                    client.post_processor()
                );
                match client.health().await {
                    Ok(status) => info!("PrivateGPT ヘルスチェック ({}): {}", base_url, status),
                    Err(e) => warn!("PrivateGPT ヘルスチェックに失敗 ({}): {}", base_url, e),
                }
                Ok(Self::SelfHosted(client))
            }
        }
    }
}

#[async_trait]
impl CompletionClient for CompletionBackend {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, CompletionError> {
        match self {
            Self::Hosted(client) => client.complete(system_prompt, user_text).await,
            Self::SelfHosted(client) => client.complete(system_prompt, user_text).await,
        }
    }

    fn response_format(&self) -> ResponseFormat {
        match self {
            Self::Hosted(_) => ResponseFormat::JsonObject,
            Self::SelfHosted(client) => ResponseFormat::RawText(client.post_processor()),
        }
    }
}

/// 文書テキストから会社名・日付・種別を抽出
///
/// 通信エラーなどはログに残してセンチネル値の結果を返す（バッチは止めない）。
pub async fn extract_fields<C>(client: &C, system_prompt: &str, text: &str) -> ExtractionResult
where
    C: CompletionClient + ?Sized,
{
    match client.complete(system_prompt, &user_message(text)).await {
        Ok(raw) => {
            info!("API応答: {}", raw);
            normalize(&raw, client.response_format())
        }
        Err(e) => {
            error!("API呼び出し中にエラー: {}", e);
            ExtractionResult::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PostProcessor;

    struct Canned {
        reply: Result<&'static str, ()>,
        format: ResponseFormat,
    }

    #[async_trait]
    impl CompletionClient for Canned {
        async fn complete(&self, _system: &str, user_text: &str) -> Result<String, CompletionError> {
            assert!(user_text.contains("Rechnung"));
            self.reply
                .map(str::to_string)
                .map_err(|_| CompletionError::EmptyResponse)
        }

        fn response_format(&self) -> ResponseFormat {
            self.format
        }
    }

    #[tokio::test]
    async fn structured_reply_is_normalized() {
        let client = Canned {
            reply: Ok(r#"{"company_name":"Acme","document_date":"01.02.2024","document_type":"ER"}"#),
            format: ResponseFormat::JsonObject,
        };
        let result = extract_fields(&client, "prompt", "Rechnung").await;
        assert_eq!(result.company_name, "Acme");
        assert_eq!(result.document_date, "01.02.2024");
    }

    #[tokio::test]
    async fn chatty_local_reply_is_post_processed() {
        let client = Canned {
            reply: Ok("Here is the JSON:\n{\"company_name\":\"Acme\",\"document_date\":\"\",\"document_type\":\"AR\"}\nDone."),
            format: ResponseFormat::RawText(PostProcessor::Ollama),
        };
        let result = extract_fields(&client, "prompt", "Rechnung").await;
        assert_eq!(result.company_name, "Acme");
        assert_eq!(result.document_date, crate::parser::DEFAULT_DATE);
        assert_eq!(result.document_type, "AR");
    }

    #[tokio::test]
    async fn call_failure_degrades_to_unknown() {
        let client = Canned {
            reply: Err(()),
            format: ResponseFormat::JsonObject,
        };
        let result = extract_fields(&client, "prompt", "Rechnung").await;
        assert_eq!(result, ExtractionResult::unknown());
    }

    #[test]
    fn backend_reports_response_format() {
        let hosted = CompletionBackend::Hosted(OpenAiClient::new(OpenAiConfig::new("sk-test")).unwrap());
        assert_eq!(hosted.response_format(), ResponseFormat::JsonObject);

        let local = CompletionBackend::SelfHosted(PrivateGptClient::new(PrivateGptConfig::default()).unwrap());
        assert_eq!(local.response_format(), ResponseFormat::RawText(PostProcessor::Ollama));
    }
}
