//! 設定の読み込み - YAMLファイルと環境変数（.env を含む）

use crate::ai::{BackendConfig, OpenAiConfig, PrivateGptConfig, PromptSettings};
use crate::parser::{PostProcessor, UnknownPostProcessor};
use crate::pdf::OcrSettings;
use crate::rename::{is_valid_date_format, CounterStyle, DEFAULT_DATE_FORMAT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 設定エラー（いずれもバッチ全体を中止する）
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("設定ファイル {} を読み込めません: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("設定ファイル {} の解析に失敗: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("OPENAI_API_KEY が設定されていません")]
    MissingApiKey,
    #[error(transparent)]
    UnknownPostProcessor(#[from] UnknownPostProcessor),
    #[error("{key} の値が不正です: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

// YAML ファイルの構造

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub company: CompanySection,
    #[serde(default)]
    pub private_ai: PrivateAiSection,
    #[serde(default)]
    pub pdf: PdfSection,
    #[serde(default)]
    pub ocr: OcrSection,
    pub output_language: Option<String>,
    pub date_format: Option<String>,
    pub prompt_extension: Option<String>,
    pub ocr_languages: Option<String>,
    pub counter_style: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanySection {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrivateAiSection {
    pub enabled: Option<bool>,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<u64>,
    pub post_processor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PdfSection {
    pub outgoing_invoice: Option<String>,
    pub incoming_invoice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OcrSection {
    pub program: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub page_timeout: Option<u32>,
    pub jobs: Option<usize>,
    pub work_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Option<Self> = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.unwrap_or_default())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }
}

/// 実行時に使う確定済みの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub prompt: PromptSettings,
    pub date_format: String,
    pub counter_style: CounterStyle,
    pub ocr: OcrSettings,
}

impl AppConfig {
    /// 設定ファイルとプロセス環境変数から読み込む
    ///
    /// `explicit` が指定されている場合はファイルが必須。
    /// 省略時は `default_path` を使い、存在しなければ環境変数のみで構成する。
    pub fn load(explicit: Option<&Path>, default_path: &Path) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) => FileConfig::load(path)?,
            None if default_path.exists() => FileConfig::load(default_path)?,
            None => {
                tracing::warn!("設定ファイル {} が見つかりません。環境変数のみを使用します", default_path.display());
                FileConfig::default()
            }
        };

        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// ファイルの値に環境変数を上書きして確定する
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let private_enabled = match var("PRIVATEAI_ENABLED") {
            Some(value) => parse_bool("PRIVATEAI_ENABLED", &value)?,
            None => file.private_ai.enabled.unwrap_or(false),
        };

        let backend = if private_enabled {
            let defaults = PrivateGptConfig::default();
            let post_processor = var("PRIVATEAI_POST_PROCESSOR")
                .or(file.private_ai.post_processor)
                .map(|id| id.parse::<PostProcessor>())
                .transpose()?
                .unwrap_or(defaults.post_processor);

            BackendConfig::SelfHosted(PrivateGptConfig {
                scheme: var("PRIVATEAI_SCHEME")
                    .or(file.private_ai.scheme)
                    .unwrap_or(defaults.scheme),
                host: var("PRIVATEAI_HOST")
                    .or(file.private_ai.host)
                    .unwrap_or(defaults.host),
                port: match var("PRIVATEAI_PORT") {
                    Some(value) => parse_number("PRIVATEAI_PORT", &value)?,
                    None => file.private_ai.port.unwrap_or(defaults.port),
                },
                timeout: match var("PRIVATEAI_TIMEOUT") {
                    Some(value) => Duration::from_secs(parse_number("PRIVATEAI_TIMEOUT", &value)?),
                    None => file
                        .private_ai
                        .timeout
                        .map(Duration::from_secs)
                        .unwrap_or(defaults.timeout),
                },
                post_processor,
            })
        } else {
            let api_key = var("OPENAI_API_KEY")
                .or(file.openai.api_key)
                .filter(|k| !k.trim().is_empty())
                .ok_or(ConfigError::MissingApiKey)?;

            let mut openai = OpenAiConfig::new(api_key);
            if let Some(model) = var("OPENAI_MODEL").or(file.openai.model) {
                openai.model = model;
            }
            if let Some(base_url) = var("OPENAI_BASE_URL").or(file.openai.base_url) {
                openai.base_url = base_url;
            }
            if let Some(secs) = file.openai.timeout {
                openai.timeout = Duration::from_secs(secs);
            }
            BackendConfig::Hosted(openai)
        };

        let prompt_defaults = PromptSettings::default();
        let prompt = PromptSettings {
            my_company_name: var("MY_COMPANY_NAME").or(file.company.name),
            incoming_invoice: var("PDF_INCOMING_INVOICE")
                .or(file.pdf.incoming_invoice)
                .unwrap_or(prompt_defaults.incoming_invoice),
            outgoing_invoice: var("PDF_OUTGOING_INVOICE")
                .or(file.pdf.outgoing_invoice)
                .unwrap_or(prompt_defaults.outgoing_invoice),
            output_language: var("OUTPUT_LANGUAGE")
                .or(file.output_language)
                .unwrap_or(prompt_defaults.output_language),
            prompt_extension: var("PROMPT_EXTENSION")
                .or(file.prompt_extension)
                .unwrap_or_default(),
        };

        let date_format = var("OUTPUT_DATE_FORMAT")
            .or(file.date_format)
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        if !is_valid_date_format(&date_format) {
            return Err(ConfigError::InvalidValue {
                key: "OUTPUT_DATE_FORMAT",
                value: date_format,
            });
        }

        let counter_style = match var("COUNTER_STYLE").or(file.counter_style) {
            Some(value) => value.parse::<CounterStyle>().map_err(|value| ConfigError::InvalidValue {
                key: "COUNTER_STYLE",
                value,
            })?,
            None => CounterStyle::default(),
        };

        let ocr_defaults = OcrSettings::default();
        let ocr = OcrSettings {
            program: file.ocr.program.unwrap_or(ocr_defaults.program),
            languages: var("OCR_LANGUAGES")
                .or(file.ocr_languages)
                .map(|langs| split_languages(&langs))
                .filter(|langs| !langs.is_empty())
                .unwrap_or(ocr_defaults.languages),
            timeout: file
                .ocr
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(ocr_defaults.timeout),
            page_timeout_secs: file.ocr.page_timeout.unwrap_or(ocr_defaults.page_timeout_secs),
            jobs: file.ocr.jobs.unwrap_or(ocr_defaults.jobs),
            max_image_mpixels: ocr_defaults.max_image_mpixels,
            oversample_dpi: ocr_defaults.oversample_dpi,
            work_dir: file.ocr.work_dir,
        };

        Ok(Self {
            backend,
            prompt,
            date_format,
            counter_style,
            ocr,
        })
    }
}

/// "deu,eng" / "deu+eng" を言語コードのリストに
fn split_languages(value: &str) -> Vec<String> {
    value
        .split([',', '+'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_number<N: std::str::FromStr>(key: &'static str, value: &str) -> Result<N, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
