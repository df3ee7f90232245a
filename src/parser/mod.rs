//! モデル応答の解析モジュール - 会社名・日付・文書種別の抽出と検証

mod date;
mod filename;
mod json;

pub use date::{parse_date, parse_document_date};
pub use filename::{collapse_whitespace, is_valid_filename};
pub use json::{extract_json, find_json_object};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 値が見つからなかった場合の会社名・文書種別
pub const UNKNOWN_VALUE: &str = "Unknown";
/// 値が見つからなかった場合の日付
pub const DEFAULT_DATE: &str = "00000000";

/// モデルから抽出された生の値（すべて文字列）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub company_name: String,
    pub document_date: String,
    pub document_type: String,
}

impl Default for ExtractionResult {
    fn default() -> Self {
        Self {
            company_name: UNKNOWN_VALUE.to_string(),
            document_date: DEFAULT_DATE.to_string(),
            document_type: UNKNOWN_VALUE.to_string(),
        }
    }
}

impl ExtractionResult {
    /// すべてセンチネル値の結果
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// 日付を解析済みの文書情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub company_name: String,
    /// 解析できなかった場合はセンチネルの解析結果（`None`）
    pub document_date: Option<NaiveDate>,
    pub document_type: String,
}

impl From<&ExtractionResult> for ParsedDocument {
    fn from(result: &ExtractionResult) -> Self {
        Self {
            company_name: result.company_name.clone(),
            document_date: parse_document_date(&result.document_date),
            document_type: result.document_type.clone(),
        }
    }
}

/// セルフホスト型バックエンドの応答後処理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessor {
    /// ローカルモデル汎用（前後の文章からJSONオブジェクトを切り出す）
    Ollama,
}

/// 未定義の後処理識別子
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("未定義のPRIVATEAI_POST_PROCESSOR: {0:?}")]
pub struct UnknownPostProcessor(pub String);

impl FromStr for PostProcessor {
    type Err = UnknownPostProcessor;

    /// カンマ区切りの場合は先頭の要素を使う
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let first = s.split(',').next().unwrap_or_default().trim();
        match first.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            _ => Err(UnknownPostProcessor(first.to_string())),
        }
    }
}

impl fmt::Display for PostProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

/// バックエンドが返す応答の形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// JSONオブジェクトのみを返す（構造化出力モード対応）
    JsonObject,
    /// 任意の文章を返すので後処理でJSONを切り出す
    RawText(PostProcessor),
}

/// モデルの生の応答を検証済みの `ExtractionResult` に変換
///
/// 失敗はすべてセンチネル値に置き換え、エラーは返さない。
pub fn normalize(raw: &str, format: ResponseFormat) -> ExtractionResult {
    let payload = match format {
        ResponseFormat::JsonObject => raw.trim(),
        ResponseFormat::RawText(PostProcessor::Ollama) => extract_json(raw),
    };

    let object = match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            tracing::error!("JSONオブジェクトではない応答: {}", other);
            return ExtractionResult::unknown();
        }
        Err(e) => {
            tracing::error!("応答のJSON解析に失敗: {}", e);
            return ExtractionResult::unknown();
        }
    };

    let result = ExtractionResult {
        company_name: validated_field(&object, "company_name", UNKNOWN_VALUE),
        document_date: validated_field(&object, "document_date", DEFAULT_DATE),
        document_type: validated_field(&object, "document_type", UNKNOWN_VALUE),
    };
    tracing::info!("抽出結果: {:?}", result);
    result
}

/// キーを取り出し、ファイル名として使えない値はデフォルトに置き換える
fn validated_field(object: &Map<String, Value>, key: &str, default: &str) -> String {
    let value = lookup(object, key).and_then(value_as_text);

    match value {
        Some(text) => {
            let text = collapse_whitespace(&text);
            if is_valid_filename(&text) {
                text
            } else {
                tracing::warn!("{} がファイル名に使えないため {} に置換: {:?}", key, default, text);
                default.to_string()
            }
        }
        None => default.to_string(),
    }
}

/// 完全一致、次に大文字小文字を無視してキーを探す
fn lookup<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
