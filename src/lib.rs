//! PDFオートリネーマー - OCRとLLMを使った請求書・書類の自動リネームツール
//!
//! # 機能
//! - PDFの先頭ページをOCR（ocrmypdf）、失敗時はテキストレイヤーから直接抽出
//! - OpenAI または PrivateGPT で会社名・文書日付・文書種別を抽出
//! - 同義語テーブルによる会社名の名寄せ（Jaro-Winkler）
//! - `YYYYMMDD 会社名 種別.pdf` 形式で、既存ファイルを上書きせずにリネーム

pub mod ai;
pub mod config;
pub mod harmonize;
pub mod parser;
pub mod pdf;
pub mod processor;
pub mod rename;

pub use ai::{CompletionBackend, CompletionClient};
pub use config::AppConfig;
pub use harmonize::SynonymTable;
pub use parser::{ExtractionResult, ParsedDocument};
pub use processor::{BatchSummary, DocumentOutcome, DocumentProcessor};
pub use rename::RenameDecision;
