//! 文書処理パイプライン - 抽出 → AI → 正規化 → 名寄せ → リネーム

use crate::ai::{extract_fields, CompletionClient};
use crate::harmonize::{harmonize, SynonymTable};
use crate::parser::ParsedDocument;
use crate::pdf::TextExtractor;
use crate::rename::{rename_document, PreRenameHook, RenameOptions, RenameOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const PDF_EXTENSION: &str = "pdf";

/// 文書のテキストを返すもの
#[async_trait]
pub trait TextSource: Send + Sync {
    /// 空文字列は「抽出できる内容がない」
    async fn extract_text(&self, pdf_path: &Path) -> String;
}

#[async_trait]
impl TextSource for TextExtractor {
    async fn extract_text(&self, pdf_path: &Path) -> String {
        self.extract(pdf_path).await
    }
}

/// 1文書の処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Renamed(PathBuf),
    AlreadyNamed,
    Planned(PathBuf),
    /// テキストが取れずAI呼び出しを省略した
    Skipped,
}

impl From<RenameOutcome> for DocumentOutcome {
    fn from(outcome: RenameOutcome) -> Self {
        match outcome {
            RenameOutcome::Renamed(path) => Self::Renamed(path),
            RenameOutcome::AlreadyNamed => Self::AlreadyNamed,
            RenameOutcome::Planned(path) => Self::Planned(path),
        }
    }
}

/// バッチ全体の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub renamed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, result: &Result<DocumentOutcome>) {
        match result {
            Ok(DocumentOutcome::Renamed(_)) | Ok(DocumentOutcome::Planned(_)) => self.renamed += 1,
            Ok(DocumentOutcome::AlreadyNamed) => self.unchanged += 1,
            Ok(DocumentOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// 文書を1件ずつ順番に処理する
///
/// 同義語テーブルと設定は実行中に変更されない。
pub struct DocumentProcessor<'a, C: ?Sized, T: ?Sized> {
    client: &'a C,
    text_source: &'a T,
    synonyms: &'a SynonymTable,
    system_prompt: String,
    rename_options: RenameOptions,
    hook: Box<dyn PreRenameHook>,
}

impl<'a, C, T> DocumentProcessor<'a, C, T>
where
    C: CompletionClient + ?Sized,
    T: TextSource + ?Sized,
{
    pub fn new(
        client: &'a C,
        text_source: &'a T,
        synonyms: &'a SynonymTable,
        system_prompt: String,
        rename_options: RenameOptions,
        hook: Box<dyn PreRenameHook>,
    ) -> Self {
        Self {
            client,
            text_source,
            synonyms,
            system_prompt,
            rename_options,
            hook,
        }
    }

    /// 単一のPDFファイルを処理
    pub async fn process_document(&self, pdf_path: &Path) -> Result<DocumentOutcome> {
        info!("処理中: {}", pdf_path.display());

        let text = self.text_source.extract_text(pdf_path).await;
        if text.trim().is_empty() {
            warn!("テキストがないためスキップ: {}", pdf_path.display());
            return Ok(DocumentOutcome::Skipped);
        }

        let extraction = extract_fields(self.client, &self.system_prompt, &text).await;

        let mut document = ParsedDocument::from(&extraction);
        document.company_name = harmonize(&document.company_name, self.synonyms);

        let outcome = rename_document(pdf_path, &document, &self.rename_options, self.hook.as_ref())
            .with_context(|| format!("{} をリネームできませんでした", pdf_path.display()))?;

        Ok(outcome.into())
    }

    /// 入力パス（ファイル・フォルダ）をまとめて処理
    ///
    /// 1件の失敗はログに残して次へ進む。
    pub async fn process_paths(&self, inputs: &[PathBuf]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for pdf_path in collect_pdf_files(inputs) {
            let result = self.process_document(&pdf_path).await;
            if let Err(e) = &result {
                error!("{} の処理中にエラー: {:#}", pdf_path.display(), e);
            }
            summary.record(&result);
        }

        info!(
            "完了: リネーム {} 件, 変更なし {} 件, スキップ {} 件, 失敗 {} 件",
            summary.renamed, summary.unchanged, summary.skipped, summary.failed
        );
        summary
    }
}

/// 拡張子が .pdf（大文字小文字を区別しない）か
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(PDF_EXTENSION))
}

/// 入力からPDFファイルを列挙（フォルダは直下のみ、名前順）
pub fn collect_pdf_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            if is_pdf(input) {
                files.push(input.clone());
            } else {
                warn!("{} はPDFではありません", input.display());
            }
        } else if input.is_dir() {
            match list_pdf_files(input) {
                Ok(found) => files.extend(found),
                Err(e) => error!("{:#}", e),
            }
        } else {
            error!("{} はファイルでもフォルダでもありません", input.display());
        }
    }

    files
}

fn list_pdf_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(directory)
        .with_context(|| format!("フォルダを読み込めません: {}", directory.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_pdf(path))
        .collect();
    files.sort();
    Ok(files)
}
