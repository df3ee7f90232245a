//! 抽出 → AI → 名寄せ → リネームの一連の流れ

use async_trait::async_trait;
use autorename_pdf::ai::{CompletionClient, CompletionError};
use autorename_pdf::harmonize::SynonymTable;
use autorename_pdf::parser::{PostProcessor, ResponseFormat};
use autorename_pdf::processor::{BatchSummary, DocumentOutcome, DocumentProcessor, TextSource};
use autorename_pdf::rename::{CounterStyle, NoopHook, RenameOptions};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// ファイル名に関係なく同じテキストを返す
struct FixedText(&'static str);

#[async_trait]
impl TextSource for FixedText {
    async fn extract_text(&self, _pdf_path: &Path) -> String {
        self.0.to_string()
    }
}

/// 呼び出し回数を数えつつ決まった応答を返す
struct CountingClient {
    reply: &'static str,
    format: ResponseFormat,
    calls: AtomicUsize,
}

impl CountingClient {
    fn new(reply: &'static str) -> Self {
        Self {
            reply,
            format: ResponseFormat::JsonObject,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for CountingClient {
    async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.to_string())
    }

    fn response_format(&self) -> ResponseFormat {
        self.format
    }
}

const ACME_REPLY: &str =
    r#"{"company_name":"Acme GmbH","document_date":"15.03.2024","document_type":"ER"}"#;

fn synonyms() -> SynonymTable {
    SynonymTable::new([("Acme", vec!["Acme", "Acme GmbH", "ACME Corp"])])
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"%PDF-1.5").unwrap();
    path
}

fn processor<'a>(
    client: &'a CountingClient,
    text: &'a FixedText,
    table: &'a SynonymTable,
    options: RenameOptions,
) -> DocumentProcessor<'a, CountingClient, FixedText> {
    DocumentProcessor::new(client, text, table, "prompt".to_string(), options, Box::new(NoopHook))
}

#[tokio::test]
async fn renames_with_harmonized_company() {
    let dir = tempfile::tempdir().unwrap();
    let source = touch(dir.path(), "scan0001.pdf");
    let client = CountingClient::new(ACME_REPLY);
    let text = FixedText("Page 1:\nRechnung Acme GmbH");
    let table = synonyms();

    let outcome = processor(&client, &text, &table, RenameOptions::default())
        .process_document(&source)
        .await
        .unwrap();

    let expected = dir.path().join("20240315 Acme ER.pdf");
    assert_eq!(outcome, DocumentOutcome::Renamed(expected.clone()));
    assert!(expected.exists());
    assert!(!source.exists());
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn empty_text_skips_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let source = touch(dir.path(), "blank.pdf");
    let client = CountingClient::new(ACME_REPLY);
    let text = FixedText("  \n ");
    let table = synonyms();

    let outcome = processor(&client, &text, &table, RenameOptions::default())
        .process_document(&source)
        .await
        .unwrap();

    assert_eq!(outcome, DocumentOutcome::Skipped);
    assert_eq!(client.calls(), 0);
    assert!(source.exists());
}

#[tokio::test]
async fn existing_target_gets_counter() {
    let dir = tempfile::tempdir().unwrap();
    let taken = touch(dir.path(), "20240315 Acme ER.pdf");
    let source = touch(dir.path(), "scan0002.pdf");
    let client = CountingClient::new(ACME_REPLY);
    let text = FixedText("Rechnung");
    let table = synonyms();

    let outcome = processor(&client, &text, &table, RenameOptions::default())
        .process_document(&source)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DocumentOutcome::Renamed(dir.path().join("20240315 Acme ER_(1).pdf"))
    );
    assert!(taken.exists());
}

#[tokio::test]
async fn space_counter_style_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "20240315 Acme ER.pdf");
    let source = touch(dir.path(), "scan0003.pdf");
    let client = CountingClient::new(ACME_REPLY);
    let text = FixedText("Rechnung");
    let table = synonyms();
    let options = RenameOptions {
        counter_style: CounterStyle::Space,
        ..RenameOptions::default()
    };

    let outcome = processor(&client, &text, &table, options)
        .process_document(&source)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DocumentOutcome::Renamed(dir.path().join("20240315 Acme ER (1).pdf"))
    );
}

#[tokio::test]
async fn correctly_named_file_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let source = touch(dir.path(), "20240315 Acme ER.pdf");
    let client = CountingClient::new(ACME_REPLY);
    let text = FixedText("Rechnung");
    let table = synonyms();

    let outcome = processor(&client, &text, &table, RenameOptions::default())
        .process_document(&source)
        .await
        .unwrap();

    assert_eq!(outcome, DocumentOutcome::AlreadyNamed);
    assert!(source.exists());
    assert!(!dir.path().join("20240315 Acme ER_(1).pdf").exists());
}

#[tokio::test]
async fn unknown_date_is_left_out_of_the_name() {
    let dir = tempfile::tempdir().unwrap();
    let source = touch(dir.path(), "scan.pdf");
    let mut client = CountingClient::new(
        "Sure! {\"company_name\":\"Beta AG\",\"document_date\":\"bald\",\"document_type\":\"AR\"}",
    );
    client.format = ResponseFormat::RawText(PostProcessor::Ollama);
    let text = FixedText("Rechnung");
    let table = SynonymTable::default();

    let outcome = processor(&client, &text, &table, RenameOptions::default())
        .process_document(&source)
        .await
        .unwrap();

    assert_eq!(outcome, DocumentOutcome::Renamed(dir.path().join("Beta AG AR.pdf")));
}

#[tokio::test]
async fn dry_run_leaves_files_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let source = touch(dir.path(), "scan.pdf");
    let client = CountingClient::new(ACME_REPLY);
    let text = FixedText("Rechnung");
    let table = synonyms();
    let options = RenameOptions {
        dry_run: true,
        ..RenameOptions::default()
    };

    let outcome = processor(&client, &text, &table, options)
        .process_document(&source)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DocumentOutcome::Planned(dir.path().join("20240315 Acme ER.pdf"))
    );
    assert!(source.exists());
}

#[tokio::test]
async fn folder_batch_is_summarized() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a.pdf");
    touch(dir.path(), "b.pdf");
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
    let client = CountingClient::new(ACME_REPLY);
    let text = FixedText("Rechnung");
    let table = synonyms();

    let summary = processor(&client, &text, &table, RenameOptions::default())
        .process_paths(&[dir.path().to_path_buf()])
        .await;

    assert_eq!(
        summary,
        BatchSummary {
            renamed: 2,
            unchanged: 0,
            skipped: 0,
            failed: 0
        }
    );
    assert!(dir.path().join("20240315 Acme ER.pdf").exists());
    assert!(dir.path().join("20240315 Acme ER_(1).pdf").exists());
    assert!(dir.path().join("notes.txt").exists());
    assert_eq!(client.calls(), 2);
}
