//! PDFオートリネーマー - メインエントリポイント

use anyhow::{Context, Result};
use autorename_pdf::ai::{build_prompt, CompletionBackend};
use autorename_pdf::config::AppConfig;
use autorename_pdf::harmonize::SynonymTable;
use autorename_pdf::pdf::{PageRange, TextExtractor};
use autorename_pdf::processor::DocumentProcessor;
use autorename_pdf::rename::{platform_hook, RenameOptions};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "config.yaml";
const SYNONYMS_FILE: &str = "harmonized-company-names.yaml";

/// PDFの内容から会社名・日付・文書種別を読み取り、ファイル名を付け直す
#[derive(Parser)]
#[command(name = "autorename-pdf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PDFファイルまたはPDFを含むフォルダ
    paths: Vec<PathBuf>,

    /// 設定ファイル（既定: 実行ファイルと同じフォルダの config.yaml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 会社名の同義語テーブル（YAML）
    #[arg(short, long)]
    synonyms: Option<PathBuf>,

    /// 読み取る最初のページ
    #[arg(long, default_value_t = 1)]
    first_page: u32,

    /// 読み取る最後のページ
    #[arg(long, default_value_t = 3)]
    last_page: u32,

    /// リネームせずに結果だけ表示
    #[arg(long)]
    dry_run: bool,

    /// 詳細ログ
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ロギング初期化
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if cli.paths.is_empty() {
        anyhow::bail!("使い方: autorename-pdf <PDFファイルまたはフォルダ> [...]");
    }

    let base_dir = executable_dir();

    // 環境変数の読み込み（実行ファイルの隣、次にカレントディレクトリの .env）
    dotenvy::from_path(base_dir.join(".env")).ok();
    dotenvy::dotenv().ok();

    let config = AppConfig::load(cli.config.as_deref(), &base_dir.join(CONFIG_FILE))
        .context("設定の読み込みに失敗")?;

    let synonyms_path = cli
        .synonyms
        .clone()
        .unwrap_or_else(|| base_dir.join(SYNONYMS_FILE));
    let synonyms = SynonymTable::load_or_empty(&synonyms_path);

    let backend = CompletionBackend::connect(config.backend.clone())
        .await
        .context("AIクライアントの初期化に失敗")?;

    let extractor = TextExtractor::new(config.ocr.clone(), PageRange::new(cli.first_page, cli.last_page));
    let pages = extractor.pages();
    info!("読み取りページ: {}-{}", pages.first, pages.last);

    let rename_options = RenameOptions {
        date_format: config.date_format.clone(),
        counter_style: config.counter_style,
        dry_run: cli.dry_run,
    };

    let processor = DocumentProcessor::new(
        &backend,
        &extractor,
        &synonyms,
        build_prompt(&config.prompt),
        rename_options,
        platform_hook(),
    );

    processor.process_paths(&cli.paths).await;
    Ok(())
}

/// 実行ファイルのあるフォルダ（取得できなければカレントディレクトリ）
fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
