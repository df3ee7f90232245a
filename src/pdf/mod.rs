//! PDF処理モジュール - OCRとテキストレイヤーからのテキスト抽出

use lopdf::Document;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// ocrmypdf の終了コード: 既にテキストレイヤーがある
const EXIT_PRIOR_OCR_FOUND: i32 = 6;

/// OCR実行の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrSettings {
    /// ocrmypdf 実行ファイル
    pub program: PathBuf,
    /// Tesseract の言語コード (deu, eng, ...)
    pub languages: Vec<String>,
    /// ocrmypdf 全体のタイムアウト
    pub timeout: Duration,
    /// ページ単位の Tesseract タイムアウト（秒）
    pub page_timeout_secs: u32,
    /// 並列ワーカー数の上限
    pub jobs: usize,
    /// 画像サイズの上限（メガピクセル）
    pub max_image_mpixels: u32,
    /// 低解像度画像を引き上げる際のDPI
    pub oversample_dpi: u32,
    /// OCR一時ファイルの作成先（`None` はシステムの一時ディレクトリ）
    pub work_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ocrmypdf"),
            languages: vec!["deu".to_string(), "eng".to_string()],
            timeout: Duration::from_secs(300),
            page_timeout_secs: 120,
            jobs: 2,
            max_image_mpixels: 250,
            oversample_dpi: 150,
            work_dir: None,
        }
    }
}

/// 抽出するページ範囲（1始まり、両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

impl Default for PageRange {
    fn default() -> Self {
        Self { first: 1, last: 3 }
    }
}

impl PageRange {
    pub fn new(first: u32, last: u32) -> Self {
        let first = first.max(1);
        Self {
            first,
            last: last.max(first),
        }
    }

    /// 文書のページ数に収まるページ番号の列
    pub fn clamp(&self, page_count: u32) -> RangeInclusive<u32> {
        self.first..=self.last.min(page_count)
    }
}

/// OCRの失敗理由
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("ocrmypdf の実行に失敗: {0}")]
    Io(#[from] std::io::Error),
    #[error("ocrmypdf が {0:?} 以内に終了しませんでした")]
    Timeout(Duration),
    #[error("既存のOCRテキストレイヤーが見つかりました")]
    PriorOcrFound,
    #[error("ocrmypdf が失敗 (終了コード {code:?}): {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("PDFの読み込みに失敗: {0}")]
    Pdf(#[from] lopdf::Error),
}

/// OCR → テキストレイヤー抽出、失敗時は元ファイルから直接抽出
pub struct TextExtractor {
    settings: OcrSettings,
    pages: PageRange,
}

impl TextExtractor {
    pub fn new(settings: OcrSettings, pages: PageRange) -> Self {
        Self { settings, pages }
    }

    pub fn pages(&self) -> PageRange {
        self.pages
    }

    /// PDFからテキストを抽出
    ///
    /// エラーは返さない。何も得られなければ空文字列を返す（AI呼び出しを省略する合図）。
    pub async fn extract(&self, pdf_path: &Path) -> String {
        let text = match self.ocr_text(pdf_path).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                info!("OCR結果が空のため直接抽出を試みます: {}", pdf_path.display());
                self.direct_text(pdf_path)
            }
            Err(e) => {
                warn!("OCRに失敗 ({}): {}", pdf_path.display(), e);
                info!("テキストレイヤーから直接抽出します");
                self.direct_text(pdf_path)
            }
        };

        info!(
            "抽出テキスト（先頭500文字）: {}...",
            text.chars().take(500).collect::<String>()
        );
        if text.is_empty() {
            warn!("テキストを抽出できませんでした: {}", pdf_path.display());
        }

        text
    }

    /// 一時ファイルにOCR済みPDFを作成し、そのテキストレイヤーを読む
    ///
    /// 一時ディレクトリは成功・失敗どちらの場合もドロップ時に削除される。
    async fn ocr_text(&self, pdf_path: &Path) -> Result<String, OcrError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("autorename-ocr-");
        let temp_dir = match &self.settings.work_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        };
        let output_path = temp_dir.path().join("ocr.pdf");

        let mut command = Command::new(&self.settings.program);
        command
            .args(ocr_args(&self.settings, self.pages))
            .arg(pdf_path)
            .arg(&output_path)
            .kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(0x08000000); // CREATE_NO_WINDOW

        let output = tokio::time::timeout(self.settings.timeout, command.output())
            .await
            .map_err(|_| OcrError::Timeout(self.settings.timeout))??;

        if !output.status.success() {
            if output.status.code() == Some(EXIT_PRIOR_OCR_FOUND) {
                return Err(OcrError::PriorOcrFound);
            }
            return Err(OcrError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let document = Document::load(&output_path)?;
        Ok(page_text(&document, self.pages))
    }

    /// 元ファイルのテキストレイヤーを読む（失敗時は空文字列）
    fn direct_text(&self, pdf_path: &Path) -> String {
        match Document::load(pdf_path) {
            Ok(document) => page_text(&document, self.pages),
            Err(e) => {
                warn!("PDFの読み込みに失敗 ({}): {}", pdf_path.display(), e);
                String::new()
            }
        }
    }
}

/// ocrmypdf のコマンドライン引数（入出力パス以外）
fn ocr_args(settings: &OcrSettings, pages: PageRange) -> Vec<String> {
    vec![
        "--force-ocr".to_string(),
        "--invalidate-digital-signatures".to_string(),
        "--pages".to_string(),
        format!("{}-{}", pages.first, pages.last),
        "-l".to_string(),
        settings.languages.join("+"),
        "--jobs".to_string(),
        settings.jobs.max(1).to_string(),
        "--tesseract-timeout".to_string(),
        settings.page_timeout_secs.to_string(),
        "--max-image-mpixels".to_string(),
        settings.max_image_mpixels.to_string(),
        "--oversample".to_string(),
        settings.oversample_dpi.to_string(),
        "--optimize".to_string(),
        "1".to_string(),
        "--output-type".to_string(),
        "pdf".to_string(),
        "--quiet".to_string(),
    ]
}

/// 指定範囲の各ページのテキストを `Page N:` 付きで連結
fn page_text(document: &Document, pages: PageRange) -> String {
    let page_count = document.get_pages().len() as u32;
    let mut all_text = String::new();

    for page_num in pages.clamp(page_count) {
        match document.extract_text(&[page_num]) {
            Ok(text) if !text.trim().is_empty() => {
                all_text.push_str(&format!("Page {}:\n{}\n\n", page_num, text.trim()));
            }
            Ok(_) => debug!("ページ {} にテキストがありません", page_num),
            Err(e) => debug!("ページ {} のテキスト抽出に失敗: {}", page_num, e),
        }
    }

    all_text.trim().to_string()
}
