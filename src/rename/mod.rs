//! リネームモジュール - ファイル名の生成と衝突しない保存先の決定

use crate::parser::{is_valid_filename, ParsedDocument};
use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// 既定の日付書式
pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";

const PDF_EXTENSION: &str = "pdf";

/// 同名ファイルがある場合の連番の付け方
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CounterStyle {
    /// `name_(1).pdf`
    #[default]
    Underscore,
    /// `name (1).pdf`
    Space,
}

impl CounterStyle {
    fn apply(self, base_name: &str, counter: u32) -> String {
        match self {
            Self::Underscore => format!("{}_({})", base_name, counter),
            Self::Space => format!("{} ({})", base_name, counter),
        }
    }
}

impl FromStr for CounterStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "underscore" | "_(n)" => Ok(Self::Underscore),
            "space" | " (n)" | "(n)" => Ok(Self::Space),
            other => Err(other.to_string()),
        }
    }
}

/// リネームの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOptions {
    /// strftime 形式の日付書式
    pub date_format: String,
    pub counter_style: CounterStyle,
    /// 実際には移動せず、決定内容だけをログに出す
    pub dry_run: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            counter_style: CounterStyle::default(),
            dry_run: false,
        }
    }
}

/// リネーム時のエラー
#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    #[error("{source_path} のあるフォルダを特定できません")]
    NoParent { source_path: PathBuf },
    #[error("{} -> {} のリネームに失敗: {source}", from.display(), to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// 移動元と、選択時点で存在しないことを確認した移動先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameDecision {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl RenameDecision {
    /// 既に正しい名前になっている
    pub fn is_noop(&self) -> bool {
        self.source == self.target
    }
}

/// リネームの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(PathBuf),
    AlreadyNamed,
    /// ドライラン（移動先のみ決定）
    Planned(PathBuf),
}

/// strftime 書式として解釈でき、日付だけで書式化した結果がファイル名に使えるか
///
/// `/` や `:` を含む書式、時刻の指定子を含む書式は不可。
pub fn is_valid_date_format(format: &str) -> bool {
    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return false;
    }

    let Some(sample) = NaiveDate::from_ymd_opt(2024, 12, 31) else {
        return false;
    };
    let mut rendered = String::new();
    write!(rendered, "{}", sample.format(format)).is_ok() && is_valid_filename(&rendered)
}

/// 日付を書式化。書式が不正な場合は既定の書式を使う
pub fn format_date(date: NaiveDate, format: &str) -> String {
    let mut out = String::new();
    if is_valid_date_format(format) && write!(out, "{}", date.format(format)).is_ok() {
        return out;
    }

    warn!("日付書式 {:?} が不正なため {} を使用します", format, DEFAULT_DATE_FORMAT);
    date.format(DEFAULT_DATE_FORMAT).to_string()
}

/// 拡張子なしのファイル名
/// フォーマット: `{日付} {会社名} {文書種別}`（日付がなければ `{会社名} {文書種別}`）
pub fn build_base_name(document: &ParsedDocument, date_format: &str) -> String {
    match document.document_date {
        Some(date) => format!(
            "{} {} {}",
            format_date(date, date_format),
            document.company_name,
            document.document_type
        ),
        None => format!("{} {}", document.company_name, document.document_type),
    }
}

/// 同じフォルダ内で衝突しない移動先を決める
///
/// 元ファイル自身が候補名と一致した場合はその名前で確定する（何もしない）。
/// 他のファイルが候補名を使っていれば連番を増やす。
pub fn plan_rename(
    source: &Path,
    base_name: &str,
    style: CounterStyle,
) -> Result<RenameDecision, RenameError> {
    let directory = source
        .parent()
        .ok_or_else(|| RenameError::NoParent {
            source_path: source.to_path_buf(),
        })?;

    let mut name = format!("{}.{}", base_name, PDF_EXTENSION);
    let mut counter = 0;

    loop {
        let candidate = directory.join(&name);

        if is_same_file(source, &candidate) {
            return Ok(RenameDecision {
                source: source.to_path_buf(),
                target: source.to_path_buf(),
            });
        }

        if !candidate.exists() {
            return Ok(RenameDecision {
                source: source.to_path_buf(),
                target: candidate,
            });
        }

        counter += 1;
        name = format!("{}.{}", style.apply(base_name, counter), PDF_EXTENSION);
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }

    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// リネーム直前に呼ばれるフック
pub trait PreRenameHook: Send + Sync {
    /// 失敗してもリネームは続行される
    fn before_rename(&self, path: &Path) -> std::io::Result<()>;
}

/// 何もしないフック
pub struct NoopHook;

impl PreRenameHook for NoopHook {
    fn before_rename(&self, _path: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

/// Windows: 他プロセスのハンドルが閉じられるのを短時間待つ
#[cfg(windows)]
pub struct ReleaseHandlesHook {
    pub attempts: u32,
    pub wait: std::time::Duration,
}

#[cfg(windows)]
impl PreRenameHook for ReleaseHandlesHook {
    fn before_rename(&self, path: &Path) -> std::io::Result<()> {
        use std::os::windows::fs::OpenOptionsExt;

        let mut last_error = None;
        for _ in 0..self.attempts.max(1) {
            // 共有なしで開ければ、他に開いているハンドルはない
            match std::fs::OpenOptions::new().read(true).share_mode(0).open(path) {
                Ok(_) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
            std::thread::sleep(self.wait);
        }

        Err(last_error.unwrap_or_else(|| std::io::Error::other("file is in use")))
    }
}

/// 実行中のプラットフォーム向けのフック
pub fn platform_hook() -> Box<dyn PreRenameHook> {
    #[cfg(windows)]
    {
        Box::new(ReleaseHandlesHook {
            attempts: 5,
            wait: std::time::Duration::from_millis(200),
        })
    }
    #[cfg(not(windows))]
    {
        Box::new(NoopHook)
    }
}

/// 抽出結果に基づいてファイルをリネーム
pub fn rename_document(
    source: &Path,
    document: &ParsedDocument,
    options: &RenameOptions,
    hook: &dyn PreRenameHook,
) -> Result<RenameOutcome, RenameError> {
    let base_name = build_base_name(document, &options.date_format);
    let decision = plan_rename(source, &base_name, options.counter_style)?;
    apply(&decision, options.dry_run, hook)
}

/// 決定内容に従ってファイルを移動
pub fn apply(
    decision: &RenameDecision,
    dry_run: bool,
    hook: &dyn PreRenameHook,
) -> Result<RenameOutcome, RenameError> {
    let new_name = decision
        .target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if decision.is_noop() {
        info!("\"{}\" は既に正しい名前です", new_name);
        return Ok(RenameOutcome::AlreadyNamed);
    }

    if dry_run {
        info!("[dry-run] {} -> {}", decision.source.display(), new_name);
        return Ok(RenameOutcome::Planned(decision.target.clone()));
    }

    if let Err(e) = hook.before_rename(&decision.source) {
        warn!("ファイルハンドルを解放できませんでした ({}): {}", decision.source.display(), e);
    }

    std::fs::rename(&decision.source, &decision.target).map_err(|source| RenameError::Io {
        from: decision.source.clone(),
        to: decision.target.clone(),
        source,
    })?;

    info!("リネームしました: {}", new_name);
    Ok(RenameOutcome::Renamed(decision.target.clone()))
}
