//! 会社名の名寄せモジュール
//!
//! 抽出された会社名を同義語テーブルと Jaro-Winkler 類似度で照合し、正式名に揃える。

use std::path::Path;
use strsim::jaro_winkler;
use tracing::{info, warn};

/// 正式名を採用する類似度の下限（この値を超えた場合のみ採用）
pub const CONFIDENCE_THRESHOLD: f64 = 0.85;

/// 同義語テーブルの読み込みエラー
#[derive(Debug, thiserror::Error)]
pub enum SynonymError {
    #[error("同義語ファイルの読み込みに失敗: {0}")]
    Io(#[from] std::io::Error),
    #[error("同義語ファイルの解析に失敗: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("同義語ファイルの形式が不正: {0}")]
    Format(String),
}

/// 正式名とその同義語
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyEntry {
    pub canonical: String,
    pub synonyms: Vec<String>,
}

/// 正式名 → 同義語リストの対応表（ファイル記載順を保持）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymTable {
    entries: Vec<CompanyEntry>,
}

impl SynonymTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(canonical, synonyms)| CompanyEntry {
                    canonical: canonical.into(),
                    synonyms: synonyms.into_iter().map(Into::into).collect(),
                })
                .collect(),
        }
    }

    /// YAML（またはJSON）文字列から読み込む
    ///
    /// 値は文字列のリストまたは単一の文字列。
    pub fn parse(text: &str) -> Result<Self, SynonymError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        let mapping = match value {
            serde_yaml::Value::Null => return Ok(Self::default()),
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => return Err(SynonymError::Format("トップレベルがマッピングではありません".into())),
        };

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let canonical = scalar_to_string(&key)
                .ok_or_else(|| SynonymError::Format(format!("不正なキー: {:?}", key)))?;

            let synonyms = match value {
                serde_yaml::Value::Sequence(items) => {
                    items.iter().filter_map(scalar_to_string).collect()
                }
                serde_yaml::Value::Null => Vec::new(),
                other => scalar_to_string(&other).into_iter().collect(),
            };

            entries.push(CompanyEntry { canonical, synonyms });
        }

        Ok(Self { entries })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SynonymError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// 読み込めない場合は空のテーブル（名寄せなし）として扱う
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!("{} が見つかりません。会社名はそのまま使用します", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(table) => {
                info!("{} 件の会社名マッピングを読み込みました", table.len());
                table
            }
            Err(e) => {
                warn!("{}: {}。会社名はそのまま使用します", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CompanyEntry] {
        &self.entries
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 最も類似度の高い正式名とそのスコア
///
/// 同点の場合はテーブルで先に現れたものが残る。
pub fn best_match<'a>(company_name: &str, table: &'a SynonymTable) -> Option<(&'a str, f64)> {
    let needle = company_name.trim().to_lowercase();
    let mut best: Option<(&str, f64)> = None;

    for entry in table.entries() {
        let score = entry
            .synonyms
            .iter()
            .map(|synonym| jaro_winkler(&needle, &synonym.to_lowercase()))
            .fold(f64::NEG_INFINITY, f64::max);

        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((entry.canonical.as_str(), score));
        }
    }

    best.filter(|(_, score)| score.is_finite())
}

/// 会社名を正式名に揃える。十分に近いものがなければ入力（前後の空白除去済み）を返す
pub fn harmonize(company_name: &str, table: &SynonymTable) -> String {
    let company_name = company_name.trim();

    if table.is_empty() {
        return company_name.to_string();
    }

    match best_match(company_name, table) {
        Some((canonical, score)) if score > CONFIDENCE_THRESHOLD => {
            info!("会社名を名寄せ: {} -> {} ({:.3})", company_name, canonical, score);
            canonical.to_string()
        }
        _ => {
            info!("該当する正式名なし。元の会社名を使用: {}", company_name);
            company_name.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn acme_table() -> SynonymTable {
        SynonymTable::new([("Acme", vec!["Acme", "Acme Corp"])])
    }

    #[test]
    fn legal_suffix_is_harmonized() {
        let (_, score) = best_match("Acme GmbH", &acme_table()).unwrap();
        assert!(score > CONFIDENCE_THRESHOLD, "score {score}");
        assert_eq!(harmonize("Acme GmbH", &acme_table()), "Acme");
    }

    #[test]
    fn comparison_is_case_insensitive() {
        assert_eq!(harmonize("ACME CORP", &acme_table()), "Acme");
    }

    #[test]
    fn unrelated_name_passes_through_trimmed() {
        assert_eq!(harmonize("  Globex Industries ", &acme_table()), "Globex Industries");
    }

    #[test]
    fn empty_table_passes_through() {
        assert_eq!(harmonize(" Acme GmbH ", &SynonymTable::default()), "Acme GmbH");
    }

    #[test]
    fn best_canonical_name_wins() {
        let table = SynonymTable::new([
            ("Deutsche Bahn", vec!["DB", "Deutsche Bahn AG", "DB Fernverkehr"]),
            ("Deutsche Post", vec!["Deutsche Post AG", "DHL"]),
        ]);
        assert_eq!(harmonize("Deutsche Post", &table), "Deutsche Post");
        assert_eq!(harmonize("DB Fernverkehr AG", &table), "Deutsche Bahn");
    }

    #[test]
    fn ties_resolve_to_some_tied_canonical_name() {
        let table = SynonymTable::new([("First", vec!["Acme"]), ("Second", vec!["Acme"])]);
        let result = harmonize("Acme", &table);
        assert!(result == "First" || result == "Second", "{result}");
    }

    #[test]
    fn is_deterministic() {
        let table = acme_table();
        for name in ["Acme GmbH", "Globex", "", "acme"] {
            assert_eq!(harmonize(name, &table), harmonize(name, &table));
        }
    }

    #[test]
    fn parses_yaml_in_file_order() {
        let table = SynonymTable::parse(
            "Zeta:\n  - Zeta Ltd\nAlpha:\n  - Alpha AG\n  - Alpha\nSolo: Solo GmbH\nEmpty:\n",
        )
        .unwrap();
        let names: Vec<_> = table.entries().iter().map(|e| e.canonical.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha", "Solo", "Empty"]);
        assert_eq!(table.entries()[1].synonyms, ["Alpha AG", "Alpha"]);
        assert_eq!(table.entries()[2].synonyms, ["Solo GmbH"]);
        assert!(table.entries()[3].synonyms.is_empty());
    }

    #[test]
    fn parses_json_table() {
        let table = SynonymTable::parse(r#"{"Acme": ["Acme", "Acme Corp"]}"#).unwrap();
        assert_eq!(table, acme_table());
    }

    #[test]
    fn rejects_non_mapping() {
        assert!(matches!(
            SynonymTable::parse("- a\n- b\n"),
            Err(SynonymError::Format(_))
        ));
    }

    #[test]
    fn missing_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = SynonymTable::load_or_empty(dir.path().join("missing.yaml"));
        assert!(table.is_empty());
    }

    #[test]
    fn unreadable_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "Acme: [unterminated").unwrap();
        assert!(SynonymTable::load_or_empty(&path).is_empty());
    }
}
