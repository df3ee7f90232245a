//! 日付解析モジュール
//!
//! 曖昧な数字の並びは日・月・年の順（欧州式）として解釈する。

use super::DEFAULT_DATE;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// 区切り文字付きの数字形式 (03.04.2024, 3/4/24, 2024-04-03 など)
static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,4})\s*[./\-\s]\s*(\d{1,2})\s*[./\-\s]\s*(\d{1,4})$").expect("valid regex")
});

/// 区切りなし8桁 (03042024, 20240403)
static COMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})(\d{2})(\d{4})$").expect("valid regex"));

/// 日 月名 年 (3. April 2024, 03 Apr 2024, 3 März 24)
static DAY_MONTH_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})\.?\s*([a-zäöüé]{3,10})\.?,?\s*(\d{2,4})$").expect("valid regex")
});

/// 月名 日 年 (April 3, 2024 / Apr 3rd 2024)
static MONTH_NAME_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-zäöüé]{3,10})\.?\s*(\d{1,2})(?:st|nd|rd|th)?\.?,?\s*(\d{4})$")
        .expect("valid regex")
});

/// 日付が見つからなかったことを表すモデルの定型回答
const PLACEHOLDERS: &[&str] = &["unknown", "unbekannt", "n/a", "none", "null", "00.00.0000"];

/// 文書日付を解析する
///
/// 解析できない場合はセンチネル値 `00000000` を同じ規則で解析し直した結果を返す。
/// センチネルは有効な暦日ではないため、その場合の結果は常に `None`（日付なし）になる。
pub fn parse_document_date(date_str: &str) -> Option<NaiveDate> {
    match parse_date(date_str) {
        Some(date) => Some(date),
        None => {
            tracing::debug!("日付を解析できません: {:?}", date_str);
            parse_date(DEFAULT_DATE)
        }
    }
}

/// 日付文字列を解析（DMY優先）
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let text = date_str.trim();
    if text.is_empty() || PLACEHOLDERS.iter().any(|p| text.eq_ignore_ascii_case(p)) {
        return None;
    }

    if let Some(caps) = NUMERIC_RE.captures(text) {
        let first = &caps[1];
        let second: u32 = caps[2].parse().ok()?;
        let third = &caps[3];

        // 先頭が4桁なら年-月-日
        if first.len() == 4 {
            let year: i32 = first.parse().ok()?;
            let day: u32 = third.parse().ok()?;
            return NaiveDate::from_ymd_opt(year, second, day);
        }

        let first: u32 = first.parse().ok()?;
        let year = expand_year(third)?;

        // 日.月.年 を優先し、成立しなければ 月.日.年 を試す
        return NaiveDate::from_ymd_opt(year, second, first)
            .or_else(|| NaiveDate::from_ymd_opt(year, first, second));
    }

    if let Some(caps) = COMPACT_RE.captures(text) {
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;

        if let Some(date) = NaiveDate::from_ymd_opt(year, b, a) {
            return Some(date);
        }

        // 20240403 のような年-月-日
        let year: i32 = text[..4].parse().ok()?;
        let month: u32 = text[4..6].parse().ok()?;
        let day: u32 = text[6..].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = DAY_MONTH_NAME_RE.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_from_name(&caps[2])?;
        let year = expand_year(&caps[3])?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = MONTH_NAME_DAY_RE.captures(text) {
        let month = month_from_name(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// 2桁の年を4桁に展開（69以下は2000年代）
fn expand_year(year: &str) -> Option<i32> {
    let value: i32 = year.parse().ok()?;
    match year.len() {
        2 if value <= 69 => Some(2000 + value),
        2 => Some(1900 + value),
        4 => Some(value),
        _ => None,
    }
}

/// 英語・ドイツ語の月名（略称含む）を月番号に変換
fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "jan" | "january" | "januar" | "jän" | "jänner" => 1,
        "feb" | "february" | "februar" => 2,
        "mar" | "march" | "mär" | "märz" | "maerz" => 3,
        "apr" | "april" => 4,
        "may" | "mai" => 5,
        "jun" | "june" | "juni" => 6,
        "jul" | "july" | "juli" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" | "okt" | "oktober" => 10,
        "nov" | "november" => 11,
        "dec" | "december" | "dez" | "dezember" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn ambiguous_dates_are_day_first() {
        assert_eq!(parse_date("03.04.2024"), ymd(2024, 4, 3));
        assert_eq!(parse_date("03/04/2024"), ymd(2024, 4, 3));
        assert_eq!(parse_date("3-4-2024"), ymd(2024, 4, 3));
    }

    #[test]
    fn falls_back_to_month_first_when_day_first_is_impossible() {
        assert_eq!(parse_date("12/31/2024"), ymd(2024, 12, 31));
    }

    #[test]
    fn iso_dates() {
        assert_eq!(parse_date("2024-04-03"), ymd(2024, 4, 3));
        assert_eq!(parse_date("2024.4.3"), ymd(2024, 4, 3));
    }

    #[test]
    fn two_digit_year() {
        assert_eq!(parse_date("15.01.24"), ymd(2024, 1, 15));
        assert_eq!(parse_date("15.01.99"), ymd(1999, 1, 15));
    }

    #[test]
    fn compact_dates() {
        assert_eq!(parse_date("03042024"), ymd(2024, 4, 3));
        assert_eq!(parse_date("20240403"), ymd(2024, 4, 3));
    }

    #[test]
    fn month_names() {
        assert_eq!(parse_date("3. April 2024"), ymd(2024, 4, 3));
        assert_eq!(parse_date("03 Apr 2024"), ymd(2024, 4, 3));
        assert_eq!(parse_date("1. März 2023"), ymd(2023, 3, 1));
        assert_eq!(parse_date("April 3, 2024"), ymd(2024, 4, 3));
        assert_eq!(parse_date("Dec 24th 2022"), ymd(2022, 12, 24));
    }

    #[test]
    fn rejects_invalid_calendar_dates() {
        assert_eq!(parse_date("31.02.2024"), None);
        assert_eq!(parse_date("00.00.0000"), None);
        assert_eq!(parse_date("Unbekannt"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn sentinel_fallback_is_deterministic() {
        let sentinel = parse_document_date(DEFAULT_DATE);
        assert_eq!(sentinel, parse_document_date(DEFAULT_DATE));
        assert_eq!(parse_document_date("not a date"), sentinel);
        assert_eq!(parse_document_date("45.13.2024"), sentinel);
    }

    #[test]
    fn valid_date_wins_over_fallback() {
        assert_eq!(parse_document_date("01.01.2020"), ymd(2020, 1, 1));
    }
}
