//! ファイル名として使えるかどうかの検証

/// ファイル名に使用できない文字
const FORBIDDEN_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// ファイル名の最大長（文字数）
const MAX_FILENAME_LEN: usize = 255;

/// ファイル名の一部としてそのまま使えるかを判定
///
/// 禁止文字を含むもの、空または空白のみのもの、255文字を超えるものは不可。
pub fn is_valid_filename(s: &str) -> bool {
    if s.contains(FORBIDDEN_CHARS) {
        return false;
    }

    if s.trim().is_empty() {
        return false;
    }

    s.chars().count() <= MAX_FILENAME_LEN
}

/// 改行やタブを含む連続した空白を1つのスペースにまとめる
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
