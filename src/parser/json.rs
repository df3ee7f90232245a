//! モデル出力からJSONオブジェクトを切り出す

use regex::Regex;
use std::sync::LazyLock;

/// ネストを考慮しない簡易パターン（スキャナが何も見つけられなかった場合のみ使用）
static FLAT_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("valid regex"));

/// テキスト中で最初に閉じている `{...}` を返す
///
/// 括弧の深さを数えながら走査し、深さが0に戻った位置で切り出す。
/// 文字列リテラル内の括弧は数えない。開始位置の `{` が閉じない場合は次の `{` から再試行する。
pub fn find_json_object(text: &str) -> Option<&str> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = scan_balanced(&text[start..]) {
            return Some(&text[start..start + end]);
        }
        search_from = start + 1;
    }

    None
}

/// `{` で始まる文字列を走査し、対応する `}` の直後のバイト位置を返す
fn scan_balanced(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// 生テキストからJSON部分を抽出する
///
/// 見つからなければ元のテキストをそのまま返し、後段のパースに失敗を任せる。
pub fn extract_json(text: &str) -> &str {
    if let Some(object) = find_json_object(text) {
        return object;
    }

    if let Some(m) = FLAT_OBJECT_RE.find(text) {
        return m.as_str();
    }

    tracing::warn!(
        "モデル出力にJSONが見つかりません: {}...",
        text.chars().take(200).collect::<String>()
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn isolates_object_between_noise() {
        let raw = r#"prefix {"company_name":"X","document_date":"01.01.2020","document_type":"ER"} suffix"#;
        let object = extract_json(raw);
        assert_eq!(
            object,
            r#"{"company_name":"X","document_date":"01.01.2020","document_type":"ER"}"#
        );
        let value: serde_json::Value = serde_json::from_str(object).unwrap();
        assert_eq!(value["company_name"], "X");
    }

    #[test]
    fn keeps_nested_objects_whole() {
        let raw = r#"Sure! {"a": {"b": {"c": 1}}, "d": 2} Hope this helps."#;
        assert_eq!(find_json_object(raw), Some(r#"{"a": {"b": {"c": 1}}, "d": 2}"#));
    }

    #[test]
    fn picks_first_complete_object() {
        let raw = r#"{"first": 1} and {"second": 2}"#;
        assert_eq!(find_json_object(raw), Some(r#"{"first": 1}"#));
    }

    #[test]
    fn skips_unterminated_prefix() {
        let raw = r#"{ broken {"company_name": "Acme"}"#;
        assert_eq!(find_json_object(raw), Some(r#"{"company_name": "Acme"}"#));
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let raw = r#"{"company_name": "Acme }{ Corp", "document_type": "ER"}"#;
        assert_eq!(find_json_object(raw), Some(raw));
    }

    #[test]
    fn handles_escaped_quotes() {
        let raw = r#"x {"company_name": "The \"}\" Shop"} y"#;
        assert_eq!(find_json_object(raw), Some(r#"{"company_name": "The \"}\" Shop"}"#));
    }

    #[test]
    fn returns_input_when_no_object() {
        assert_eq!(find_json_object("no json here"), None);
        assert_eq!(extract_json("no json here"), "no json here");
        assert_eq!(extract_json("{ never closed"), "{ never closed");
    }

    #[test]
    fn stray_closing_brace_is_not_an_object() {
        assert_eq!(find_json_object("} {}"), Some("{}"));
    }
}
