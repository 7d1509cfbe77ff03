//! String and value escaping for inline SQL literals.

use std::borrow::Cow;
use std::fmt::Write;

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::RowValues;

/// Character used to escape `LIKE` wildcards; rendered as `ESCAPE '!'`.
pub const LIKE_ESCAPE_CHAR: char = '!';

lazy_static! {
    // url encoded 00-08, 11, 12, 14, 15
    static ref URL_ENCODED_LOW: Regex = Regex::new("(?i)%0[0-8bcef]").expect("valid regex");
    // url encoded 16-31
    static ref URL_ENCODED_HIGH: Regex = Regex::new("(?i)%1[0-9a-f]").expect("valid regex");
    // 00-08, 11, 12, 14-31, 127
    static ref RAW_CONTROL: Regex =
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]+").expect("valid regex");
}

/// Strip control characters (all but tab, LF and CR), and optionally their
/// `%XX` url-encoded forms, until nothing more is removed.
///
/// ```rust
/// use legacy_qb::escape::remove_invisible_characters;
///
/// assert_eq!(remove_invisible_characters("a\0b%00c", true), "abc");
/// assert_eq!(remove_invisible_characters("%0%000", true), "");
/// ```
#[must_use]
pub fn remove_invisible_characters(input: &str, url_encoded: bool) -> String {
    let mut patterns: Vec<&Regex> = Vec::with_capacity(3);
    if url_encoded {
        patterns.push(&URL_ENCODED_LOW);
        patterns.push(&URL_ENCODED_HIGH);
    }
    patterns.push(&RAW_CONTROL);

    let mut current = input.to_owned();
    loop {
        let mut changed = false;
        for pattern in &patterns {
            let replaced = match pattern.replace_all(&current, "") {
                Cow::Owned(replaced) => Some(replaced),
                Cow::Borrowed(_) => None,
            };
            if let Some(replaced) = replaced {
                current = replaced;
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}

/// Escape a string for use inside single quotes.
///
/// With `like`, the `LIKE` wildcards `%` and `_` (and the escape character
/// itself) are prefixed with [`LIKE_ESCAPE_CHAR`].
#[must_use]
pub fn escape_str(input: &str, like: bool) -> String {
    let escaped = remove_invisible_characters(input, true).replace('\'', "''");
    if like {
        escape_like_wildcards(&escaped)
    } else {
        escaped
    }
}

/// `escape_str` with `like = true`.
#[must_use]
pub fn escape_like_str(input: &str) -> String {
    escape_str(input, true)
}

pub(crate) fn escape_like_wildcards(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch == LIKE_ESCAPE_CHAR || ch == '%' || ch == '_' {
            out.push(LIKE_ESCAPE_CHAR);
        }
        out.push(ch);
    }
    out
}

/// Render a value as an inline SQL literal.
///
/// Text is quoted and escaped, booleans become `1`/`0`, NULL becomes `NULL`,
/// numbers are written as-is.
#[must_use]
pub fn escape(value: &RowValues) -> String {
    match value {
        RowValues::Text(s) => format!("'{}'", escape_str(s, false)),
        RowValues::Bool(b) => String::from(if *b { "1" } else { "0" }),
        RowValues::Null => "NULL".to_owned(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Timestamp(dt) => format!("'{}'", dt.format("%F %T%.f")),
        RowValues::JSON(json) => format!("'{}'", escape_str(&json.to_string(), false)),
        RowValues::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for byte in bytes {
                let _ = write!(out, "{byte:02X}");
            }
            out.push('\'');
            out
        }
    }
}

/// Element-wise [`escape`].
#[must_use]
pub fn escape_all(values: &[RowValues]) -> Vec<String> {
    values.iter().map(escape).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_raw_and_url_encoded_nul() {
        assert_eq!(remove_invisible_characters("ab\0c", true), "abc");
        assert_eq!(remove_invisible_characters("ab%00c", true), "abc");
        assert_eq!(remove_invisible_characters("ab%1Fc%0b", true), "abc");
    }

    #[test]
    fn keeps_tab_newline_and_carriage_return() {
        let input = "a\tb\nc\rd%09%0a%0D";
        assert_eq!(remove_invisible_characters(input, true), input);
    }

    #[test]
    fn url_forms_survive_when_not_requested() {
        assert_eq!(remove_invisible_characters("a%00\x07b", false), "a%00b");
    }

    #[test]
    fn removal_repeats_until_stable() {
        // removing the inner %0e exposes another %00
        assert_eq!(remove_invisible_characters("%0%0e0x", true), "x");
    }

    #[test]
    fn stripping_is_idempotent() {
        let once = remove_invisible_characters("q\x01%10%7f\x7fz", true);
        assert_eq!(remove_invisible_characters(&once, true), once);
    }

    #[test]
    fn escape_str_doubles_quotes() {
        assert_eq!(escape_str("O'Reilly\0", false), "O''Reilly");
    }

    #[test]
    fn escape_str_like_escapes_wildcards() {
        assert_eq!(escape_like_str("50%_off!"), "50!%!_off!!");
    }

    #[test]
    fn escape_values() {
        assert_eq!(escape(&RowValues::Text("it's".into())), "'it''s'");
        assert_eq!(escape(&RowValues::Bool(false)), "0");
        assert_eq!(escape(&RowValues::Bool(true)), "1");
        assert_eq!(escape(&RowValues::Null), "NULL");
        assert_eq!(escape(&RowValues::Int(-4)), "-4");
        assert_eq!(escape(&RowValues::Blob(vec![0xde, 0xad])), "X'DEAD'");
        assert_eq!(
            escape_all(&[RowValues::Int(1), RowValues::Text("a".into())]),
            vec!["1".to_string(), "'a'".to_string()]
        );
    }
}
