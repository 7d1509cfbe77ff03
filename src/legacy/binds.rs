//! Positional `?` bind substitution for raw `query()` calls.

use crate::builder::CompiledQuery;
use crate::error::BridgeError;
use crate::types::RowValues;

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

fn starts_with_at(bytes: &[u8], idx: usize, pat: &[u8]) -> bool {
    bytes.get(idx..idx + pat.len()) == Some(pat)
}

/// Replace each bare `?` in `sql` with the next value from `binds`.
///
/// Markers inside quoted strings, identifiers and comments are left alone.
///
/// # Errors
/// `ParameterError` when the number of markers and values differ.
pub(crate) fn bind_markers(sql: &str, binds: &[RowValues]) -> Result<CompiledQuery, BridgeError> {
    let bytes = sql.as_bytes();
    let mut out = CompiledQuery::new();
    let mut state = State::Normal;
    let mut values = binds.iter();
    let mut markers = 0usize;
    let mut last = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if starts_with_at(bytes, idx, b"--") => state = State::LineComment,
                b'/' if starts_with_at(bytes, idx, b"/*") => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'?' => {
                    markers += 1;
                    out.push_sql(&sql[last..idx]);
                    if let Some(value) = values.next() {
                        out.push_bind(value.clone());
                    }
                    last = idx + 1;
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted => {
                let quote = if matches!(state, State::SingleQuoted) {
                    b'\''
                } else {
                    b'"'
                };
                if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // doubled quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if starts_with_at(bytes, idx, b"/*") {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if starts_with_at(bytes, idx, b"*/") {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }
    out.push_sql(&sql[last..]);

    if markers != binds.len() {
        return Err(BridgeError::ParameterError(format!(
            "query has {markers} bind marker(s) but {} value(s) were given",
            binds.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_in_order() {
        let q = bind_markers(
            "SELECT * FROM t WHERE a = ? AND b = ?",
            &[RowValues::Int(1), RowValues::Text("x".into())],
        )
        .unwrap();
        let (sql, params) = q.to_bound();
        assert_eq!(sql, "SELECT * FROM t WHERE a = ?1 AND b = ?2");
        assert_eq!(params, vec![RowValues::Int(1), RowValues::Text("x".into())]);
    }

    #[test]
    fn skips_literals_and_comments() {
        let q = bind_markers(
            "SELECT '?', \"a?\" -- ?\n/* ? /* ? */ */ FROM t WHERE a = ?",
            &[RowValues::Int(7)],
        )
        .unwrap();
        assert_eq!(
            q.to_sql(),
            "SELECT '?', \"a?\" -- ?\n/* ? /* ? */ */ FROM t WHERE a = 7"
        );
    }

    #[test]
    fn keeps_multibyte_text() {
        let q = bind_markers("SELECT 'héllo', ? AS ü", &[RowValues::Bool(true)]).unwrap();
        assert_eq!(q.to_sql(), "SELECT 'héllo', 1 AS ü");
    }

    #[test]
    fn count_mismatch_is_rejected() {
        assert!(matches!(
            bind_markers("SELECT ?", &[]),
            Err(BridgeError::ParameterError(_))
        ));
        assert!(matches!(
            bind_markers("SELECT 1", &[RowValues::Int(1)]),
            Err(BridgeError::ParameterError(_))
        ));
    }
}
