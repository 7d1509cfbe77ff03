//! Identifier protection and key parsing for clause arguments.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SYMBOL_OPERATOR: Regex =
        Regex::new(r"(?s)^(.+?)\s*(!=|<>|<=|>=|=|<|>)\s*$").expect("valid regex");
    static ref WORD_OPERATOR: Regex =
        Regex::new(r"(?is)^(.+?)\s+(IS\s+NOT|IS|NOT\s+LIKE|LIKE)\s*$").expect("valid regex");
    static ref ALIAS: Regex = Regex::new(r"(?i)^(.+?)\s+AS\s+(\S+)$").expect("valid regex");
    static ref COMPARISON: Regex =
        Regex::new(r"^([\w.]+)\s*(=|!=|<>|<=|>=|<|>)\s*([\w.]+)$").expect("valid regex");
    static ref LOGICAL: Regex = Regex::new(r"(?i)\s+(?:AND|OR)\s+").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Double-quote one identifier part, unless it is already quoted.
#[must_use]
pub fn quote_identifier(part: &str) -> String {
    if part.starts_with('"') {
        part.to_owned()
    } else {
        format!("\"{}\"", part.replace('"', "\"\""))
    }
}

fn is_numeric(item: &str) -> bool {
    item.chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
        && item.parse::<f64>().is_ok()
}

fn protect_dotted(name: &str) -> String {
    name.split('.')
        .map(|part| {
            if part == "*" {
                part.to_owned()
            } else {
                quote_identifier(part)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote `table.column` style identifiers, keeping `AS` aliases.
///
/// `*`, numbers, expressions containing `(` or `'`, and already-quoted items
/// pass through untouched, as does anything with more than two words.
///
/// ```rust
/// use legacy_qb::builder::protect_identifiers;
///
/// assert_eq!(protect_identifiers("u.name AS n"), r#""u"."name" AS "n""#);
/// assert_eq!(protect_identifiers("users u"), r#""users" "u""#);
/// assert_eq!(protect_identifiers("COUNT(id)"), "COUNT(id)");
/// ```
#[must_use]
pub fn protect_identifiers(item: &str) -> String {
    let item = item.trim();
    if item.is_empty() || item == "*" || is_numeric(item) {
        return item.to_owned();
    }
    if item.contains('(') || item.contains('\'') || item.starts_with('"') {
        return item.to_owned();
    }
    if let Some(caps) = ALIAS.captures(item) {
        return format!(
            "{} AS {}",
            protect_identifiers(&caps[1]),
            quote_identifier(&caps[2])
        );
    }
    let words: Vec<&str> = item.split_whitespace().collect();
    match words.as_slice() {
        [single] => protect_dotted(single),
        [name, alias] => format!("{} {}", protect_dotted(name), quote_identifier(alias)),
        _ => item.to_owned(),
    }
}

/// Protect both sides of simple `a.x = b.y` comparisons joined by AND/OR.
/// Anything more complex is left as written.
#[must_use]
pub fn protect_condition(cond: &str) -> String {
    let mut out = String::with_capacity(cond.len() + 8);
    let mut last = 0;
    for m in LOGICAL.find_iter(cond) {
        out.push_str(&protect_comparison(&cond[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&protect_comparison(&cond[last..]));
    out
}

fn protect_comparison(piece: &str) -> String {
    let Some(caps) = COMPARISON.captures(piece.trim()) else {
        return piece.to_owned();
    };
    format!(
        "{} {} {}",
        protect_identifiers(&caps[1]),
        &caps[2],
        protect_identifiers(&caps[3])
    )
}

/// Split a `where` key into column and trailing operator.
///
/// `"age >"` gives `("age", Some(">"))`; `"deleted_at is not"` gives
/// `("deleted_at", Some("IS NOT"))`; a bare column gives `(column, None)`.
#[must_use]
pub fn split_operator(key: &str) -> (String, Option<String>) {
    let key = key.trim();
    if let Some(caps) = WORD_OPERATOR.captures(key) {
        let op = WHITESPACE.replace_all(&caps[2], " ").to_uppercase();
        return (caps[1].trim().to_owned(), Some(op));
    }
    if let Some(caps) = SYMBOL_OPERATOR.captures(key) {
        return (caps[1].trim().to_owned(), Some(caps[2].to_owned()));
    }
    (key.to_owned(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_symbol_operators() {
        assert_eq!(split_operator("age >"), ("age".into(), Some(">".into())));
        assert_eq!(split_operator("age<="), ("age".into(), Some("<=".into())));
        assert_eq!(split_operator("name !="), ("name".into(), Some("!=".into())));
        assert_eq!(split_operator("name"), ("name".into(), None));
    }

    #[test]
    fn splits_word_operators() {
        assert_eq!(
            split_operator("deleted_at is  not"),
            ("deleted_at".into(), Some("IS NOT".into()))
        );
        assert_eq!(
            split_operator("title NOT LIKE"),
            ("title".into(), Some("NOT LIKE".into()))
        );
    }

    #[test]
    fn protects_dotted_and_star() {
        assert_eq!(protect_identifiers("users.*"), r#""users".*"#);
        assert_eq!(protect_identifiers("*"), "*");
        assert_eq!(protect_identifiers("1"), "1");
        assert_eq!(protect_identifiers(r#""already""#), r#""already""#);
        assert_eq!(protect_identifiers("a b c"), "a b c");
    }

    #[test]
    fn protects_join_conditions() {
        assert_eq!(
            protect_condition("comments.id = blogs.id"),
            r#""comments"."id" = "blogs"."id""#
        );
        assert_eq!(
            protect_condition("a.id = b.a_id AND b.kind = 1"),
            r#""a"."id" = "b"."a_id" AND "b"."kind" = 1"#
        );
        assert_eq!(
            protect_condition("a.id = lower(b.id)"),
            "a.id = lower(b.id)"
        );
    }
}
