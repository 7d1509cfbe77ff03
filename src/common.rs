//! Process-wide polyfills for the legacy global helpers.

use std::sync::OnceLock;

use tracing::error;

use crate::error::BridgeError;

/// How the process is being run; decides the wording of `show_404`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeContext {
    pub is_cli: bool,
}

static RUNTIME: OnceLock<RuntimeContext> = OnceLock::new();

/// Register the runtime context once at process start.
///
/// # Errors
/// `Precondition` if a context was already installed; the helpers cannot be
/// redefined.
pub fn install_runtime(context: RuntimeContext) -> Result<(), BridgeError> {
    RUNTIME
        .set(context)
        .map_err(|_| BridgeError::Precondition("runtime helpers are already installed".into()))
}

/// The installed context, or the web default when none was installed.
#[must_use]
pub fn runtime() -> RuntimeContext {
    RUNTIME.get().copied().unwrap_or_default()
}

/// Always returns an error for the caller to propagate.
///
/// A non-empty `heading` is `NotSupported` (custom headings belong in the error
/// view); otherwise the error is `Runtime` with `status`.
#[must_use]
pub fn show_error(message: &str, status: u16, heading: &str) -> BridgeError {
    if !heading.is_empty() {
        return BridgeError::NotSupported(
            "a custom heading is not supported; customise the error view instead".into(),
        );
    }
    BridgeError::Runtime {
        message: message.to_owned(),
        status,
    }
}

/// Always returns `PageNotFound`; logs `page` at error level when `log_error` is set.
#[must_use]
pub fn show_404(page: &str, log_error: bool) -> BridgeError {
    show_404_in(runtime(), page, log_error)
}

fn show_404_in(context: RuntimeContext, page: &str, log_error: bool) -> BridgeError {
    let (heading, message) = if context.is_cli {
        (
            "Not Found",
            "The controller/method pair you requested was not found.",
        )
    } else {
        ("404 Page Not Found", "The page you requested was not found.")
    };
    if log_error {
        error!("{heading}: {page}");
    }
    BridgeError::PageNotFound(format!("{heading}: {message}"))
}

/// Escape `& < > " '` for HTML.
///
/// # Errors
/// `NotSupported` when `double_encode` is `false`.
///
/// ```rust
/// use legacy_qb::common::html_escape;
///
/// assert_eq!(html_escape("<a href='x'>&</a>", true).unwrap(),
///            "&lt;a href=&#039;x&#039;&gt;&amp;&lt;/a&gt;");
/// ```
pub fn html_escape(value: &str, double_encode: bool) -> Result<String, BridgeError> {
    if !double_encode {
        return Err(BridgeError::NotSupported(
            "double_encode = false is not supported".into(),
        ));
    }
    let mut out = String::with_capacity(value.len() + value.len() / 8);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// Element-wise [`html_escape`].
///
/// # Errors
/// `NotSupported` when `double_encode` is `false`.
pub fn html_escape_all<S: AsRef<str>>(
    values: &[S],
    double_encode: bool,
) -> Result<Vec<String>, BridgeError> {
    values
        .iter()
        .map(|v| html_escape(v.as_ref(), double_encode))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_error_with_heading_is_not_supported() {
        assert!(matches!(
            show_error("boom", 500, "Oops"),
            BridgeError::NotSupported(_)
        ));
        assert!(matches!(
            show_error("boom", 503, ""),
            BridgeError::Runtime { status: 503, ref message } if message == "boom"
        ));
    }

    #[test]
    fn show_404_wording_depends_on_context() {
        let web = show_404_in(RuntimeContext { is_cli: false }, "/missing", false);
        assert_eq!(
            web.to_string(),
            "404 Page Not Found: The page you requested was not found."
        );
        let cli = show_404_in(RuntimeContext { is_cli: true }, "tasks/run", true);
        assert_eq!(
            cli.to_string(),
            "Not Found: The controller/method pair you requested was not found."
        );
    }

    #[test]
    fn escapes_and_refuses_single_encoding() {
        assert_eq!(html_escape("\"a\" & b", true).unwrap(), "&quot;a&quot; &amp; b");
        assert_eq!(html_escape("&amp;", true).unwrap(), "&amp;amp;");
        assert!(matches!(
            html_escape("x", false),
            Err(BridgeError::NotSupported(_))
        ));
        assert_eq!(
            html_escape_all(&["<", ">"], true).unwrap(),
            vec!["&lt;".to_string(), "&gt;".to_string()]
        );
    }
}
