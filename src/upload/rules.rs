use std::fmt;

use super::config::UploadConfig;
use super::file::UploadedFile;

/// One validation check on an upload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Uploaded,
    /// Kilobytes.
    MaxSize(u64),
    ExtIn(Vec<String>),
    /// Width, height; 0 leaves that side unlimited.
    MaxDims(u32, u32),
    MinDims(u32, u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRule {
    pub field: String,
    pub check: Check,
}

impl fmt::Display for UploadRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = &self.field;
        match &self.check {
            Check::Uploaded => write!(f, "uploaded[{field}]"),
            Check::MaxSize(kb) => write!(f, "max_size[{field},{kb}]"),
            Check::ExtIn(exts) => write!(f, "ext_in[{field},{}]", exts.join(",")),
            Check::MaxDims(w, h) => write!(f, "max_dims[{field},{w},{h}]"),
            Check::MinDims(w, h) => write!(f, "min_dims[{field},{w},{h}]"),
        }
    }
}

/// Turns legacy upload options into validation rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationRuleMaker;

impl ValidationRuleMaker {
    #[must_use]
    pub fn convert(field: &str, config: &UploadConfig) -> Vec<UploadRule> {
        let rule = |check| UploadRule {
            field: field.to_owned(),
            check,
        };
        let mut rules = vec![rule(Check::Uploaded)];
        if config.max_size > 0 {
            rules.push(rule(Check::MaxSize(config.max_size)));
        }
        if let Some(exts) = config.allowed_types.as_ref().and_then(|t| t.extensions()) {
            rules.push(rule(Check::ExtIn(exts)));
        }
        if config.max_width > 0 || config.max_height > 0 {
            rules.push(rule(Check::MaxDims(config.max_width, config.max_height)));
        }
        if config.min_width > 0 || config.min_height > 0 {
            rules.push(rule(Check::MinDims(config.min_width, config.min_height)));
        }
        rules
    }

    /// Rules joined with `|`, e.g. `uploaded[userfile]|max_size[userfile,100]`.
    #[must_use]
    pub fn rule_string(field: &str, config: &UploadConfig) -> String {
        Self::convert(field, config)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Checks a request's file against upload rules.
pub trait FileValidator: Send + Sync {
    /// Error messages; empty when the file passes.
    fn validate(&self, file: Option<&UploadedFile>, rules: &[UploadRule]) -> Vec<String>;
}

/// Built-in validator. Stops at the first failing rule, like the form validator
/// it stands in for.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl RuleValidator {
    fn check(file: Option<&UploadedFile>, rule: &UploadRule) -> Option<String> {
        let field = &rule.field;
        let Some(file) = file.filter(|f| f.is_valid()) else {
            return Some(format!("{field} is not a valid uploaded file."));
        };
        match &rule.check {
            Check::Uploaded => None,
            Check::MaxSize(kb) => {
                (file.size() > kb.saturating_mul(1024)).then(|| format!("{field} file is too large."))
            }
            Check::ExtIn(exts) => {
                let ext = file.client_extension();
                (!exts.iter().any(|e| *e == ext))
                    .then(|| format!("{field} does not have a valid file extension."))
            }
            Check::MaxDims(max_w, max_h) => {
                let fits = file.dimensions().is_some_and(|(w, h)| {
                    (*max_w == 0 || w <= *max_w) && (*max_h == 0 || h <= *max_h)
                });
                (!fits).then(|| format!("{field} is either not an image, or it is too wide or tall."))
            }
            Check::MinDims(min_w, min_h) => {
                let fits = file
                    .dimensions()
                    .is_some_and(|(w, h)| w >= *min_w && h >= *min_h);
                (!fits).then(|| {
                    format!("{field} is either not an image, or it is too narrow or short.")
                })
            }
        }
    }
}

impl FileValidator for RuleValidator {
    fn validate(&self, file: Option<&UploadedFile>, rules: &[UploadRule]) -> Vec<String> {
        rules
            .iter()
            .find_map(|rule| Self::check(file, rule))
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::config::AllowedTypes;

    fn config() -> UploadConfig {
        UploadConfig {
            allowed_types: Some(AllowedTypes::Pipe("gif|jpg".into())),
            max_size: 100,
            max_width: 1024,
            max_height: 768,
            ..UploadConfig::default()
        }
    }

    #[test]
    fn converts_to_rule_strings() {
        assert_eq!(
            ValidationRuleMaker::rule_string("userfile", &config()),
            "uploaded[userfile]|max_size[userfile,100]|ext_in[userfile,gif,jpg]|max_dims[userfile,1024,768]"
        );
        assert_eq!(
            ValidationRuleMaker::rule_string("f", &UploadConfig::default()),
            "uploaded[f]"
        );
    }

    #[test]
    fn missing_file_fails_uploaded() {
        let rules = ValidationRuleMaker::convert("userfile", &config());
        assert_eq!(
            RuleValidator.validate(None, &rules),
            vec!["userfile is not a valid uploaded file.".to_string()]
        );
    }

    #[test]
    fn first_failure_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        std::fs::write(&path, b"x").unwrap();
        let file = UploadedFile::new(&path, "big.png", "image/png", 200 * 1024);
        let rules = ValidationRuleMaker::convert("userfile", &config());
        assert_eq!(
            RuleValidator.validate(Some(&file), &rules),
            vec!["userfile file is too large.".to_string()]
        );

        let file = UploadedFile::new(&path, "ok.jpg", "image/jpeg", 10).with_dimensions(2000, 10);
        assert_eq!(
            RuleValidator.validate(Some(&file), &rules),
            vec!["userfile is either not an image, or it is too wide or tall.".to_string()]
        );

        let file = UploadedFile::new(&path, "ok.jpg", "image/jpeg", 10).with_dimensions(640, 480);
        assert!(RuleValidator.validate(Some(&file), &rules).is_empty());
    }
}
