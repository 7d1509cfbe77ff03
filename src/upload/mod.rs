//! Legacy file-upload helper: validates a request's file against rules derived
//! from a legacy config and moves it into the upload directory.

mod config;
mod file;
mod rules;

pub use config::{AllowedTypes, UNSUPPORTED_KEYS, UploadConfig};
pub use file::{FileBag, UploadRequest, UploadedFile};
pub use rules::{Check, FileValidator, RuleValidator, UploadRule, ValidationRuleMaker};

use std::path::Path;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::error::BridgeError;

/// Everything known about the last successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadData {
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
    pub full_path: String,
    pub raw_name: String,
    pub orig_name: String,
    pub client_name: String,
    /// Includes the leading dot.
    pub file_ext: String,
    /// Kilobytes, two decimals.
    pub file_size: f64,
}

/// ```rust
/// use legacy_qb::prelude::*;
/// use serde_json::json;
///
/// let err = Upload::new(json!({ "upload_path": "/tmp", "remove_spaces": true })).unwrap_err();
/// assert!(matches!(err, BridgeError::NotSupported(_)));
/// ```
pub struct Upload {
    config: UploadConfig,
    validator: Box<dyn FileValidator>,
    file: Option<UploadedFile>,
    errors: Vec<String>,
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("config", &self.config)
            .field("file", &self.file)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl Upload {
    /// # Errors
    /// `NotSupported` for legacy-only options, `ConfigError` for malformed config.
    pub fn new(config: JsonValue) -> Result<Self, BridgeError> {
        Ok(Self {
            config: UploadConfig::from_legacy(config)?,
            validator: Box::new(RuleValidator),
            file: None,
            errors: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl FileValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Validate and store the file posted under `field`.
    ///
    /// Returns `Ok(false)` when validation fails or the request holds no usable
    /// file; the messages are kept for [`display_errors`](Self::display_errors).
    ///
    /// # Errors
    /// `ConfigError` without an `upload_path`, before the request is touched;
    /// `Io` when the move fails.
    pub async fn do_upload(
        &mut self,
        request: &mut impl UploadRequest,
        field: &str,
    ) -> Result<bool, BridgeError> {
        self.errors.clear();
        if self.config.upload_path.as_os_str().is_empty() {
            return Err(BridgeError::ConfigError(
                "upload_path is required to store uploads".into(),
            ));
        }
        let rules = ValidationRuleMaker::convert(field, &self.config);
        let errors = self.validator.validate(request.file(field), &rules);
        if !errors.is_empty() {
            warn!(field, errors = ?errors, "upload rejected");
            self.errors = errors;
            return Ok(false);
        }
        let Some(mut file) = request.take_file(field) else {
            return Ok(false);
        };
        if !file.is_valid() {
            return Ok(false);
        }
        let name = self.config.encrypt_name.then(|| file.random_name());
        let target = file.move_to(&self.config.upload_path, name).await?;
        info!(field, path = %target.display(), "upload stored");
        self.file = Some(file);
        Ok(true)
    }

    /// Validation messages from the last `do_upload`, each wrapped in `open`/`close`.
    #[must_use]
    pub fn display_errors(&self, open: &str, close: &str) -> String {
        self.errors
            .iter()
            .map(|e| format!("{open}{e}{close}"))
            .collect()
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// # Errors
    /// `Precondition` before a successful `do_upload`.
    pub fn data(&self) -> Result<UploadData, BridgeError> {
        let file = self.file.as_ref().ok_or_else(|| {
            BridgeError::Precondition("no file has been uploaded yet".into())
        })?;
        let file_name = file.name().to_owned();
        let raw_name = Path::new(&file_name)
            .file_stem()
            .map_or_else(|| file_name.clone(), |s| s.to_string_lossy().into_owned());
        let file_ext = Path::new(&file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        #[allow(clippy::cast_precision_loss)]
        let file_size = (file.size() as f64 / 1024.0 * 100.0).round() / 100.0;
        Ok(UploadData {
            file_type: file.client_mime_type().to_owned(),
            file_path: self.config.upload_path.to_string_lossy().into_owned(),
            full_path: file.path().to_string_lossy().into_owned(),
            raw_name,
            orig_name: file.client_name().to_owned(),
            client_name: file.client_name().to_owned(),
            file_ext,
            file_size,
            file_name,
        })
    }

    /// One field of [`data`](Self::data); `None` for an unknown name.
    ///
    /// # Errors
    /// `Precondition` before a successful `do_upload`.
    pub fn data_field(&self, index: &str) -> Result<Option<JsonValue>, BridgeError> {
        let JsonValue::Object(mut map) = serde_json::to_value(self.data()?)? else {
            return Ok(None);
        };
        Ok(map.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn data_before_upload_is_a_precondition_error() {
        let upload = Upload::new(json!({ "upload_path": "/tmp" })).unwrap();
        assert!(matches!(upload.data(), Err(BridgeError::Precondition(_))));
        assert!(matches!(
            upload.data_field("file_name"),
            Err(BridgeError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn missing_upload_path_leaves_the_request_alone() {
        let src = tempfile::tempdir().unwrap();
        let tmp = src.path().join("php456");
        std::fs::write(&tmp, b"data").unwrap();

        let mut upload = Upload::new(json!({ "max_size": 10 })).unwrap();
        let mut request =
            FileBag::new().with_file("userfile", UploadedFile::new(&tmp, "a.txt", "text/plain", 4));
        let err = upload.do_upload(&mut request, "userfile").await.unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
        assert!(request.file("userfile").is_some());
        assert!(tmp.is_file());
    }

    struct RejectAll;

    impl FileValidator for RejectAll {
        fn validate(&self, _file: Option<&UploadedFile>, _rules: &[UploadRule]) -> Vec<String> {
            vec!["nope".into(), "still no".into()]
        }
    }

    #[tokio::test]
    async fn custom_validator_errors_are_displayed() {
        let mut upload = Upload::new(json!({ "upload_path": "/tmp" }))
            .unwrap()
            .with_validator(RejectAll);
        let mut request = FileBag::new();
        assert!(!upload.do_upload(&mut request, "userfile").await.unwrap());
        assert_eq!(
            upload.display_errors("<p>", "</p>"),
            "<p>nope</p><p>still no</p>"
        );
    }

    #[tokio::test]
    async fn stores_file_and_reports_data() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let tmp = src.path().join("php123");
        std::fs::write(&tmp, vec![0u8; 2048]).unwrap();

        let mut upload = Upload::new(json!({
            "upload_path": dest.path(),
            "allowed_types": "jpg|png",
            "max_size": 10,
        }))
        .unwrap();
        let mut request =
            FileBag::new().with_file("userfile", UploadedFile::new(&tmp, "cat.jpg", "image/jpeg", 2048));
        assert!(upload.do_upload(&mut request, "userfile").await.unwrap());

        let data = upload.data().unwrap();
        assert_eq!(data.file_name, "cat.jpg");
        assert_eq!(data.raw_name, "cat");
        assert_eq!(data.file_ext, ".jpg");
        assert_eq!(data.file_type, "image/jpeg");
        assert!((data.file_size - 2.0).abs() < f64::EPSILON);
        assert!(dest.path().join("cat.jpg").is_file());
        assert_eq!(upload.data_field("orig_name").unwrap(), Some(json!("cat.jpg")));
        assert_eq!(upload.data_field("bogus").unwrap(), None);
    }
}
