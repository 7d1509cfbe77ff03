use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::BridgeError;

/// Legacy options that have no counterpart and are refused outright.
pub const UNSUPPORTED_KEYS: [&str; 8] = [
    "file_name",
    "file_ext_tolower",
    "overwrite",
    "max_filename",
    "max_filename_increment",
    "remove_spaces",
    "detect_mime",
    "mod_mime_fix",
];

/// `"gif|jpg|png"`, `["gif", "jpg"]` or `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AllowedTypes {
    Pipe(String),
    List(Vec<String>),
}

impl AllowedTypes {
    /// Lower-cased extensions, or `None` when every type is allowed.
    #[must_use]
    pub fn extensions(&self) -> Option<Vec<String>> {
        let items: Vec<String> = match self {
            AllowedTypes::Pipe(s) => s.split('|').map(str::to_owned).collect(),
            AllowedTypes::List(list) => list.clone(),
        };
        let items: Vec<String> = items
            .iter()
            .map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if items.is_empty() || items.iter().any(|t| t == "*") {
            None
        } else {
            Some(items)
        }
    }
}

/// The upload options that are bridged. Sizes are in kilobytes and pixel
/// limits of 0 mean "no limit".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub upload_path: PathBuf,
    pub allowed_types: Option<AllowedTypes>,
    pub max_size: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub encrypt_name: bool,
}

impl UploadConfig {
    /// Parse a legacy config object.
    ///
    /// # Errors
    /// `NotSupported` for any key in [`UNSUPPORTED_KEYS`] with a non-null value,
    /// `ConfigError` for a non-object or a value of the wrong type.
    pub fn from_legacy(config: JsonValue) -> Result<Self, BridgeError> {
        let JsonValue::Object(map) = &config else {
            return Err(BridgeError::ConfigError(format!(
                "upload config must be an object, got {config}"
            )));
        };
        if let Some(key) = UNSUPPORTED_KEYS
            .iter()
            .find(|key| map.get(**key).is_some_and(|v| !v.is_null()))
        {
            return Err(BridgeError::NotSupported(format!(
                "upload config \"{key}\" is not supported"
            )));
        }
        serde_json::from_value(config)
            .map_err(|e| BridgeError::ConfigError(format!("invalid upload config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn legacy_keys_are_refused() {
        for key in UNSUPPORTED_KEYS {
            let err = UploadConfig::from_legacy(json!({ "upload_path": "/tmp", key: true }))
                .unwrap_err();
            assert!(matches!(err, BridgeError::NotSupported(msg) if msg.contains(key)));
        }
    }

    #[test]
    fn null_legacy_key_is_ignored() {
        let cfg = UploadConfig::from_legacy(json!({ "overwrite": null, "max_size": 10 })).unwrap();
        assert_eq!(cfg.max_size, 10);
    }

    #[test]
    fn wrong_types_are_config_errors() {
        assert!(matches!(
            UploadConfig::from_legacy(json!({ "max_size": "big" })),
            Err(BridgeError::ConfigError(_))
        ));
        assert!(matches!(
            UploadConfig::from_legacy(json!([1, 2])),
            Err(BridgeError::ConfigError(_))
        ));
    }

    #[test]
    fn allowed_types_forms() {
        let pipe = AllowedTypes::Pipe("GIF|.jpg| png".into());
        assert_eq!(
            pipe.extensions(),
            Some(vec!["gif".into(), "jpg".into(), "png".into()])
        );
        assert_eq!(AllowedTypes::Pipe("*".into()).extensions(), None);
        let cfg = UploadConfig::from_legacy(json!({ "allowed_types": ["txt"] })).unwrap();
        assert_eq!(
            cfg.allowed_types.and_then(|t| t.extensions()),
            Some(vec!["txt".to_string()])
        );
    }
}
