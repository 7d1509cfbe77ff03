use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::BridgeError;

/// Values that can be stored in a database row, bound as a query parameter, or
/// recorded as the value side of a pending clause.
///
/// ```rust
/// use legacy_qb::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// JSON rendering used by array-style result access.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => JsonValue::from(*f),
            RowValues::Text(s) => JsonValue::from(s.as_str()),
            RowValues::Bool(b) => JsonValue::from(*b),
            RowValues::Timestamp(dt) => JsonValue::from(dt.format("%F %T%.f").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(v) => v.clone(),
            RowValues::Blob(bytes) => JsonValue::from(bytes.clone()),
        }
    }

    /// Convert a JSON scalar into a row value; arrays and objects stay JSON.
    #[must_use]
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => RowValues::Int(i),
                None => RowValues::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => RowValues::Text(s),
            other @ (JsonValue::Array(_) | JsonValue::Object(_)) => RowValues::JSON(other),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_owned())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Insertion-ordered column/value payload for `set`, `insert`, `update` and
/// `get_where`.
///
/// The legacy layer accepted associative arrays and plain objects
/// interchangeably; here both end up as a `RowMap`, validated where it is built.
///
/// ```rust
/// use legacy_qb::prelude::*;
///
/// let row = RowMap::new().with("name", "alice").with("age", 31);
/// assert_eq!(row.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMap {
    entries: Vec<(String, RowValues)>,
}

impl RowMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chaining form of [`RowMap::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, replacing an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RowValues>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RowValues> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build from a JSON object.
    ///
    /// # Errors
    /// Returns `BridgeError::ParameterError` if `value` is not an object.
    pub fn from_json(value: JsonValue) -> Result<Self, BridgeError> {
        match value {
            JsonValue::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, RowValues::from_json(v)))
                .collect()),
            other => Err(BridgeError::ParameterError(format!(
                "expected a key/value object, got {other}"
            ))),
        }
    }

    /// Build from any serializable struct or map, in field order.
    ///
    /// # Errors
    /// Returns `BridgeError::Json` if serialization fails or
    /// `BridgeError::ParameterError` if the value does not serialize to an object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, BridgeError> {
        Self::from_json(serde_json::to_value(value)?)
    }
}

impl IntoIterator for RowMap {
    type Item = (String, RowValues);
    type IntoIter = std::vec::IntoIter<(String, RowValues)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<RowValues>> FromIterator<(K, V)> for RowMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = RowMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// The database type supported by this middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatabaseType {
    /// `SQLite` database
    Sqlite,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct User {
        name: String,
        age: i64,
        tags: Vec<String>,
    }

    #[test]
    fn row_map_from_struct_keeps_field_order() {
        let user = User {
            name: "bob".into(),
            age: 40,
            tags: vec!["a".into()],
        };
        let map = RowMap::from_serialize(&user).unwrap();
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, ["name", "age", "tags"]);
        assert_eq!(map.get("age"), Some(&RowValues::Int(40)));
        assert!(matches!(map.get("tags"), Some(RowValues::JSON(_))));
    }

    #[test]
    fn row_map_rejects_non_objects() {
        let err = RowMap::from_serialize(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, BridgeError::ParameterError(_)));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut map = RowMap::new().with("a", 1).with("b", 2);
        map.insert("a", 3);
        let pairs: Vec<_> = map.iter().map(|(k, v)| (k.to_owned(), v.clone())).collect();
        assert_eq!(
            pairs,
            vec![("a".into(), RowValues::Int(3)), ("b".into(), RowValues::Int(2))]
        );
    }

    #[test]
    fn option_converts_to_null() {
        let value: RowValues = Option::<i64>::None.into();
        assert!(value.is_null());
    }
}
