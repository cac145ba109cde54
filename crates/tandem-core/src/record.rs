use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::CoreError;

/// One value carried by a user-info record.
///
/// Records only carry plain data: text, numbers, booleans, and nested maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserInfoValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Map(UserInfoRecord),
}

impl UserInfoValue {
    /// Returns the text content when this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            UserInfoValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the nested record when this value is a map.
    pub fn as_record(&self) -> Option<&UserInfoRecord> {
        match self {
            UserInfoValue::Map(record) => Some(record),
            _ => None,
        }
    }

    fn from_json(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Bool(b) => Ok(UserInfoValue::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(UserInfoValue::Integer(i)),
                None => n
                    .as_f64()
                    .map(UserInfoValue::Float)
                    .ok_or(CoreError::UnsupportedValue("number out of range")),
            },
            Value::String(s) => Ok(UserInfoValue::Text(s)),
            Value::Object(map) => UserInfoRecord::from_json_map(map).map(UserInfoValue::Map),
            Value::Null => Err(CoreError::UnsupportedValue("null")),
            Value::Array(_) => Err(CoreError::UnsupportedValue("array")),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            UserInfoValue::Bool(b) => Value::Bool(*b),
            UserInfoValue::Integer(i) => Value::Number((*i).into()),
            UserInfoValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            UserInfoValue::Text(s) => Value::String(s.clone()),
            UserInfoValue::Map(record) => record.to_json(),
        }
    }
}

impl From<&str> for UserInfoValue {
    fn from(value: &str) -> Self {
        UserInfoValue::Text(value.to_string())
    }
}

impl From<String> for UserInfoValue {
    fn from(value: String) -> Self {
        UserInfoValue::Text(value)
    }
}

impl From<bool> for UserInfoValue {
    fn from(value: bool) -> Self {
        UserInfoValue::Bool(value)
    }
}

impl From<i64> for UserInfoValue {
    fn from(value: i64) -> Self {
        UserInfoValue::Integer(value)
    }
}

impl From<f64> for UserInfoValue {
    fn from(value: f64) -> Self {
        UserInfoValue::Float(value)
    }
}

impl From<UserInfoRecord> for UserInfoValue {
    fn from(value: UserInfoRecord) -> Self {
        UserInfoValue::Map(value)
    }
}

/// Key-ordered user-info mapping exchanged between peers.
///
/// Equality is by content. Queue identity is positional and tracked by the
/// containers that hold records, never by the record itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserInfoRecord(BTreeMap<String, UserInfoValue>);

impl UserInfoRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<UserInfoValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<UserInfoValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&UserInfoValue> {
        self.0.get(key)
    }

    /// Shorthand for a text field lookup.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(UserInfoValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UserInfoValue)> {
        self.0.iter()
    }

    /// Converts a JSON object into a record, rejecting nulls and arrays.
    pub fn from_json(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Self::from_json_map(map),
            _ => Err(CoreError::InvalidRecord("expected a JSON object")),
        }
    }

    /// Renders the record as a JSON object (useful for logs).
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<Map<String, Value>>(),
        )
    }

    fn from_json_map(map: Map<String, Value>) -> Result<Self, CoreError> {
        let mut out = BTreeMap::new();
        for (key, value) in map {
            out.insert(key, UserInfoValue::from_json(value)?);
        }
        Ok(Self(out))
    }
}

impl<K: Into<String>, V: Into<UserInfoValue>> FromIterator<(K, V)> for UserInfoRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{UserInfoRecord, UserInfoValue};
    use serde_json::json;

    #[test]
    fn from_json_accepts_plain_nested_data() {
        let record = UserInfoRecord::from_json(json!({
            "uid": "xyz",
            "age": 42,
            "score": 1.5,
            "active": true,
            "profile": {"email": "bob@example.com"}
        }))
        .expect("plain data should convert");

        assert_eq!(record.get_str("uid"), Some("xyz"));
        assert_eq!(record.get("age"), Some(&UserInfoValue::Integer(42)));
        assert_eq!(record.get("score"), Some(&UserInfoValue::Float(1.5)));
        assert_eq!(record.get("active"), Some(&UserInfoValue::Bool(true)));
        let profile = record
            .get("profile")
            .and_then(UserInfoValue::as_record)
            .expect("nested map");
        assert_eq!(profile.get_str("email"), Some("bob@example.com"));
    }

    #[test]
    fn from_json_rejects_null_array_and_non_objects() {
        assert!(UserInfoRecord::from_json(json!({"a": null})).is_err());
        assert!(UserInfoRecord::from_json(json!({"a": [1, 2]})).is_err());
        assert!(UserInfoRecord::from_json(json!("text")).is_err());
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = UserInfoRecord::new().with("uid", "xyz").with("name", "bob");
        let b = UserInfoRecord::new().with("name", "bob").with("uid", "xyz");
        assert_eq!(a, b);
    }

    #[test]
    fn to_json_mirrors_from_json() {
        let value = json!({"uid": "abc", "n": 3, "nested": {"ok": false}});
        let record = UserInfoRecord::from_json(value.clone()).expect("record");
        assert_eq!(record.to_json(), value);
    }

    #[test]
    fn cbor_encoding_preserves_value_kinds() {
        let record = UserInfoRecord::new()
            .with("uid", "xyz")
            .with("count", 7_i64)
            .with("ratio", 0.25)
            .with("flag", true)
            .with("inner", UserInfoRecord::new().with("k", "v"));
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&record, &mut bytes).expect("encode");
        let decoded: UserInfoRecord = ciborium::de::from_reader(bytes.as_slice()).expect("decode");
        assert_eq!(decoded, record);
    }
}
