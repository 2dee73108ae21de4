use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use strum_macros::Display as StrumDisplay;

/// Attribute value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ModelType {
    Boolean,
    Int,
    Long,
    String,
    List,
    Object,
}

/// Dynamically typed attribute value.
///
/// Serializes to plain JSON; `null` is [`ModelValue::Undefined`]. Integral numbers that fit
/// in `i32` deserialize as [`ModelValue::Int`], larger ones as [`ModelValue::Long`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelValue {
    #[default]
    Undefined,
    Boolean(bool),
    Int(i32),
    Long(i64),
    String(String),
    List(Vec<ModelValue>),
    Object(BTreeMap<String, ModelValue>),
}

impl ModelValue {
    /// Builds an object value from key/value pairs.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn list<V: Into<Self>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub const fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined)
    }

    #[must_use]
    pub const fn model_type(&self) -> Option<ModelType> {
        Some(match self {
            Self::Undefined => return None,
            Self::Boolean(_) => ModelType::Boolean,
            Self::Int(_) => ModelType::Int,
            Self::Long(_) => ModelType::Long,
            Self::String(_) => ModelType::String,
            Self::List(_) => ModelType::List,
            Self::Object(_) => ModelType::Object,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral value of an `Int` or `Long`.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i as i64),
            Self::Long(l) => Some(*l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|v| i32::try_from(v).ok())
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_object(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Field lookup on an object value; `None` for other kinds or absent keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl Display for ModelValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}L"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            },
            Self::Object(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str("}")
            },
        }
    }
}

impl From<bool> for ModelValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for ModelValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for ModelValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<&str> for ModelValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ModelValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Self>> for ModelValue {
    fn from(value: Vec<Self>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, Self>> for ModelValue {
    fn from(value: BTreeMap<String, Self>) -> Self {
        Self::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_numbers_pick_the_narrowest_integral_kind() {
        let small: ModelValue = serde_json::from_str("42").unwrap();
        let big: ModelValue = serde_json::from_str("60000000000").unwrap();
        let null: ModelValue = serde_json::from_str("null").unwrap();
        assert_eq!(small, ModelValue::Int(42));
        assert_eq!(big, ModelValue::Long(60_000_000_000));
        assert_eq!(null, ModelValue::Undefined);
        assert_eq!(small.as_i64(), Some(42));
        assert_eq!(big.as_i32(), None);
    }

    #[test]
    fn nested_objects_deserialize() {
        let value: ModelValue = serde_json::from_str(
            r#"{"realms":[{"realm":"r","role-decoder":"groups"}],"enabled":true}"#,
        )
        .unwrap();
        let realms = value.get("realms").and_then(ModelValue::as_list).unwrap();
        assert_eq!(realms[0].get("realm").and_then(ModelValue::as_str), Some("r"));
        assert_eq!(value.get("enabled").and_then(ModelValue::as_bool), Some(true));
        assert_eq!(value.model_type(), Some(ModelType::Object));
    }

    #[test]
    fn display_is_compact() {
        let value = ModelValue::object([("path", ModelValue::from("users.properties"))]);
        assert_eq!(value.to_string(), r#"{path="users.properties"}"#);
        assert_eq!(ModelType::Long.to_string(), "LONG");
    }
}
