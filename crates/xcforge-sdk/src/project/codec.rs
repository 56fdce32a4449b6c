//! Typed access to build setting values.
//!
//! Build settings are stored as strings or arrays of strings. Each codec
//! converts one shape of setting to a typed value and back, and decides what
//! appending to an existing value means:
//!
//! | Codec | Typed value | Append |
//! |-------|-------------|--------|
//! | [`StringCodec`] | `String` | concatenation, space separated |
//! | [`BoolCodec`] | `bool` | override, logs a warning |
//! | [`ListCodec`] | `Vec<String>` | union, original order first |
//! | [`DeviceFamilyCodec`] | `Vec<DeviceFamily>` | override, logs a warning |
//! | [`KeyValueListCodec`] | `Vec<KeyValue>` | concatenation |

use std::fmt;

use super::value::Value;

/// Conversion strategy for one build setting shape.
pub trait Codec {
    /// The typed form of the setting.
    type Value;

    /// Decodes a stored value.
    fn open(raw: &Value) -> Self::Value;

    /// Encodes a typed value for storage.
    fn save(value: Self::Value) -> Value;

    /// Combines an existing stored value with an addition.
    fn append(original: Option<&Value>, addition: Self::Value) -> Value;
}

/// Joins array settings with spaces so every codec can start from text.
fn flatten(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Dict(_) => String::new(),
    }
}

/// Splits a space-delimited setting, keeping double-quoted tokens intact.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn items(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        other => split_words(&flatten(other)),
    }
}

/// Plain string settings such as `PRODUCT_NAME`.
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn open(raw: &Value) -> String {
        flatten(raw)
    }

    fn save(value: String) -> Value {
        Value::String(value)
    }

    fn append(original: Option<&Value>, addition: String) -> Value {
        match original.map(flatten).filter(|s| !s.is_empty()) {
            Some(existing) => Value::String(format!("{existing} {addition}")),
            None => Value::String(addition),
        }
    }
}

/// `YES`/`NO` settings such as `ENABLE_BITCODE`.
pub struct BoolCodec;

impl BoolCodec {
    /// Encodes a textual flag (`true`, `yes`, `1` are truthy).
    pub fn save_text(text: &str) -> Value {
        Self::save(truthy(text))
    }
}

fn truthy(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "1"
    )
}

impl Codec for BoolCodec {
    type Value = bool;

    fn open(raw: &Value) -> bool {
        truthy(&flatten(raw))
    }

    fn save(value: bool) -> Value {
        Value::from(value)
    }

    fn append(original: Option<&Value>, addition: bool) -> Value {
        if let Some(original) = original {
            tracing::warn!(
                original = %flatten(original),
                replacement = addition,
                "boolean settings cannot be appended, overriding"
            );
        }
        Self::save(addition)
    }
}

/// Space-delimited settings treated as a set, such as `OTHER_LDFLAGS`.
pub struct ListCodec;

impl Codec for ListCodec {
    type Value = Vec<String>;

    fn open(raw: &Value) -> Vec<String> {
        items(raw)
    }

    fn save(value: Vec<String>) -> Value {
        Value::String(value.join(" "))
    }

    fn append(original: Option<&Value>, addition: Vec<String>) -> Value {
        let mut merged = original.map(items).unwrap_or_default();
        for item in addition {
            if !merged.contains(&item) {
                merged.push(item);
            }
        }
        Self::save(merged)
    }
}

/// Values of `TARGETED_DEVICE_FAMILY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    Iphone,
    Ipad,
    Tv,
    Watch,
    Mac,
    Vision,
}

impl DeviceFamily {
    pub fn code(&self) -> u8 {
        match self {
            DeviceFamily::Iphone => 1,
            DeviceFamily::Ipad => 2,
            DeviceFamily::Tv => 3,
            DeviceFamily::Watch => 4,
            DeviceFamily::Mac => 6,
            DeviceFamily::Vision => 7,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(DeviceFamily::Iphone),
            "2" => Some(DeviceFamily::Ipad),
            "3" => Some(DeviceFamily::Tv),
            "4" => Some(DeviceFamily::Watch),
            "6" => Some(DeviceFamily::Mac),
            "7" => Some(DeviceFamily::Vision),
            _ => None,
        }
    }
}

/// Comma-coded `TARGETED_DEVICE_FAMILY`, e.g. `1,2` for iPhone and iPad.
pub struct DeviceFamilyCodec;

impl Codec for DeviceFamilyCodec {
    type Value = Vec<DeviceFamily>;

    fn open(raw: &Value) -> Vec<DeviceFamily> {
        flatten(raw)
            .split(',')
            .filter_map(|code| {
                let family = DeviceFamily::from_code(code);
                if family.is_none() && !code.trim().is_empty() {
                    tracing::warn!(code, "unknown device family code");
                }
                family
            })
            .collect()
    }

    fn save(value: Vec<DeviceFamily>) -> Value {
        Value::String(
            value
                .iter()
                .map(|f| f.code().to_string())
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    fn append(original: Option<&Value>, addition: Vec<DeviceFamily>) -> Value {
        if let Some(original) = original {
            tracing::warn!(
                original = %flatten(original),
                "device family cannot be appended, overriding"
            );
        }
        Self::save(addition)
    }
}

/// One `KEY=VALUE` (or bare `KEY`) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<String>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            key: key.into(),
            value: value.map(str::to_string),
        }
    }

    pub fn parse(entry: &str) -> Self {
        match entry.split_once('=') {
            Some((key, value)) => KeyValue::new(key, Some(value)),
            None => KeyValue::new(entry, None),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(entry: &str) -> Self {
        KeyValue::parse(entry)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => f.write_str(&self.key),
        }
    }
}

/// Ordered `KEY=VALUE` lists such as `GCC_PREPROCESSOR_DEFINITIONS`.
pub struct KeyValueListCodec;

impl Codec for KeyValueListCodec {
    type Value = Vec<KeyValue>;

    fn open(raw: &Value) -> Vec<KeyValue> {
        items(raw).iter().map(|entry| KeyValue::parse(entry)).collect()
    }

    fn save(value: Vec<KeyValue>) -> Value {
        Value::Array(value.iter().map(|kv| Value::String(kv.to_string())).collect())
    }

    fn append(original: Option<&Value>, addition: Vec<KeyValue>) -> Value {
        let mut merged = original.map(Self::open).unwrap_or_default();
        merged.extend(addition);
        Self::save(merged)
    }
}
