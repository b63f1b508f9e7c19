//! Declarative parameter maps.
//!
//! A [`ParameterMap`] is an *ordered* list of operation names, each carrying
//! either a bare scalar (`"rotate": 90`) or a structured set of named
//! arguments (`"rotate": {"degrees": 90}`). Order is significant twice over:
//! operations run in sequence, and the cache key is computed from the map as
//! written, so `{"resize": …, "crop": …}` and `{"crop": …, "resize": …}` are
//! different thumbnails.
//!
//! Maps are usually parsed from JSON ([`ParameterMap::from_json`]) or built in
//! code with the `with` builders:
//!
//! ```
//! use thumbcache::params::{Args, ParameterMap};
//!
//! let params = ParameterMap::new()
//!     .with("resize", Args::new().with("width", 500).with("height", 400))
//!     .with("quality", 80);
//! assert_eq!(params.names().collect::<Vec<_>>(), ["resize", "quality"]);
//! ```
//!
//! Nothing here knows which operation names exist; that is the
//! [`interpreter`](crate::interpreter)'s job.

use image::DynamicImage;
use serde::ser::{Serialize, SerializeMap, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParamError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parameters must be a JSON object")]
    NotAnObject,
    #[error("operation \"{operation}\": field \"{field}\" must be a scalar")]
    Nested { operation: String, field: String },
    #[error("operation \"{0}\": arrays are not supported")]
    Array(String),
}

/// A previously built image, passed as a parameter value (watermarks).
///
/// Cheap to clone. The SHA-256 of the pixel data is computed once on
/// construction and stands in for the image in cache keys.
#[derive(Clone)]
pub struct SharedImage {
    image: Arc<DynamicImage>,
    digest: Arc<str>,
}

impl SharedImage {
    pub fn new(image: DynamicImage) -> Self {
        let digest = format!("{:x}", Sha256::digest(image.as_bytes()));
        Self {
            image: Arc::new(image),
            digest: digest.into(),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl PartialEq for SharedImage {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl fmt::Debug for SharedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SharedImage({}x{}, {})",
            self.image.width(),
            self.image.height(),
            &self.digest[..12]
        )
    }
}

/// A scalar parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Image(SharedImage),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view. Whole floats and numeric text convert; nothing else does.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Image(_) => "image",
        }
    }

    fn from_json(value: serde_json::Value) -> Option<Self> {
        Some(match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64()?),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => return None,
        })
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<SharedImage> for Value {
    fn from(image: SharedImage) -> Self {
        Value::Image(image)
    }
}

/// Insert into an ordered entry list, replacing an existing key in place.
fn upsert<T>(entries: &mut Vec<(String, T)>, key: String, value: T) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

/// Named arguments of a structured operation, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Args {
    entries: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        upsert(&mut self.entries, name.to_string(), value.into());
    }

    /// The value stored under `name`, if any (null included).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// The value under `name` unless it is absent or null.
    pub fn present(&self, name: &str) -> Option<&Value> {
        self.get(name).filter(|v| !v.is_null())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The argument of one operation: a bare scalar or named arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Scalar(Value),
    Structured(Args),
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Scalar(value)
    }
}

impl From<Args> for Param {
    fn from(args: Args) -> Self {
        Param::Structured(args)
    }
}

impl From<i64> for Param {
    fn from(n: i64) -> Self {
        Param::Scalar(n.into())
    }
}

impl From<i32> for Param {
    fn from(n: i32) -> Self {
        Param::Scalar(n.into())
    }
}

impl From<f64> for Param {
    fn from(f: f64) -> Self {
        Param::Scalar(f.into())
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Scalar(b.into())
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Scalar(s.into())
    }
}

impl From<SharedImage> for Param {
    fn from(image: SharedImage) -> Self {
        Param::Scalar(image.into())
    }
}

/// Ordered operation name → argument mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterMap {
    entries: Vec<(String, Param)>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, param: impl Into<Param>) -> Self {
        self.insert(name, param);
        self
    }

    /// Add an operation. Re-inserting a name replaces its argument but keeps
    /// its original position.
    pub fn insert(&mut self, name: &str, param: impl Into<Param>) {
        upsert(&mut self.entries, name.to_string(), param.into());
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Param> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a JSON object, keeping key order.
    ///
    /// Structured arguments may only hold scalars; arrays are rejected.
    pub fn from_json(text: &str) -> Result<Self, ParamError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ParamError> {
        let serde_json::Value::Object(object) = value else {
            return Err(ParamError::NotAnObject);
        };

        let mut params = Self::new();
        for (operation, raw) in object {
            let param = match raw {
                serde_json::Value::Object(fields) => {
                    let mut args = Args::new();
                    for (field, raw_field) in fields {
                        let value =
                            Value::from_json(raw_field).ok_or_else(|| ParamError::Nested {
                                operation: operation.clone(),
                                field: field.clone(),
                            })?;
                        args.insert(&field, value);
                    }
                    Param::Structured(args)
                }
                serde_json::Value::Array(_) => return Err(ParamError::Array(operation)),
                scalar => {
                    Param::Scalar(Value::from_json(scalar).ok_or(ParamError::NotAnObject)?)
                }
            };
            params.insert(&operation, param);
        }
        Ok(params)
    }
}

// =============================================================================
// Canonical serialization (cache keys)
// =============================================================================

#[derive(serde::Serialize)]
struct ImageDigest<'a> {
    width: u32,
    height: u32,
    sha256: &'a str,
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Image(image) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    "image",
                    &ImageDigest {
                        width: image.image().width(),
                        height: image.image().height(),
                        sha256: image.digest(),
                    },
                )?;
                map.end()
            }
        }
    }
}

impl Serialize for Args {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for Param {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Param::Scalar(value) => value.serialize(serializer),
            Param::Structured(args) => args.serialize(serializer),
        }
    }
}

impl Serialize for ParameterMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
