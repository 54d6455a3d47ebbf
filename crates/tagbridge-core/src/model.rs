// ── Domain values ──
//
// Scalar tag values and the immutable `Reading` facts pushed to sinks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Tag;

/// Last known scalar value of a tag.
///
/// Serializes untagged so a reading's `value` is a bare JSON number or
/// boolean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl TagValue {
    /// Interpret a JSON scalar as a tag value. Strings, arrays, objects and
    /// null have no tag-value meaning.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i16> for TagValue {
    fn from(value: i16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// What produced a reading. Not persisted; used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReadingCause {
    Initialized,
    Changed,
    Sweep,
}

/// An immutable fact to be persisted.
///
/// `timestamp` is the moment the reading was built, not the device sample
/// time. Fields are private so a reading cannot change after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    timestamp: DateTime<Utc>,
    tag_name: String,
    display_name: String,
    value: TagValue,
    #[serde(skip)]
    cause: ReadingCause,
}

impl Reading {
    /// Build a reading for `tag` stamped with the current UTC time.
    pub fn now(tag: &Tag, value: TagValue, cause: ReadingCause) -> Self {
        Self::at(Utc::now(), tag, value, cause)
    }

    /// Build a reading with an explicit timestamp.
    pub fn at(timestamp: DateTime<Utc>, tag: &Tag, value: TagValue, cause: ReadingCause) -> Self {
        Self {
            timestamp,
            tag_name: tag.name().to_owned(),
            display_name: tag.display_name().to_owned(),
            value,
            cause,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn value(&self) -> TagValue {
        self.value
    }

    pub fn cause(&self) -> ReadingCause {
        self.cause
    }
}
