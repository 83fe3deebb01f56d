//! Thin, deserializable wrappers around `http`'s header types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// A validated HTTP header name, deserializable from a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderName(http::HeaderName);

impl HeaderName {
    /// The header name as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<HeaderName> for http::HeaderName {
    fn from(value: HeaderName) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for HeaderName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        http::HeaderName::from_str(&raw)
            .map(HeaderName)
            .map_err(|e| serde::de::Error::custom(format!("invalid header name '{raw}': {e}")))
    }
}

/// A validated HTTP header value, deserializable from a plain string.
#[derive(Debug, Clone)]
pub struct HeaderValue(http::HeaderValue);

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_str().unwrap_or("<opaque>"))
    }
}

impl From<HeaderValue> for http::HeaderValue {
    fn from(value: HeaderValue) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for HeaderValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        http::HeaderValue::from_str(&raw)
            .map(HeaderValue)
            .map_err(|e| serde::de::Error::custom(format!("invalid header value '{raw}': {e}")))
    }
}
