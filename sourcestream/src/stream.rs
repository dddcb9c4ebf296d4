//! Stream identifiers.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The stream used by [`SingleStreamStrategy`] when no other name is given.
///
/// Existing data written with the default configuration lives here, so the
/// value must not change.
///
/// [`SingleStreamStrategy`]: crate::strategy::SingleStreamStrategy
pub const DEFAULT_STREAM_NAME: &str = "event_stream";

/// The name of a physical, append-only stream. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamName(String);

impl StreamName {
    /// Creates a stream name, rejecting the empty string.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "stream name must not be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Returns the default stream name, `event_stream`.
    pub fn default_stream() -> Self {
        Self(DEFAULT_STREAM_NAME.to_string())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StreamName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StreamName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StreamName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StreamName> for String {
    fn from(value: StreamName) -> Self {
        value.0
    }
}
