//! Write key, error state and manager lifecycle types.

use crate::error::{ConfigError, Result};
use std::fmt;

/// Credential identifying a source to the control plane.
///
/// The key is validated once at construction and never changes afterwards.
/// Its `Debug` representation is redacted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WriteKey(String);

impl WriteKey {
    /// Create a write key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWriteKey`] if the key is empty, only
    /// whitespace, or contains whitespace/control characters.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::InvalidWriteKey("write key is empty".to_string()));
        }
        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ConfigError::InvalidWriteKey(
                "write key contains whitespace or control characters".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// The raw key, for building credentials.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "WriteKey({}…)", visible)
    }
}

impl TryFrom<&str> for WriteKey {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for WriteKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

/// Outcome of the last fetch, as seen by SDK consumers.
///
/// The integer codes (0, 1, 2) are the externally visible status contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorState {
    /// The configuration was fetched successfully.
    #[default]
    None,
    /// The control plane could not be reached; retries were exhausted.
    NetworkError,
    /// The control plane rejected the write key.
    WrongWriteKey,
}

impl ErrorState {
    /// Numeric status code: 0 = success, 1 = network error, 2 = wrong write key.
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::NetworkError => 1,
            Self::WrongWriteKey => 2,
        }
    }

    /// Whether this state reports a failure.
    pub fn is_error(self) -> bool {
        self != Self::None
    }

    /// Label used in logs and metric attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::NetworkError => "network_error",
            Self::WrongWriteKey => "wrong_write_key",
        }
    }
}

impl From<ErrorState> for i32 {
    fn from(state: ErrorState) -> Self {
        state.code()
    }
}

impl TryFrom<i32> for ErrorState {
    type Error = i32;

    fn try_from(code: i32) -> std::result::Result<Self, i32> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::NetworkError),
            2 => Ok(Self::WrongWriteKey),
            other => Err(other),
        }
    }
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a [`ServerConfigManager`](crate::core::ServerConfigManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Built, worker not started yet.
    Uninitialized,
    /// The fetch-resolve cycle is running.
    Fetching,
    /// The snapshot is available. Terminal.
    Resolved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorState::None.code(), 0);
        assert_eq!(ErrorState::NetworkError.code(), 1);
        assert_eq!(i32::from(ErrorState::WrongWriteKey), 2);

        for code in 0..3 {
            assert_eq!(ErrorState::try_from(code).unwrap().code(), code);
        }
        assert_eq!(ErrorState::try_from(7), Err(7));
    }

    #[test]
    fn test_write_key_validation() {
        assert!(WriteKey::new("1xXCubSHWXbpBI2h6EpCjKOsxmQ").is_ok());
        assert!(WriteKey::new("").is_err());
        assert!(WriteKey::new("   ").is_err());
        assert!(WriteKey::new("abc def").is_err());
        assert!(WriteKey::try_from("abc\n").is_err());
    }

    #[test]
    fn test_write_key_debug_is_redacted() {
        let key = WriteKey::new("supersecretkey").unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("supersecretkey"));
        assert!(debug.starts_with("WriteKey(supe"));
    }
}
