//! Serialisable validation outcome
//!
//! Core checks return `Result<_, E>` with a typed error. The HTTP layer and
//! the status report flatten those results into `{ success, message }`.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Flattened result of a validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub success: bool,
    pub message: String,
}

impl Validation {
    /// A successful validation carrying an informational message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed validation carrying the reason
    pub fn fail(reason: impl Display) -> Self {
        Self {
            success: false,
            message: reason.to_string(),
        }
    }

    /// Flatten any validation result
    pub fn from_result<T, E: Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::ok(""),
            Err(e) => Self::fail(e),
        }
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::ok("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result() {
        let ok: Result<(), String> = Ok(());
        assert!(Validation::from_result(&ok).success);

        let err: Result<(), String> = Err("broken".to_string());
        let validation = Validation::from_result(&err);
        assert!(!validation.success);
        assert_eq!(validation.message, "broken");
    }
}
