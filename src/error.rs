//! Error types for DOMGuard
//!
//! Policy verdicts are plain booleans and never surface as errors; the types
//! here cover genuine failures, which in practice means DOM constraint
//! markup that cannot be deserialized. Collaborator failures (unparsable
//! pattern alternatives, invalid URLs, missing computed styles) follow the
//! safe-default policy inside the engine and are not reported through
//! `Error`.
//!
//! All errors use the `thiserror` crate for minimal boilerplate and proper
//! error trait implementations.

use thiserror::Error;

/// Result type alias for DOMGuard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for DOMGuard
#[derive(Error, Debug)]
pub enum Error {
  /// DOM constraint markup parsing error
  #[error("Parse error: {0}")]
  Parse(#[from] ParseError),

  /// Generic error for miscellaneous issues
  #[error("{0}")]
  Other(String),
}

/// Errors that occur while deserializing DOM constraint markup
#[derive(Error, Debug, Clone)]
pub enum ParseError {
  /// The serialized constraint HTML could not be parsed
  #[error("Invalid constraint HTML: {message}")]
  InvalidHtml { message: String },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_error_invalid_html() {
    let error = ParseError::InvalidHtml {
      message: "unexpected end of input".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("Invalid constraint HTML"));
    assert!(display.contains("unexpected end of input"));
  }

  #[test]
  fn test_error_from_parse_error() {
    let parse_error = ParseError::InvalidHtml {
      message: "test".to_string(),
    };
    let error: Error = parse_error.into();
    assert!(matches!(error, Error::Parse(_)));
  }

  #[test]
  fn test_error_other() {
    let error = Error::Other("generic failure".to_string());
    assert!(format!("{}", error).contains("generic failure"));
  }

  #[test]
  fn test_error_trait_implemented() {
    let error = Error::Other("test".to_string());
    let _: &dyn std::error::Error = &error;
  }
}
