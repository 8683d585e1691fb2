use std::{io, path::PathBuf};

use thiserror::Error;

/// Error type for stylesheet loading, compilation and execution.
#[derive(Debug, Error)]
pub enum XsltError {
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("Transform definition not found: {}", .0.display())]
  NotFound(PathBuf),

  #[error("Malformed stylesheet XML: {0}")]
  Xml(String),

  #[error("Invalid stylesheet: {0}")]
  Stylesheet(String),

  #[error("Invalid expression '{expression}': {message}")]
  Expression { expression: String, message: String },

  #[error("Invalid pattern '{pattern}': {message}")]
  Pattern { pattern: String, message: String },

  #[error("Transform error: {0}")]
  Runtime(String),

  #[error("Transform terminated by xsl:message: {0}")]
  Terminated(String),
}

impl XsltError {
  pub(crate) fn expression(
    expression: &str,
    message: impl Into<String>,
  ) -> Self {
    Self::Expression {
      expression: expression.to_string(),
      message:    message.into(),
    }
  }

  pub(crate) fn runtime(message: impl Into<String>) -> Self {
    Self::Runtime(message.into())
  }
}

impl From<quick_xml::Error> for XsltError {
  fn from(e: quick_xml::Error) -> Self {
    Self::Xml(e.to_string())
  }
}

/// Result alias for transform operations.
pub type Result<T> = std::result::Result<T, XsltError>;
