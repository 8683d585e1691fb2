use std::{io, path::PathBuf};

use hon_xml_config::ConfigError;
use hon_xml_xslt::XsltError;
use thiserror::Error;

/// Errors raised while mapping source paths onto the output tree.
#[derive(Debug, Error)]
pub enum PathError {
  #[error("{} is not inside the book root {}", path.display(), root.display())]
  OutsideRoot { path: PathBuf, root: PathBuf },

  #[error(
    "Chapters {} and {} both map to the output file {}",
    first.display(),
    second.display(),
    output.display()
  )]
  DuplicateOutput {
    output: PathBuf,
    first:  PathBuf,
    second: PathBuf,
  },

  #[error("Failed to create directory {}: {source}", path.display())]
  CreateDir {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Failed to write {}: {source}", path.display())]
  Write {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Errors raised while building or querying the chapter graph.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("Chapter {} is not part of the book", .0.display())]
  NotFound(PathBuf),

  #[error("Chapter {} appears more than once in the book", .0.display())]
  DuplicateChapter(PathBuf),
}

/// Top-level error type for a render pass.
#[derive(Debug, Error)]
pub enum RenderError {
  #[error("Configuration error: {0}")]
  Configuration(String),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Path(#[from] PathError),

  #[error("Failed to read {}: {source}", path.display())]
  Read {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Template error in {name}: {source}")]
  Template {
    name:   String,
    #[source]
    source: tera::Error,
  },

  #[error("Failed to transform chapter {chapter}: {source}")]
  Transform {
    chapter: String,
    #[source]
    source:  XsltError,
  },
}

impl RenderError {
  pub(crate) fn template(name: &str, source: tera::Error) -> Self {
    Self::Template {
      name: name.to_string(),
      source,
    }
  }
}

/// Result alias for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
