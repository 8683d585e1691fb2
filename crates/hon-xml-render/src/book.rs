//! The authored content tree.
use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use crate::{error::PathError, paths};

/// One authored page, possibly with nested sub-chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
  /// Display title.
  pub name:     String,
  /// Base name, without extension, used for output files.
  pub filename: String,
  /// Source path; always inside the book root.
  pub path:     PathBuf,
  /// Unrendered markdown source.
  pub raw_text: String,
  /// Sub-chapters in declared order.
  pub children: Vec<Self>,
  /// Assembled page document, set once the page has been rendered.
  pub text:     Option<String>,
}

impl Chapter {
  #[must_use]
  pub fn new(
    name: impl Into<String>,
    filename: impl Into<String>,
    path: impl Into<PathBuf>,
    raw_text: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      filename: filename.into(),
      path: path.into(),
      raw_text: raw_text.into(),
      children: Vec::new(),
      text: None,
    }
  }

  #[must_use]
  pub fn with_children(mut self, children: Vec<Self>) -> Self {
    self.children = children;
    self
  }

  /// Iterate this chapter and its descendants in pre-order.
  #[must_use]
  pub fn iter(&self) -> Chapters<'_> {
    Chapters { stack: vec![self] }
  }

  /// Visit this chapter and its descendants mutably in pre-order, stopping at
  /// the first error.
  ///
  /// # Errors
  ///
  /// Returns the first error produced by `f`.
  pub fn try_walk_mut<E>(
    &mut self,
    f: &mut impl FnMut(&mut Self) -> Result<(), E>,
  ) -> Result<(), E> {
    f(self)?;
    for child in &mut self.children {
      child.try_walk_mut(f)?;
    }
    Ok(())
  }
}

/// Pre-order iterator over a chapter forest.
#[derive(Debug, Clone)]
pub struct Chapters<'a> {
  stack: Vec<&'a Chapter>,
}

impl<'a> Iterator for Chapters<'a> {
  type Item = &'a Chapter;

  fn next(&mut self) -> Option<Self::Item> {
    let chapter = self.stack.pop()?;
    self.stack.extend(chapter.children.iter().rev());
    Some(chapter)
  }
}

/// Root of the authored content tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
  /// Filesystem root every chapter path lives under.
  pub root:     PathBuf,
  /// Top-level chapters in declared order.
  pub chapters: Vec<Chapter>,
}

impl Book {
  #[must_use]
  pub fn new(root: impl Into<PathBuf>, chapters: Vec<Chapter>) -> Self {
    Self {
      root: root.into(),
      chapters,
    }
  }

  #[must_use]
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Iterate every chapter of the book in document order.
  #[must_use]
  pub fn iter(&self) -> Chapters<'_> {
    Chapters {
      stack: self.chapters.iter().rev().collect(),
    }
  }

  /// Visit every chapter mutably in document order, stopping at the first
  /// error.
  ///
  /// # Errors
  ///
  /// Returns the first error produced by `f`.
  pub fn try_walk_mut<E>(
    &mut self,
    mut f: impl FnMut(&mut Chapter) -> Result<(), E>,
  ) -> Result<(), E> {
    for chapter in &mut self.chapters {
      chapter.try_walk_mut(&mut f)?;
    }
    Ok(())
  }

  /// Check that every chapter's source path lies under the book root and
  /// maps to an output file of its own.
  ///
  /// # Errors
  ///
  /// Returns [`PathError::OutsideRoot`] for the first chapter outside it, or
  /// [`PathError::DuplicateOutput`] when two chapters would be written to the
  /// same output file, e.g. `guide/README.md` and `guide/guide.md`.
  pub fn validate(&self) -> Result<(), PathError> {
    let mut outputs: HashMap<PathBuf, &Path> = HashMap::new();
    for chapter in self.iter() {
      let output = paths::relative_output_file(
        &chapter.path,
        &self.root,
        &chapter.filename,
        "xml",
      )?;
      if let Some(first) = outputs.get(&output) {
        return Err(PathError::DuplicateOutput {
          output,
          first: first.to_path_buf(),
          second: chapter.path.clone(),
        });
      }
      outputs.insert(output, &chapter.path);
    }
    Ok(())
  }
}
