//! Building a [`Book`] from a directory of markdown files.
//!
//! Every `*.md` file is a chapter. A subdirectory is a chapter whose page is
//! its `README.md` (or `index.md`) and whose children are the remaining
//! entries. The book root's own `README.md` / `index.md` becomes the first
//! top-level chapter. Entries are visited sorted by file name.
use std::{
  fs,
  io,
  path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::{
  book::{Book, Chapter},
  error::{RenderError, Result},
  markdown,
};

const INDEX_FILES: &[&str] = &["README.md", "index.md"];

/// Discover the book rooted at `input_dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a file cannot be
/// read.
pub fn discover(input_dir: &Path) -> Result<Book> {
  if !input_dir.is_dir() {
    return Err(RenderError::Read {
      path:   input_dir.to_path_buf(),
      source: io::Error::new(io::ErrorKind::NotFound, "not a directory"),
    });
  }

  let mut chapters = Vec::new();
  let index = find_index(input_dir);
  if let Some(ref index) = index {
    let stem = file_stem(index);
    chapters.push(load_chapter(index, &stem)?);
  }
  chapters.extend(discover_dir(input_dir, index.as_deref())?);

  let book = Book::new(input_dir, chapters);
  log::info!(
    "Discovered {} chapters in {}",
    book.iter().count(),
    input_dir.display()
  );
  Ok(book)
}

fn find_index(dir: &Path) -> Option<PathBuf> {
  INDEX_FILES
    .iter()
    .map(|name| dir.join(name))
    .find(|path| path.is_file())
}

fn file_stem(path: &Path) -> String {
  path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default()
}

fn is_hidden(path: &Path) -> bool {
  path
    .file_name()
    .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

fn load_chapter(path: &Path, filename: &str) -> Result<Chapter> {
  let raw_text = fs::read_to_string(path).map_err(|source| {
    RenderError::Read {
      path: path.to_path_buf(),
      source,
    }
  })?;
  let name =
    markdown::first_heading(&raw_text).unwrap_or_else(|| filename.to_string());
  Ok(Chapter::new(name, filename, path, raw_text))
}

/// Chapters for the entries of `dir`, skipping `index`, which is the page of
/// `dir` itself.
fn discover_dir(dir: &Path, index: Option<&Path>) -> Result<Vec<Chapter>> {
  let mut chapters = Vec::new();

  for entry in WalkDir::new(dir)
    .min_depth(1)
    .max_depth(1)
    .sort_by_file_name()
  {
    let entry = entry.map_err(|e| {
      RenderError::Read {
        path:   dir.to_path_buf(),
        source: e.into(),
      }
    })?;
    let path = entry.path();
    if is_hidden(path) || Some(path) == index {
      continue;
    }

    if entry.file_type().is_dir() {
      if let Some(chapter) = discover_subdir(path)? {
        chapters.push(chapter);
      }
    } else if path.extension().is_some_and(|ext| ext == "md") {
      chapters.push(load_chapter(path, &file_stem(path))?);
    }
  }

  Ok(chapters)
}

fn discover_subdir(dir: &Path) -> Result<Option<Chapter>> {
  let filename = dir
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  let index = find_index(dir);
  let children = discover_dir(dir, index.as_deref())?;

  let chapter = match index {
    Some(index) => load_chapter(&index, &filename)?,
    None if children.is_empty() => return Ok(None),
    None => {
      Chapter::new(
        filename.clone(),
        filename,
        dir.join(INDEX_FILES[1]),
        String::new(),
      )
    },
  };

  Ok(Some(chapter.with_children(children)))
}
