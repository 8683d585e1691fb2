//! Mapping source paths onto the output tree.
use std::{
  ffi::OsString,
  fs,
  path::{Component, Path, PathBuf},
};

use crate::error::PathError;

/// Location of `item_path` relative to `book_root`.
///
/// # Errors
///
/// Returns [`PathError::OutsideRoot`] if the item is not under the root.
pub fn relative_to_root<'a>(
  item_path: &'a Path,
  book_root: &Path,
) -> Result<&'a Path, PathError> {
  item_path
    .strip_prefix(book_root)
    .map_err(|_| PathError::OutsideRoot {
      path: item_path.to_path_buf(),
      root: book_root.to_path_buf(),
    })
}

/// Directory of `item_path` under the book root, mirrored below the output
/// root, without touching the filesystem.
///
/// # Errors
///
/// Returns [`PathError::OutsideRoot`] if the item is not under the root.
pub fn mirrored_dir(
  item_path: &Path,
  book_root: &Path,
  output_root: &Path,
) -> Result<PathBuf, PathError> {
  let relative = relative_to_root(item_path, book_root)?;
  Ok(match relative.parent() {
    Some(parent) => output_root.join(parent),
    None => output_root.to_path_buf(),
  })
}

/// Compute the output directory for `item_path` and create it with its
/// parents. Idempotent.
///
/// # Errors
///
/// Returns an error if the item is outside the book root or the directory
/// cannot be created.
pub fn output_dir_for(
  item_path: &Path,
  book_root: &Path,
  output_root: &Path,
) -> Result<PathBuf, PathError> {
  let dir = mirrored_dir(item_path, book_root, output_root)?;
  fs::create_dir_all(&dir).map_err(|source| {
    PathError::CreateDir {
      path: dir.clone(),
      source,
    }
  })?;
  Ok(dir)
}

/// Output file of a chapter relative to the output root, e.g.
/// `a/b/chapter.xml` for `<book>/a/b/chapter.md`.
///
/// # Errors
///
/// Returns [`PathError::OutsideRoot`] if the item is not under the root.
pub fn relative_output_file(
  item_path: &Path,
  book_root: &Path,
  filename: &str,
  extension: &str,
) -> Result<PathBuf, PathError> {
  let relative = relative_to_root(item_path, book_root)?;
  let file = format!("{filename}.{extension}");
  Ok(match relative.parent() {
    Some(parent) => parent.join(file),
    None => PathBuf::from(file),
  })
}

/// Lexical relative path from `target_dir` back to `output_root`: `.` when
/// they are equal, one `..` per level otherwise.
#[must_use]
pub fn root_relative_path(output_root: &Path, target_dir: &Path) -> PathBuf {
  relative_path(target_dir, output_root)
}

/// Lexical relative path leading from the directory `from_dir` to `to`.
///
/// Neither path has to exist. `.` components are ignored and `..` cancels
/// the preceding component.
#[must_use]
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
  let from = normalize(from_dir);
  let to = normalize(to);

  let common = from
    .iter()
    .zip(&to)
    .take_while(|(left, right)| left == right)
    .count();

  let mut result = PathBuf::new();
  for _ in common..from.len() {
    result.push("..");
  }
  for component in &to[common..] {
    result.push(component.as_os_str());
  }

  if result.as_os_str().is_empty() {
    PathBuf::from(".")
  } else {
    result
  }
}

fn normalize(path: &Path) -> Vec<Component<'_>> {
  let mut components: Vec<Component<'_>> = Vec::new();
  for component in path.components() {
    match component {
      Component::CurDir => {},
      Component::ParentDir => {
        match components.last() {
          Some(Component::Normal(_)) => {
            components.pop();
          },
          Some(Component::RootDir | Component::Prefix(_)) => {},
          _ => components.push(component),
        }
      },
      _ => components.push(component),
    }
  }
  components
}

/// Join the components of a relative path with `/`, the separator used in
/// template links.
#[must_use]
pub fn to_slash(path: &Path) -> String {
  path
    .components()
    .map(|component| component.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

/// Write `contents` to a temporary sibling of `path` and rename it into
/// place, so readers never observe a partially written file.
///
/// # Errors
///
/// Returns [`PathError::Write`] if writing or renaming fails. The temporary
/// file is removed on failure.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), PathError> {
  let mut tmp_name = path
    .file_name()
    .map_or_else(OsString::new, ToOwned::to_owned);
  tmp_name.push(".tmp");
  let tmp_path = path.with_file_name(tmp_name);

  let written = fs::write(&tmp_path, contents)
    .and_then(|()| fs::rename(&tmp_path, path));
  if let Err(source) = written {
    if tmp_path.exists()
      && let Err(e) = fs::remove_file(&tmp_path)
    {
      log::warn!(
        "Failed to remove temporary file {}: {e}",
        tmp_path.display()
      );
    }
    return Err(PathError::Write {
      path: path.to_path_buf(),
      source,
    });
  }
  Ok(())
}
