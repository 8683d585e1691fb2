//! Document order and neighbour links between chapters.
//!
//! The graph is an arena: nodes live in a [`Vec`] in pre-order depth-first
//! order and refer to their neighbours by index. Chapters are identified by
//! their source path and the graph keeps its own copy of the metadata it
//! needs, so it never borrows the book it was built from.
use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use crate::{
  book::{Book, Chapter},
  error::GraphError,
};

/// Chapter metadata recorded in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
  pub name:     String,
  pub filename: String,
  pub path:     PathBuf,
}

impl From<&Chapter> for ChapterRef {
  fn from(chapter: &Chapter) -> Self {
    Self {
      name:     chapter.name.clone(),
      filename: chapter.filename.clone(),
      path:     chapter.path.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
  chapter:  ChapterRef,
  index:    usize,
  previous: Option<usize>,
  next:     Option<usize>,
}

impl GraphNode {
  #[must_use]
  pub const fn chapter(&self) -> &ChapterRef {
    &self.chapter
  }

  /// Position in document order.
  #[must_use]
  pub const fn index(&self) -> usize {
    self.index
  }

  #[must_use]
  pub const fn previous_index(&self) -> Option<usize> {
    self.previous
  }

  #[must_use]
  pub const fn next_index(&self) -> Option<usize> {
    self.next
  }
}

/// Every chapter of a book in document order, with previous/next links.
///
/// Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ChapterGraph {
  nodes: Vec<GraphNode>,
  index: HashMap<PathBuf, usize>,
}

fn flatten(chapters: &[Chapter], out: &mut Vec<ChapterRef>) {
  for chapter in chapters {
    out.push(ChapterRef::from(chapter));
    flatten(&chapter.children, out);
  }
}

impl ChapterGraph {
  /// Flatten the book in pre-order (a chapter, then each child's subtree in
  /// declared order) and link neighbours.
  ///
  /// # Errors
  ///
  /// Returns [`GraphError::DuplicateChapter`] when two chapters share a
  /// source path.
  pub fn build(book: &Book) -> Result<Self, GraphError> {
    let mut chapters = Vec::new();
    flatten(&book.chapters, &mut chapters);

    let count = chapters.len();
    let mut nodes = Vec::with_capacity(count);
    let mut index = HashMap::with_capacity(count);
    for (i, chapter) in chapters.into_iter().enumerate() {
      if index.insert(chapter.path.clone(), i).is_some() {
        return Err(GraphError::DuplicateChapter(chapter.path));
      }
      nodes.push(GraphNode {
        chapter,
        index: i,
        previous: i.checked_sub(1),
        next: (i + 1 < count).then_some(i + 1),
      });
    }

    log::debug!("Built chapter graph with {count} nodes");
    Ok(Self { nodes, index })
  }

  /// Node of `chapter`.
  ///
  /// # Errors
  ///
  /// Returns [`GraphError::NotFound`] if the chapter was not part of the book
  /// the graph was built from.
  pub fn lookup(&self, chapter: &Chapter) -> Result<&GraphNode, GraphError> {
    self.lookup_path(&chapter.path)
  }

  /// Node of the chapter with source path `path`.
  ///
  /// # Errors
  ///
  /// Returns [`GraphError::NotFound`] if no chapter has this path.
  pub fn lookup_path(&self, path: &Path) -> Result<&GraphNode, GraphError> {
    self
      .index
      .get(path)
      .and_then(|&i| self.nodes.get(i))
      .ok_or_else(|| GraphError::NotFound(path.to_path_buf()))
  }

  #[must_use]
  pub fn previous(&self, node: &GraphNode) -> Option<&GraphNode> {
    node.previous.and_then(|i| self.nodes.get(i))
  }

  #[must_use]
  pub fn next(&self, node: &GraphNode) -> Option<&GraphNode> {
    node.next.and_then(|i| self.nodes.get(i))
  }

  /// The only node without a previous one.
  #[must_use]
  pub fn first(&self) -> Option<&GraphNode> {
    self.nodes.first()
  }

  /// Nodes in document order.
  pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
    self.nodes.iter()
  }

  #[must_use]
  pub const fn len(&self) -> usize {
    self.nodes.len()
  }

  #[must_use]
  pub const fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use super::*;

  fn chapter(name: &str) -> Chapter {
    Chapter::new(name, name, format!("/book/{name}.md"), "")
  }

  fn names(graph: &ChapterGraph) -> Vec<&str> {
    graph.iter().map(|n| n.chapter().name.as_str()).collect()
  }

  #[test]
  fn linear_book_keeps_declared_order() {
    let book = Book::new("/book", vec![
      chapter("a"),
      chapter("b"),
      chapter("c"),
    ]);
    let graph = ChapterGraph::build(&book).unwrap();
    assert_eq!(names(&graph), ["a", "b", "c"]);

    let a = graph.lookup(&book.chapters[0]).unwrap();
    let b = graph.lookup(&book.chapters[1]).unwrap();
    let c = graph.lookup(&book.chapters[2]).unwrap();
    assert_eq!(graph.previous(a), None);
    assert_eq!(graph.next(a), Some(b));
    assert_eq!(graph.previous(b), Some(a));
    assert_eq!(graph.next(b), Some(c));
    assert_eq!(graph.next(c), None);
  }

  #[test]
  fn nested_book_is_flattened_depth_first() {
    let book = Book::new("/book", vec![
      chapter("a").with_children(vec![chapter("a1"), chapter("a2")]),
      chapter("b"),
    ]);
    let graph = ChapterGraph::build(&book).unwrap();
    assert_eq!(names(&graph), ["a", "a1", "a2", "b"]);

    let a2 = graph.lookup(&book.chapters[0].children[1]).unwrap();
    assert_eq!(graph.previous(a2).unwrap().chapter().name, "a1");
    assert_eq!(graph.next(a2).unwrap().chapter().name, "b");
  }

  #[test]
  fn neighbour_links_are_symmetric() {
    let book = Book::new("/book", vec![
      chapter("a").with_children(vec![
        chapter("a1").with_children(vec![chapter("a1x"), chapter("a1y")]),
      ]),
      chapter("b").with_children(vec![chapter("b1")]),
    ]);
    let graph = ChapterGraph::build(&book).unwrap();

    assert_eq!(graph.iter().filter(|n| n.previous_index().is_none()).count(), 1);
    assert_eq!(graph.iter().filter(|n| n.next_index().is_none()).count(), 1);

    for node in graph.iter() {
      if let Some(next) = graph.next(node) {
        assert_eq!(graph.previous(next), Some(node));
      }
      if let Some(previous) = graph.previous(node) {
        assert_eq!(graph.next(previous), Some(node));
      }
    }

    let mut visited = 0;
    let mut current = graph.first();
    while let Some(node) = current {
      assert_eq!(node.index(), visited);
      visited += 1;
      current = graph.next(node);
    }
    assert_eq!(visited, graph.len());
  }

  #[test]
  fn unknown_chapter_is_not_found() {
    let book = Book::new("/book", vec![chapter("a")]);
    let graph = ChapterGraph::build(&book).unwrap();
    let err = graph.lookup(&chapter("stranger")).unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));
  }

  #[test]
  fn duplicate_paths_are_rejected() {
    let book = Book::new("/book", vec![
      chapter("a"),
      chapter("b").with_children(vec![chapter("a")]),
    ]);
    let err = ChapterGraph::build(&book).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateChapter(path) if path == Path::new("/book/a.md")));
  }

  #[test]
  fn empty_book_has_empty_graph() {
    let graph = ChapterGraph::build(&Book::new("/book", Vec::new())).unwrap();
    assert!(graph.is_empty());
    assert!(graph.first().is_none());
  }

  #[test]
  fn graph_is_shareable_across_threads() {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ChapterGraph>();
  }
}
