//! Rendering of a book into a tree of XML files.
//!
//! A pass runs in two phases. First every chapter's markdown is assembled
//! into a `page.xhtml` document, with previous/next links taken from the
//! [`ChapterGraph`]. Then every chapter is rendered through `chapter.xhtml`
//! together with its sub-chapters and transformed by the XSLT stylesheet into
//! `<filename>.xml`, mirrored under the output root.
pub mod book;
pub mod chapter;
pub mod context;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod markdown;
pub mod page;
pub mod paths;
pub mod renderer;

pub use book::{Book, Chapter};
pub use chapter::StructuralTransformer;
pub use context::RenderingContext;
pub use error::{GraphError, PathError, RenderError, Result};
pub use graph::ChapterGraph;
pub use renderer::{RenderSummary, Renderer, build};
