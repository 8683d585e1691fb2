use std::path::PathBuf;

use hon_xml_config::Config;

use crate::{
  book::Book,
  chapter::StructuralTransformer,
  context::RenderingContext,
  discovery,
  error::{RenderError, Result},
  graph::ChapterGraph,
  page,
};

/// Outcome of a render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
  /// Pages that had content and were assembled.
  pub pages:   usize,
  /// XML files written, in document order.
  pub outputs: Vec<PathBuf>,
}

/// Drives one render pass over a book: page assembly for every chapter, then
/// the structural transform of every chapter.
#[derive(Debug)]
pub struct Renderer {
  transformer: StructuralTransformer,
  context:     RenderingContext,
}

impl Renderer {
  #[must_use]
  pub const fn new(
    transformer: StructuralTransformer,
    context: RenderingContext,
  ) -> Self {
    Self {
      transformer,
      context,
    }
  }

  /// Set up a renderer for `config`. The stylesheet is loaded first, so a
  /// bad stylesheet path fails before any template work.
  ///
  /// # Errors
  ///
  /// Returns an error if the stylesheet or a template cannot be loaded.
  pub fn from_config(config: &Config) -> Result<Self> {
    let transformer = StructuralTransformer::from_config(config)?;
    let context = RenderingContext::from_config(config)?;
    Ok(Self::new(transformer, context))
  }

  #[must_use]
  pub const fn context(&self) -> &RenderingContext {
    &self.context
  }

  /// Render `book`, filling in each chapter's `text` and writing the XML
  /// tree below the context's output root.
  ///
  /// # Errors
  ///
  /// Returns the first error; chapters after the failing one are not
  /// processed.
  pub fn render(&self, book: &mut Book) -> Result<RenderSummary> {
    book.validate()?;
    let graph = ChapterGraph::build(book)?;
    log::info!(
      "Rendering {} chapters into {}",
      graph.len(),
      self.context.path().display()
    );

    let root = book.root.clone();
    let mut pages = 0;
    book.try_walk_mut(|chapter| {
      page::assemble_page(chapter, &root, &graph, &self.context)?;
      if chapter.text.is_some() {
        pages += 1;
      }
      Ok::<(), RenderError>(())
    })?;

    let outputs = book
      .iter()
      .map(|chapter| {
        self.transformer.render_chapter(chapter, book, &self.context)
      })
      .collect::<Result<Vec<_>>>()?;

    log::info!("Wrote {} XML files", outputs.len());
    Ok(RenderSummary { pages, outputs })
  }
}

/// Discover the book in `config.input_dir` and render it.
///
/// Returns `None` without touching the filesystem when the XML stage is
/// disabled.
///
/// # Errors
///
/// Returns an error if no input directory is configured, the renderer cannot
/// be set up, discovery fails or rendering fails.
pub fn build(config: &Config) -> Result<Option<RenderSummary>> {
  if !config.xml.enabled {
    log::info!("XML rendering is disabled, skipping");
    return Ok(None);
  }

  let input_dir = config.input_dir.as_deref().ok_or_else(|| {
    RenderError::Configuration("No input directory configured".to_string())
  })?;

  let renderer = Renderer::from_config(config)?;
  let mut book = discovery::discover(input_dir)?;
  renderer.render(&mut book).map(Some)
}
