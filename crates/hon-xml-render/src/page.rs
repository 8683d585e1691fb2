//! Page assembly: markdown source to a full `page.xhtml` document.
use std::path::Path;

use hon_xml_templates::PAGE_TEMPLATE_NAME;
use serde_json::{Map, Value, json};
use tera::Tera;

use crate::{
  book::Chapter,
  context::RenderingContext,
  error::{RenderError, Result},
  graph::{ChapterGraph, GraphNode},
  markdown,
  paths,
};

/// Render a page's markdown into a content fragment.
///
/// The fragment is rendered once more as a one-off template with the data
/// `{ book: {} }`, so authored content may use template directives. Returns
/// `None` when the source is blank.
///
/// # Errors
///
/// Returns an error if the fragment is not a valid template.
pub fn render_content(page: &Chapter) -> Result<Option<String>> {
  let Some(fragment) = markdown::render_fragment(&page.raw_text) else {
    return Ok(None);
  };

  let mut context = tera::Context::new();
  context.insert("book", &Map::new());
  Tera::one_off(&fragment, &context, false)
    .map(Some)
    .map_err(|e| RenderError::template(&format!("content of {}", page.name), e))
}

fn chapter_link(node: &GraphNode, book_root: &Path) -> Result<Value> {
  let chapter = node.chapter();
  let href =
    paths::relative_output_file(&chapter.path, book_root, &chapter.filename, "xml")?;
  Ok(json!({
    "title": chapter.name,
    "filename": chapter.filename,
    "href": paths::to_slash(&href),
  }))
}

/// Assemble the full page document of `page` and store it in `page.text`.
///
/// Pages with blank source are left untouched.
///
/// # Errors
///
/// Returns an error if the page is missing from `graph`, lies outside
/// `book_root`, or a template fails to render.
pub fn assemble_page(
  page: &mut Chapter,
  book_root: &Path,
  graph: &ChapterGraph,
  context: &RenderingContext,
) -> Result<()> {
  let Some(content) = render_content(page)? else {
    log::debug!("Skipping empty page {}", page.path.display());
    return Ok(());
  };

  let page_dir = paths::mirrored_dir(&page.path, book_root, context.path())?;
  let root_path = paths::root_relative_path(context.path(), &page_dir);

  let node = graph.lookup(page)?;
  let previous_chapter = graph
    .previous(node)
    .map(|n| chapter_link(n, book_root))
    .transpose()?;
  let next_chapter = graph
    .next(node)
    .map(|n| chapter_link(n, book_root))
    .transpose()?;

  let mut data = Map::new();
  data.insert(
    "page".to_string(),
    json!({
      "title": page.name,
      "content": content,
      "root_path": paths::to_slash(&root_path),
      "previous_chapter": previous_chapter,
      "next_chapter": next_chapter,
    }),
  );

  page.text = Some(context.render(PAGE_TEMPLATE_NAME, data)?);
  log::debug!("Assembled page {}", page.path.display());
  Ok(())
}
