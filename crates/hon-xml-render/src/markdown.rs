//! CommonMark to markup fragment conversion.
use comrak::{
  Arena,
  nodes::{AstNode, NodeHeading, NodeValue},
  options::Options,
  parse_document,
};

fn comrak_options() -> Options<'static> {
  let mut options = Options::default();
  options.extension.table = true;
  options.extension.footnotes = true;
  options.extension.strikethrough = true;
  options.extension.tasklist = true;
  options.extension.autolink = true;
  options.extension.description_lists = true;
  options.render.r#unsafe = true;
  options
}

/// Convert markdown source into a markup fragment.
///
/// Returns `None` for empty or whitespace-only source.
#[must_use]
pub fn render_fragment(source: &str) -> Option<String> {
  if source.trim().is_empty() {
    return None;
  }

  let arena = Arena::new();
  let options = comrak_options();
  let root = parse_document(&arena, source, &options);

  let mut html = String::new();
  if let Err(e) = comrak::format_html(root, &options, &mut html) {
    log::warn!("Failed to format markdown fragment: {e}");
    return None;
  }
  Some(html)
}

/// Text of the first level-1 heading, if any.
#[must_use]
pub fn first_heading(source: &str) -> Option<String> {
  let arena = Arena::new();
  let options = comrak_options();
  let root = parse_document(&arena, source, &options);

  root.descendants().find_map(|node| {
    match node.data.borrow().value {
      NodeValue::Heading(NodeHeading { level: 1, .. }) => {
        let text = inline_text(node);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
      },
      _ => None,
    }
  })
}

fn inline_text<'a>(node: &'a AstNode<'a>) -> String {
  let mut text = String::new();
  for descendant in node.descendants() {
    match &descendant.data.borrow().value {
      NodeValue::Text(t) => text.push_str(t),
      NodeValue::Code(code) => text.push_str(&code.literal),
      NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
      _ => {},
    }
  }
  text
}
