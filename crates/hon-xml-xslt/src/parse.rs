//! Tolerant markup parsing.
//!
//! Template output is not guaranteed to be well-formed XML, so it is run
//! through an HTML5 tree builder which never rejects input: unclosed tags are
//! closed, stray end tags are dropped and the usual `html` / `head` / `body`
//! skeleton is synthesised when missing. The resulting DOM is then copied into
//! the arena [`Document`] the transform operates on.
use kuchikikiki::{NodeData, NodeRef, parse_html as parse_html_dom};
use tendril::TendrilSink;

use crate::document::{Document, DocumentBuilder};

/// Elements whose whitespace is significant even when blank text is removed.
const PRESERVE_WHITESPACE: &[&str] = &["pre", "textarea", "script", "style"];

/// Options for [`parse_html_with`].
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
  /// Drop text nodes consisting only of whitespace, except inside
  /// preformatted elements.
  pub remove_blank_text: bool,

  /// Keep comment nodes.
  pub keep_comments: bool,
}

impl Default for ParseOptions {
  fn default() -> Self {
    Self {
      remove_blank_text: true,
      keep_comments:     true,
    }
  }
}

/// Parse markup permissively with the default [`ParseOptions`].
#[must_use]
pub fn parse_html(markup: &str) -> Document {
  parse_html_with(markup, ParseOptions::default())
}

/// Parse markup permissively into an intermediate [`Document`].
///
/// This never fails. Element and attribute names are the lowercase local
/// names produced by the HTML tree builder; prefixed attributes keep their
/// prefix (`xlink:href`).
#[must_use]
pub fn parse_html_with(markup: &str, options: ParseOptions) -> Document {
  let dom = parse_html_dom().one(markup);
  let mut builder = DocumentBuilder::new();
  copy_children(&dom, &mut builder, options, false);
  builder.finish()
}

fn copy_children(
  node: &NodeRef,
  builder: &mut DocumentBuilder,
  options: ParseOptions,
  preserve: bool,
) {
  for child in node.children() {
    match child.data() {
      NodeData::Element(element) => {
        let name = element.name.local.to_string();
        let attributes: Vec<(String, String)> = element
          .attributes
          .borrow()
          .map
          .iter()
          .map(|(expanded, attr)| {
            let local = expanded.local.to_string();
            let name = match &attr.prefix {
              Some(prefix) => format!("{prefix}:{local}"),
              None => local,
            };
            (name, attr.value.clone())
          })
          .collect();

        builder.start_element(&name, attributes);
        let preserve_inner =
          preserve || PRESERVE_WHITESPACE.contains(&name.as_str());
        copy_children(&child, builder, options, preserve_inner);
        builder.end_element();
      },
      NodeData::Text(text) => {
        let text = text.borrow();
        if options.remove_blank_text && !preserve && text.trim().is_empty() {
          continue;
        }
        builder.text(&text);
      },
      NodeData::Comment(text) => {
        if options.keep_comments {
          builder.comment(&text.borrow());
        }
      },
      NodeData::DocumentFragment | NodeData::Document(_) => {
        copy_children(&child, builder, options, preserve);
      },
      NodeData::Doctype(_) | NodeData::ProcessingInstruction(_) => {},
    }
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use super::*;
  use crate::document::NodeKind;

  fn element_names(doc: &Document, parent: crate::NodeId) -> Vec<String> {
    doc
      .children(parent)
      .iter()
      .filter_map(|&c| doc.name(c).map(str::to_string))
      .collect()
  }

  #[test]
  fn synthesises_document_skeleton() {
    let doc = parse_html("<p>Hello</p>");
    let html = doc.document_element().unwrap();
    assert_eq!(doc.name(html), Some("html"));
    assert_eq!(element_names(&doc, html), vec!["head", "body"]);
  }

  #[test]
  fn accepts_unbalanced_markup() {
    let doc = parse_html("<body><div><p>one<p>two</span></div></body>");
    let html = doc.document_element().unwrap();
    let body = doc.children(html)[1];
    let div = doc.children(body)[0];
    assert_eq!(element_names(&doc, div), vec!["p", "p"]);
    assert_eq!(doc.string_value(div), "onetwo");
  }

  #[test]
  fn removes_blank_text_outside_pre() {
    let doc = parse_html(
      "<body>\n  <p>a</p>\n  <pre>\n  keep\n</pre>\n</body>",
    );
    let html = doc.document_element().unwrap();
    let body = doc.children(html)[1];
    assert_eq!(doc.children(body).len(), 2);
    let pre = doc.children(body)[1];
    // The HTML tree builder swallows the first newline after <pre>.
    assert_eq!(doc.string_value(pre), "  keep\n");
  }

  #[test]
  fn keeps_blank_text_when_requested() {
    let doc = parse_html_with("<body><p>a</p> <p>b</p></body>", ParseOptions {
      remove_blank_text: false,
      keep_comments:     true,
    });
    let html = doc.document_element().unwrap();
    let body = doc.children(html)[1];
    assert_eq!(doc.children(body).len(), 3);
  }

  #[test]
  fn copies_attributes_and_comments() {
    let doc = parse_html(r#"<body><a href="x.xml" rel="next">n</a><!-- c --></body>"#);
    let html = doc.document_element().unwrap();
    let body = doc.children(html)[1];
    let a = doc.children(body)[0];
    assert_eq!(doc.attribute(a, "href"), Some("x.xml"));
    assert_eq!(doc.attribute(a, "rel"), Some("next"));
    let comment = doc.children(body)[1];
    assert_eq!(doc.kind(comment), &NodeKind::Comment(" c ".to_string()));
  }
}
