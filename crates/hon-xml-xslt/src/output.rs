//! Result trees and their serialisation.
use std::{borrow::Cow, fmt};

use html_escape::{encode_double_quoted_attribute, encode_text};

/// A node of the tree a transform produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultNode {
  Element {
    name:       String,
    attributes: Vec<(String, String)>,
    children:   Vec<Self>,
  },
  Text(String),
  Comment(String),
}

impl ResultNode {
  /// Concatenated text of this node and its descendants. Comments contribute
  /// nothing.
  #[must_use]
  pub fn text_content(&self) -> String {
    match self {
      Self::Element { children, .. } => {
        children.iter().map(Self::text_content).collect()
      },
      Self::Text(text) => text.clone(),
      Self::Comment(_) => String::new(),
    }
  }
}

/// Output method declared by `xsl:output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMethod {
  #[default]
  Xml,
  Html,
  Text,
}

/// Serialisation settings declared by `xsl:output`. Output is always
/// UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSettings {
  pub method:               OutputMethod,
  pub indent:               bool,
  pub omit_xml_declaration: bool,
}

/// Elements the HTML output method writes without an end tag.
const HTML_VOID_ELEMENTS: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
  "source", "track", "wbr",
];

/// The result of applying a stylesheet: a result tree plus the settings it
/// is serialised with. `Display` produces the serialised document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
  pub nodes:    Vec<ResultNode>,
  pub settings: OutputSettings,
}

impl TransformOutput {
  #[must_use]
  pub fn serialize(&self) -> String {
    serialize(&self.nodes, &self.settings)
  }
}

impl fmt::Display for TransformOutput {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.serialize())
  }
}

/// Serialise a result tree.
///
/// The XML method writes a declaration unless omitted and ends the document
/// with a newline. Indentation only touches elements whose children are all
/// elements, so mixed content is never altered. Characters XML 1.0 does not
/// allow are dropped, and namespace declarations an ancestor already made
/// are not repeated.
#[must_use]
pub fn serialize(nodes: &[ResultNode], settings: &OutputSettings) -> String {
  let mut out = String::new();
  match settings.method {
    OutputMethod::Text => {
      for node in nodes {
        out.push_str(&xml_chars(&node.text_content()));
      }
      return out;
    },
    OutputMethod::Xml => {
      if !settings.omit_xml_declaration {
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
      }
    },
    OutputMethod::Html => {},
  }

  let mut namespaces = Vec::new();
  for node in nodes {
    write_node(&mut out, node, settings, 0, &mut namespaces);
    if settings.indent && !matches!(node, ResultNode::Text(_)) {
      out.push('\n');
    }
  }
  if !out.ends_with('\n') && !nodes.is_empty() {
    out.push('\n');
  }
  out
}

/// Whether `c` may appear in an XML 1.0 document.
const fn is_xml_char(c: char) -> bool {
  matches!(
    c,
    '\t'
      | '\n'
      | '\r'
      | '\u{20}'..='\u{D7FF}'
      | '\u{E000}'..='\u{FFFD}'
      | '\u{10000}'..='\u{10FFFF}'
  )
}

/// `text` without the characters XML 1.0 forbids, such as most C0 controls.
fn xml_chars(text: &str) -> Cow<'_, str> {
  if text.chars().all(is_xml_char) {
    Cow::Borrowed(text)
  } else {
    Cow::Owned(text.chars().filter(|&c| is_xml_char(c)).collect())
  }
}

/// Comment text that cannot end the comment early: `--` is split and a
/// trailing `-` is padded.
fn comment_text(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in xml_chars(text).chars() {
    if c == '-' && out.ends_with('-') {
      out.push(' ');
    }
    out.push(c);
  }
  if out.ends_with('-') {
    out.push(' ');
  }
  out
}

fn write_node(
  out: &mut String,
  node: &ResultNode,
  settings: &OutputSettings,
  depth: usize,
  namespaces: &mut Vec<(String, String)>,
) {
  match node {
    ResultNode::Text(text) => out.push_str(&encode_text(&xml_chars(text))),
    ResultNode::Comment(text) => {
      out.push_str("<!--");
      out.push_str(&comment_text(text));
      out.push_str("-->");
    },
    ResultNode::Element {
      name,
      attributes,
      children,
    } => {
      let mark = namespaces.len();
      out.push('<');
      out.push_str(name);
      for (key, value) in attributes {
        if key == "xmlns" || key.starts_with("xmlns:") {
          let in_scope = namespaces.iter().rev().find(|(k, _)| k == key);
          if in_scope.is_some_and(|(_, uri)| uri == value) {
            continue;
          }
          namespaces.push((key.clone(), value.clone()));
        }
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&encode_double_quoted_attribute(&xml_chars(value)));
        out.push('"');
      }

      let html = settings.method == OutputMethod::Html;
      if children.is_empty() {
        if html {
          out.push('>');
          if !HTML_VOID_ELEMENTS.contains(&name.as_str()) {
            out.push_str("</");
            out.push_str(name);
            out.push('>');
          }
        } else {
          out.push_str("/>");
        }
        namespaces.truncate(mark);
        return;
      }
      out.push('>');

      let indent_children = settings.indent
        && children
          .iter()
          .all(|c| matches!(c, ResultNode::Element { .. }));
      for child in children {
        if indent_children {
          out.push('\n');
          out.push_str(&"  ".repeat(depth + 1));
        }
        write_node(out, child, settings, depth + 1, namespaces);
      }
      if indent_children {
        out.push('\n');
        out.push_str(&"  ".repeat(depth));
      }
      out.push_str("</");
      out.push_str(name);
      out.push('>');
      namespaces.truncate(mark);
    },
  }
}
