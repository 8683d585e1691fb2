//! Well-formed XML reading for transform definitions.
use quick_xml::{Reader, escape::unescape, events::Event};

use crate::error::{Result, XsltError};

/// An element of a stylesheet document, with its attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
  pub name:       String,
  pub attributes: Vec<(String, String)>,
  pub children:   Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
  Element(XmlElement),
  Text(String),
}

impl XmlElement {
  #[must_use]
  pub fn attribute(&self, name: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, v)| v.as_str())
  }

  /// Child elements, skipping text.
  pub fn elements(&self) -> impl Iterator<Item = &Self> {
    self.children.iter().filter_map(|child| {
      match child {
        XmlNode::Element(element) => Some(element),
        XmlNode::Text(_) => None,
      }
    })
  }

  /// `xmlns` and `xmlns:*` attributes as (attribute name, URI) pairs.
  pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .attributes
      .iter()
      .filter(|(key, _)| is_namespace_declaration(key))
      .map(|(key, value)| (key.as_str(), value.as_str()))
  }

  /// The prefix part of the element name, if any.
  #[must_use]
  pub fn prefix(&self) -> Option<&str> {
    self.name.split_once(':').map(|(prefix, _)| prefix)
  }

  /// The local part of the element name.
  #[must_use]
  pub fn local_name(&self) -> &str {
    self
      .name
      .split_once(':')
      .map_or(self.name.as_str(), |(_, local)| local)
  }
}

/// Whether an attribute name declares a namespace.
#[must_use]
pub fn is_namespace_declaration(key: &str) -> bool {
  key == "xmlns" || key.starts_with("xmlns:")
}

/// The namespace declaration attribute that binds the prefix of `name`:
/// `xmlns:p` for `p:local`, `xmlns` for an unprefixed name.
#[must_use]
pub fn declaration_for(name: &str) -> String {
  name
    .split_once(':')
    .map_or_else(|| "xmlns".to_string(), |(prefix, _)| format!("xmlns:{prefix}"))
}

fn decode_error(e: impl std::fmt::Display) -> XsltError {
  XsltError::Xml(e.to_string())
}

/// Parse a well-formed XML document and return its document element.
/// Comments, processing instructions and the doctype are discarded; entity
/// and character references are resolved.
///
/// # Errors
///
/// Returns [`XsltError::Xml`] for malformed input, mismatched tags, or a
/// document without exactly one root element.
pub fn parse_document(source: &str) -> Result<XmlElement> {
  let mut reader = Reader::from_str(source);
  let mut stack: Vec<XmlElement> = Vec::new();
  let mut root: Option<XmlElement> = None;

  loop {
    match reader.read_event()? {
      Event::Start(e) => {
        let element = start_element(&reader, &e)?;
        stack.push(element);
      },
      Event::Empty(e) => {
        let element = start_element(&reader, &e)?;
        close_element(element, &mut stack, &mut root)?;
      },
      Event::End(e) => {
        let qname = e.name();
        let name = reader
          .decoder()
          .decode(qname.as_ref())
          .map_err(decode_error)?;
        let element = stack.pop().ok_or_else(|| {
          XsltError::Xml(format!("unexpected closing tag </{name}>"))
        })?;
        if element.name != name {
          return Err(XsltError::Xml(format!(
            "expected </{}>, found </{name}>",
            element.name
          )));
        }
        close_element(element, &mut stack, &mut root)?;
      },
      Event::Text(e) => {
        let text = e.decode().map_err(decode_error)?;
        push_text(&mut stack, &text);
      },
      Event::CData(e) => {
        let text = reader.decoder().decode(&e).map_err(decode_error)?;
        push_text(&mut stack, &text);
      },
      Event::GeneralRef(e) => {
        let name = e.decode().map_err(decode_error)?;
        let entity = format!("&{name};");
        let resolved = unescape(&entity).map_err(decode_error)?;
        push_text(&mut stack, &resolved);
      },
      Event::Eof => break,
      _ => {},
    }
  }

  if let Some(open) = stack.last() {
    return Err(XsltError::Xml(format!("unclosed element <{}>", open.name)));
  }
  root.ok_or_else(|| XsltError::Xml("document has no root element".into()))
}

fn start_element(
  reader: &Reader<&[u8]>,
  e: &quick_xml::events::BytesStart<'_>,
) -> Result<XmlElement> {
  let name = reader
    .decoder()
    .decode(e.name().as_ref())
    .map_err(decode_error)?
    .into_owned();
  let mut attributes = Vec::new();
  for attr in e.attributes() {
    let attr = attr.map_err(decode_error)?;
    let key = reader
      .decoder()
      .decode(attr.key.as_ref())
      .map_err(decode_error)?
      .into_owned();
    let raw = reader.decoder().decode(&attr.value).map_err(decode_error)?;
    let value = unescape(&raw).map_err(decode_error)?.into_owned();
    attributes.push((key, value));
  }
  Ok(XmlElement {
    name,
    attributes,
    children: Vec::new(),
  })
}

fn close_element(
  element: XmlElement,
  stack: &mut [XmlElement],
  root: &mut Option<XmlElement>,
) -> Result<()> {
  if let Some(parent) = stack.last_mut() {
    parent.children.push(XmlNode::Element(element));
    return Ok(());
  }
  if root.is_some() {
    return Err(XsltError::Xml(format!(
      "second root element <{}>",
      element.name
    )));
  }
  *root = Some(element);
  Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) {
  let Some(parent) = stack.last_mut() else {
    return;
  };
  if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
    existing.push_str(text);
  } else {
    parent.children.push(XmlNode::Text(text.to_string()));
  }
}
