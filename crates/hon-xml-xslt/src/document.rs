//! Arena-backed intermediate document.
//!
//! Nodes are stored in a flat vector and addressed by [`NodeId`]. Documents
//! are only ever built through [`DocumentBuilder`], which creates nodes in
//! pre-order (element, then its attributes, then its children), so comparing
//! two ids is the same as comparing their document order.

/// Index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
  #[must_use]
  pub const fn index(self) -> usize {
    self.0
  }
}

/// The kind and payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
  Document,
  Element { name: String },
  Attribute { name: String, value: String },
  Text(String),
  Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
  kind:       NodeKind,
  parent:     Option<NodeId>,
  children:   Vec<NodeId>,
  attributes: Vec<NodeId>,
}

impl Node {
  const fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
    Self {
      kind,
      parent,
      children: Vec::new(),
      attributes: Vec::new(),
    }
  }
}

/// A parsed structural document.
#[derive(Debug, Clone)]
pub struct Document {
  nodes: Vec<Node>,
}

impl Document {
  /// The document node. Always present.
  #[must_use]
  pub const fn root(&self) -> NodeId {
    NodeId(0)
  }

  /// Number of nodes, attributes included.
  #[must_use]
  pub const fn len(&self) -> usize {
    self.nodes.len()
  }

  /// Whether the document holds nothing but its root node.
  #[must_use]
  pub const fn is_empty(&self) -> bool {
    self.nodes.len() <= 1
  }

  /// Every node in document order, attributes included.
  pub fn nodes(
    &self,
  ) -> impl DoubleEndedIterator<Item = NodeId> + ExactSizeIterator {
    (0..self.nodes.len()).map(NodeId)
  }

  #[must_use]
  pub fn kind(&self, id: NodeId) -> &NodeKind {
    &self.nodes[id.0].kind
  }

  #[must_use]
  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.nodes[id.0].parent
  }

  #[must_use]
  pub fn children(&self, id: NodeId) -> &[NodeId] {
    &self.nodes[id.0].children
  }

  #[must_use]
  pub fn attributes(&self, id: NodeId) -> &[NodeId] {
    &self.nodes[id.0].attributes
  }

  /// Element or attribute name, `None` for every other node kind.
  #[must_use]
  pub fn name(&self, id: NodeId) -> Option<&str> {
    match self.kind(id) {
      NodeKind::Element { name } | NodeKind::Attribute { name, .. } => {
        Some(name)
      },
      _ => None,
    }
  }

  #[must_use]
  pub fn is_element(&self, id: NodeId) -> bool {
    matches!(self.kind(id), NodeKind::Element { .. })
  }

  #[must_use]
  pub fn is_attribute(&self, id: NodeId) -> bool {
    matches!(self.kind(id), NodeKind::Attribute { .. })
  }

  /// Value of the named attribute on an element.
  #[must_use]
  pub fn attribute(&self, element: NodeId, name: &str) -> Option<&str> {
    self.attributes(element).iter().find_map(|&attr| {
      match self.kind(attr) {
        NodeKind::Attribute { name: n, value } if n == name => {
          Some(value.as_str())
        },
        _ => None,
      }
    })
  }

  /// The first element child of the document node.
  #[must_use]
  pub fn document_element(&self) -> Option<NodeId> {
    self
      .children(self.root())
      .iter()
      .copied()
      .find(|&id| self.is_element(id))
  }

  /// XPath string-value of a node: the concatenated text of all descendant
  /// text nodes for documents and elements, the node's own value otherwise.
  #[must_use]
  pub fn string_value(&self, id: NodeId) -> String {
    match self.kind(id) {
      NodeKind::Document | NodeKind::Element { .. } => {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
      },
      NodeKind::Attribute { value, .. } => value.clone(),
      NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
    }
  }

  fn collect_text(&self, id: NodeId, out: &mut String) {
    for &child in self.children(id) {
      match self.kind(child) {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Element { .. } => self.collect_text(child, out),
        _ => {},
      }
    }
  }

  /// All descendants of `id` in document order, attributes excluded.
  #[must_use]
  pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.push_descendants(id, &mut out);
    out
  }

  fn push_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
    for &child in self.children(id) {
      out.push(child);
      self.push_descendants(child, out);
    }
  }

  /// Rebuild the document without whitespace-only text nodes whose parent
  /// element satisfies `strip`.
  #[must_use]
  pub fn without_whitespace<F>(&self, strip: F) -> Self
  where
    F: Fn(&str) -> bool,
  {
    let mut builder = DocumentBuilder::new();
    self.copy_children(self.root(), &mut builder, &strip);
    builder.finish()
  }

  fn copy_children<F>(
    &self,
    parent: NodeId,
    builder: &mut DocumentBuilder,
    strip: &F,
  ) where
    F: Fn(&str) -> bool,
  {
    let strip_here = self.name(parent).is_some_and(strip);
    for &child in self.children(parent) {
      match self.kind(child) {
        NodeKind::Element { name } => {
          let attributes = self.attributes(child).iter().filter_map(|&a| {
            match self.kind(a) {
              NodeKind::Attribute { name, value } => {
                Some((name.clone(), value.clone()))
              },
              _ => None,
            }
          });
          builder.start_element(name, attributes);
          self.copy_children(child, builder, strip);
          builder.end_element();
        },
        NodeKind::Text(text) => {
          if !(strip_here && text.trim().is_empty()) {
            builder.text(text);
          }
        },
        NodeKind::Comment(text) => builder.comment(text),
        NodeKind::Document | NodeKind::Attribute { .. } => {},
      }
    }
  }
}

/// Builds a [`Document`] in document order.
///
/// Calls mirror a SAX stream: `start_element` / `end_element` pairs with text
/// and comments in between. Unbalanced `end_element` calls are ignored and
/// elements still open at [`DocumentBuilder::finish`] are closed implicitly.
#[derive(Debug)]
pub struct DocumentBuilder {
  nodes: Vec<Node>,
  stack: Vec<NodeId>,
}

impl Default for DocumentBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl DocumentBuilder {
  #[must_use]
  pub fn new() -> Self {
    Self {
      nodes: vec![Node::new(NodeKind::Document, None)],
      stack: vec![NodeId(0)],
    }
  }

  fn current(&self) -> NodeId {
    self.stack.last().copied().unwrap_or(NodeId(0))
  }

  fn push(&mut self, kind: NodeKind) -> NodeId {
    let parent = self.current();
    let id = NodeId(self.nodes.len());
    self.nodes.push(Node::new(kind, Some(parent)));
    id
  }

  /// Open an element with its attributes. Later attributes replace earlier
  /// ones with the same name.
  pub fn start_element<I>(&mut self, name: &str, attributes: I) -> NodeId
  where
    I: IntoIterator<Item = (String, String)>,
  {
    let id = self.push(NodeKind::Element {
      name: name.to_string(),
    });
    let parent = self.current();
    self.nodes[parent.0].children.push(id);
    self.stack.push(id);

    for (name, value) in attributes {
      let existing = self.nodes[id.0].attributes.iter().copied().find(|a| {
        matches!(&self.nodes[a.0].kind, NodeKind::Attribute { name: n, .. } if *n == name)
      });
      if let Some(attr) = existing {
        self.nodes[attr.0].kind = NodeKind::Attribute { name, value };
      } else {
        let attr = NodeId(self.nodes.len());
        self
          .nodes
          .push(Node::new(NodeKind::Attribute { name, value }, Some(id)));
        self.nodes[id.0].attributes.push(attr);
      }
    }
    id
  }

  pub fn end_element(&mut self) {
    if self.stack.len() > 1 {
      self.stack.pop();
    }
  }

  /// Append text to the current element, merging with a preceding text node.
  pub fn text(&mut self, text: &str) {
    if text.is_empty() {
      return;
    }
    let parent = self.current();
    if let Some(&last) = self.nodes[parent.0].children.last()
      && let NodeKind::Text(existing) = &mut self.nodes[last.0].kind
    {
      existing.push_str(text);
      return;
    }
    let id = self.push(NodeKind::Text(text.to_string()));
    self.nodes[parent.0].children.push(id);
  }

  pub fn comment(&mut self, text: &str) {
    let parent = self.current();
    let id = self.push(NodeKind::Comment(text.to_string()));
    self.nodes[parent.0].children.push(id);
  }

  #[must_use]
  pub fn finish(self) -> Document {
    Document { nodes: self.nodes }
  }
}
