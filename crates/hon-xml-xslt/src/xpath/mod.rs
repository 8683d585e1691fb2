//! XPath 1.0 expressions for stylesheets: syntax tree, parser and evaluator.
//!
//! The namespace axis, `id()`, `lang()` and processing instructions are not
//! supported.
mod eval;
mod lexer;
mod parser;

pub(crate) use eval::{filter_along_axis, node_test_matches};
pub use eval::{
  Context,
  Value,
  Variables,
  evaluate,
  format_number,
  round_number,
  select_path,
};
pub use parser::parse;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Eq,
  NotEq,
  Lt,
  LtEq,
  Gt,
  GtEq,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
}

/// Navigation axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
  Child,
  Attribute,
  SelfAxis,
  Parent,
  Descendant,
  DescendantOrSelf,
  Ancestor,
  AncestorOrSelf,
  FollowingSibling,
  PrecedingSibling,
}

impl Axis {
  fn from_name(name: &str) -> Option<Self> {
    Some(match name {
      "child" => Self::Child,
      "attribute" => Self::Attribute,
      "self" => Self::SelfAxis,
      "parent" => Self::Parent,
      "descendant" => Self::Descendant,
      "descendant-or-self" => Self::DescendantOrSelf,
      "ancestor" => Self::Ancestor,
      "ancestor-or-self" => Self::AncestorOrSelf,
      "following-sibling" => Self::FollowingSibling,
      "preceding-sibling" => Self::PrecedingSibling,
      _ => return None,
    })
  }

  /// Reverse axes count proximity positions backwards from the context node.
  #[must_use]
  pub const fn is_reverse(self) -> bool {
    matches!(
      self,
      Self::Parent
        | Self::Ancestor
        | Self::AncestorOrSelf
        | Self::PrecedingSibling
    )
  }
}

/// Node tests applied after an axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
  /// A name test against the principal node type of the axis.
  Name(String),
  /// `*`
  Any,
  /// `text()`
  Text,
  /// `node()`
  Node,
  /// `comment()`
  Comment,
}

/// One location step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
  pub axis:       Axis,
  pub test:       NodeTest,
  pub predicates: Vec<Expr>,
}

impl Step {
  /// The step `//` abbreviates.
  #[must_use]
  pub const fn descendant_or_self() -> Self {
    Self {
      axis:       Axis::DescendantOrSelf,
      test:       NodeTest::Node,
      predicates: Vec::new(),
    }
  }

  #[must_use]
  pub fn is_descendant_or_self_abbreviation(&self) -> bool {
    self.axis == Axis::DescendantOrSelf
      && self.test == NodeTest::Node
      && self.predicates.is_empty()
  }
}

/// A location path, absolute when rooted at `/`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
  pub absolute: bool,
  pub steps:    Vec<Step>,
}

/// Expression syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Or(Box<Self>, Box<Self>),
  And(Box<Self>, Box<Self>),
  Compare(CompareOp, Box<Self>, Box<Self>),
  Arith(ArithOp, Box<Self>, Box<Self>),
  Negate(Box<Self>),
  Union(Box<Self>, Box<Self>),
  Path(LocationPath),
  /// A primary expression filtered by predicates and optionally followed by
  /// further steps, as in `$nodes[1]/title`.
  Filter {
    primary:    Box<Self>,
    predicates: Vec<Self>,
    steps:      Vec<Step>,
  },
  Literal(String),
  Number(f64),
  Variable(String),
  Function {
    name: String,
    args: Vec<Self>,
  },
}
