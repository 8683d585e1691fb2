use std::cmp::Ordering;

use super::{ArithOp, Axis, CompareOp, Expr, LocationPath, NodeTest, Step};
use crate::{
  document::{Document, NodeId, NodeKind},
  error::{Result, XsltError},
  output::ResultNode,
};

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  /// Nodes in document order, without duplicates.
  Nodes(Vec<NodeId>),
  String(String),
  Number(f64),
  Boolean(bool),
  /// A result tree fragment built by a variable or parameter body.
  Fragment(Vec<ResultNode>),
}

impl Value {
  #[must_use]
  pub fn to_boolean(&self) -> bool {
    match self {
      Self::Nodes(nodes) => !nodes.is_empty(),
      Self::String(s) => !s.is_empty(),
      Self::Number(n) => *n != 0.0 && !n.is_nan(),
      Self::Boolean(b) => *b,
      Self::Fragment(_) => true,
    }
  }

  #[must_use]
  pub fn to_string_value(&self, doc: &Document) -> String {
    match self {
      Self::Nodes(nodes) => {
        nodes
          .first()
          .map(|&n| doc.string_value(n))
          .unwrap_or_default()
      },
      Self::String(s) => s.clone(),
      Self::Number(n) => format_number(*n),
      Self::Boolean(b) => b.to_string(),
      Self::Fragment(nodes) => {
        nodes.iter().map(ResultNode::text_content).collect()
      },
    }
  }

  #[must_use]
  pub fn to_number(&self, doc: &Document) -> f64 {
    match self {
      Self::Number(n) => *n,
      Self::Boolean(b) => f64::from(u8::from(*b)),
      other => parse_number(&other.to_string_value(doc)),
    }
  }
}

fn parse_number(text: &str) -> f64 {
  let text = text.trim();
  // Rust also accepts exponents, "inf" and "NaN", which XPath numbers do not.
  let valid = !text.is_empty()
    && text
      .strip_prefix('-')
      .unwrap_or(text)
      .chars()
      .all(|c| c.is_ascii_digit() || c == '.')
    && text.matches('.').count() <= 1
    && text.chars().any(|c| c.is_ascii_digit());
  if valid {
    text.parse().unwrap_or(f64::NAN)
  } else {
    f64::NAN
  }
}

/// XPath `round()`: halves round towards positive infinity.
#[must_use]
pub fn round_number(n: f64) -> f64 {
  if n.is_finite() { (n + 0.5).floor() } else { n }
}

/// Format a number the way XPath's `string()` does: integers without a
/// fractional part, `NaN` and `Infinity` spelled out.
#[must_use]
pub fn format_number(n: f64) -> String {
  if n.is_nan() {
    "NaN".to_string()
  } else if n.is_infinite() {
    if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
  } else if n == n.trunc() && n.abs() < 1e15 {
    #[allow(
      clippy::cast_possible_truncation,
      reason = "Range checked against 1e15 above"
    )]
    let whole = n as i64;
    whole.to_string()
  } else {
    n.to_string()
  }
}

/// Variable lookup for expression evaluation.
pub trait Variables {
  fn variable(&self, name: &str) -> Option<&Value>;
}

impl Variables for Vec<(String, Value)> {
  fn variable(&self, name: &str) -> Option<&Value> {
    self.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v)
  }
}

/// The dynamic context of an evaluation.
#[derive(Clone, Copy)]
pub struct Context<'a> {
  pub doc:      &'a Document,
  pub node:     NodeId,
  pub position: usize,
  pub size:     usize,
  /// The node `current()` returns: the node the enclosing instruction is
  /// processing.
  pub current:  NodeId,
  pub vars:     &'a dyn Variables,
}

impl<'a> Context<'a> {
  #[must_use]
  pub fn new(doc: &'a Document, node: NodeId, vars: &'a dyn Variables) -> Self {
    Self {
      doc,
      node,
      position: 1,
      size: 1,
      current: node,
      vars,
    }
  }

  fn at(&self, node: NodeId, position: usize, size: usize) -> Self {
    Self {
      node,
      position,
      size,
      ..*self
    }
  }
}

/// Evaluate an expression.
///
/// # Errors
///
/// Returns an error for unknown variables or functions, wrong argument
/// counts, and location steps applied to values that are not node-sets.
pub fn evaluate(expr: &Expr, ctx: &Context<'_>) -> Result<Value> {
  match expr {
    Expr::Or(lhs, rhs) => {
      Ok(Value::Boolean(
        evaluate(lhs, ctx)?.to_boolean() || evaluate(rhs, ctx)?.to_boolean(),
      ))
    },
    Expr::And(lhs, rhs) => {
      Ok(Value::Boolean(
        evaluate(lhs, ctx)?.to_boolean() && evaluate(rhs, ctx)?.to_boolean(),
      ))
    },
    Expr::Compare(op, lhs, rhs) => {
      let lhs = evaluate(lhs, ctx)?;
      let rhs = evaluate(rhs, ctx)?;
      Ok(Value::Boolean(compare(*op, &lhs, &rhs, ctx.doc)))
    },
    Expr::Arith(op, lhs, rhs) => {
      let lhs = evaluate(lhs, ctx)?.to_number(ctx.doc);
      let rhs = evaluate(rhs, ctx)?.to_number(ctx.doc);
      Ok(Value::Number(match op {
        ArithOp::Add => lhs + rhs,
        ArithOp::Sub => lhs - rhs,
        ArithOp::Mul => lhs * rhs,
        ArithOp::Div => lhs / rhs,
        // Truncating remainder, sign of the dividend.
        ArithOp::Mod => lhs % rhs,
      }))
    },
    Expr::Negate(inner) => {
      Ok(Value::Number(-evaluate(inner, ctx)?.to_number(ctx.doc)))
    },
    Expr::Union(lhs, rhs) => {
      let mut nodes = expect_nodes(evaluate(lhs, ctx)?, "|")?;
      nodes.extend(expect_nodes(evaluate(rhs, ctx)?, "|")?);
      nodes.sort_unstable();
      nodes.dedup();
      Ok(Value::Nodes(nodes))
    },
    Expr::Path(path) => Ok(Value::Nodes(select_path(path, ctx)?)),
    Expr::Filter {
      primary,
      predicates,
      steps,
    } => {
      let mut nodes = expect_nodes(evaluate(primary, ctx)?, "a predicate")?;
      for predicate in predicates {
        nodes = filter(&nodes, predicate, ctx)?;
      }
      for step in steps {
        nodes = apply_step(&nodes, step, ctx)?;
      }
      Ok(Value::Nodes(nodes))
    },
    Expr::Literal(s) => Ok(Value::String(s.clone())),
    Expr::Number(n) => Ok(Value::Number(*n)),
    Expr::Variable(name) => {
      ctx.vars.variable(name).cloned().ok_or_else(|| {
        XsltError::runtime(format!("undefined variable ${name}"))
      })
    },
    Expr::Function { name, args } => call_function(name, args, ctx),
  }
}

fn expect_nodes(value: Value, operation: &str) -> Result<Vec<NodeId>> {
  match value {
    Value::Nodes(nodes) => Ok(nodes),
    other => {
      Err(XsltError::runtime(format!(
        "{operation} requires a node-set, found {other:?}"
      )))
    },
  }
}

/// Select the nodes a location path reaches from the context node.
///
/// # Errors
///
/// Returns an error when a predicate fails to evaluate.
pub fn select_path(
  path: &LocationPath,
  ctx: &Context<'_>,
) -> Result<Vec<NodeId>> {
  let start = if path.absolute {
    ctx.doc.root()
  } else {
    ctx.node
  };
  let mut nodes = vec![start];
  for step in &path.steps {
    nodes = apply_step(&nodes, step, ctx)?;
  }
  Ok(nodes)
}

fn apply_step(
  nodes: &[NodeId],
  step: &Step,
  ctx: &Context<'_>,
) -> Result<Vec<NodeId>> {
  let mut out = Vec::new();
  for &node in nodes {
    let mut candidates: Vec<NodeId> = axis_nodes(ctx.doc, node, step.axis)
      .into_iter()
      .filter(|&n| node_test_matches(ctx.doc, n, step.axis, &step.test))
      .collect();
    for predicate in &step.predicates {
      candidates = filter_along_axis(&candidates, predicate, step.axis, ctx)?;
    }
    out.extend(candidates);
  }
  out.sort_unstable();
  out.dedup();
  Ok(out)
}

/// Nodes along an axis, in document order.
fn axis_nodes(doc: &Document, node: NodeId, axis: Axis) -> Vec<NodeId> {
  match axis {
    Axis::Child => doc.children(node).to_vec(),
    Axis::Attribute => doc.attributes(node).to_vec(),
    Axis::SelfAxis => vec![node],
    Axis::Parent => doc.parent(node).into_iter().collect(),
    Axis::Descendant => doc.descendants(node),
    Axis::DescendantOrSelf => {
      let mut out = vec![node];
      out.extend(doc.descendants(node));
      out
    },
    Axis::Ancestor | Axis::AncestorOrSelf => {
      let mut out = Vec::new();
      if axis == Axis::AncestorOrSelf {
        out.push(node);
      }
      let mut current = doc.parent(node);
      while let Some(parent) = current {
        out.push(parent);
        current = doc.parent(parent);
      }
      out.reverse();
      out
    },
    Axis::FollowingSibling | Axis::PrecedingSibling => {
      if doc.is_attribute(node) {
        return Vec::new();
      }
      let Some(parent) = doc.parent(node) else {
        return Vec::new();
      };
      let siblings = doc.children(parent);
      let Some(index) = siblings.iter().position(|&s| s == node) else {
        return Vec::new();
      };
      if axis == Axis::FollowingSibling {
        siblings[index + 1..].to_vec()
      } else {
        siblings[..index].to_vec()
      }
    },
  }
}

/// Whether `node` passes a node test on the given axis. Name tests and `*`
/// select the principal node type: attributes on the attribute axis,
/// elements everywhere else.
pub(crate) fn node_test_matches(
  doc: &Document,
  node: NodeId,
  axis: Axis,
  test: &NodeTest,
) -> bool {
  let kind = doc.kind(node);
  match test {
    NodeTest::Node => true,
    NodeTest::Text => matches!(kind, NodeKind::Text(_)),
    NodeTest::Comment => matches!(kind, NodeKind::Comment(_)),
    NodeTest::Any => {
      if axis == Axis::Attribute {
        matches!(kind, NodeKind::Attribute { .. })
      } else {
        matches!(kind, NodeKind::Element { .. })
      }
    },
    NodeTest::Name(expected) => {
      match kind {
        NodeKind::Attribute { name, .. } if axis == Axis::Attribute => {
          name == expected
        },
        NodeKind::Element { name } if axis != Axis::Attribute => {
          name == expected
        },
        _ => false,
      }
    },
  }
}

/// Apply a predicate to nodes in document order.
fn filter(
  nodes: &[NodeId],
  predicate: &Expr,
  ctx: &Context<'_>,
) -> Result<Vec<NodeId>> {
  filter_along_axis(nodes, predicate, Axis::Child, ctx)
}

/// Apply a predicate, numbering proximity positions along `axis`.
pub(crate) fn filter_along_axis(
  nodes: &[NodeId],
  predicate: &Expr,
  axis: Axis,
  ctx: &Context<'_>,
) -> Result<Vec<NodeId>> {
  let size = nodes.len();
  let mut out = Vec::with_capacity(size);
  for (index, &node) in nodes.iter().enumerate() {
    let position = if axis.is_reverse() {
      size - index
    } else {
      index + 1
    };
    let value = evaluate(predicate, &ctx.at(node, position, size))?;
    let keep = match value {
      #[allow(
        clippy::cast_precision_loss,
        reason = "Positions are far below 2^52"
      )]
      Value::Number(n) => (n - position as f64).abs() < f64::EPSILON,
      other => other.to_boolean(),
    };
    if keep {
      out.push(node);
    }
  }
  Ok(out)
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value, doc: &Document) -> bool {
  match (lhs, rhs) {
    (Value::Nodes(a), Value::Nodes(b)) => {
      let b_values: Vec<String> =
        b.iter().map(|&n| doc.string_value(n)).collect();
      a.iter().any(|&n| {
        let a_value = doc.string_value(n);
        b_values
          .iter()
          .any(|b_value| compare_strings(op, &a_value, b_value))
      })
    },
    (Value::Nodes(nodes), other) => {
      compare_node_set(op, nodes, other, doc, false)
    },
    (other, Value::Nodes(nodes)) => {
      compare_node_set(op, nodes, other, doc, true)
    },
    _ => compare_atomic(op, lhs, rhs, doc),
  }
}

fn compare_node_set(
  op: CompareOp,
  nodes: &[NodeId],
  other: &Value,
  doc: &Document,
  swapped: bool,
) -> bool {
  if let Value::Boolean(b) = other {
    let set = !nodes.is_empty();
    return if swapped {
      compare_values(op, f64::from(u8::from(*b)), f64::from(u8::from(set)))
    } else {
      compare_values(op, f64::from(u8::from(set)), f64::from(u8::from(*b)))
    };
  }

  nodes.iter().any(|&n| {
    let node_value = Value::String(doc.string_value(n));
    if swapped {
      compare_atomic(op, other, &node_value, doc)
    } else {
      compare_atomic(op, &node_value, other, doc)
    }
  })
}

fn compare_atomic(
  op: CompareOp,
  lhs: &Value,
  rhs: &Value,
  doc: &Document,
) -> bool {
  match op {
    CompareOp::Eq | CompareOp::NotEq => {
      let equal = if matches!(lhs, Value::Boolean(_))
        || matches!(rhs, Value::Boolean(_))
      {
        lhs.to_boolean() == rhs.to_boolean()
      } else if matches!(lhs, Value::Number(_))
        || matches!(rhs, Value::Number(_))
      {
        let (a, b) = (lhs.to_number(doc), rhs.to_number(doc));
        a.partial_cmp(&b) == Some(Ordering::Equal)
      } else {
        lhs.to_string_value(doc) == rhs.to_string_value(doc)
      };
      (op == CompareOp::Eq) == equal
    },
    _ => compare_values(op, lhs.to_number(doc), rhs.to_number(doc)),
  }
}

fn compare_strings(op: CompareOp, a: &str, b: &str) -> bool {
  match op {
    CompareOp::Eq => a == b,
    CompareOp::NotEq => a != b,
    _ => compare_values(op, parse_number(a), parse_number(b)),
  }
}

fn compare_values(op: CompareOp, a: f64, b: f64) -> bool {
  let ordering = a.partial_cmp(&b);
  match op {
    CompareOp::Eq => ordering == Some(Ordering::Equal),
    CompareOp::NotEq => ordering != Some(Ordering::Equal),
    CompareOp::Lt => ordering == Some(Ordering::Less),
    CompareOp::LtEq => {
      matches!(ordering, Some(Ordering::Less | Ordering::Equal))
    },
    CompareOp::Gt => ordering == Some(Ordering::Greater),
    CompareOp::GtEq => {
      matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
    },
  }
}

fn arity(name: &str, args: &[Expr], min: usize, max: usize) -> Result<()> {
  if args.len() < min || args.len() > max {
    return Err(XsltError::runtime(format!(
      "{name}() takes {min}..={max} arguments, {} given",
      args.len()
    )));
  }
  Ok(())
}

/// String argument `index`, or the context node's string-value when absent.
fn string_arg(args: &[Expr], index: usize, ctx: &Context<'_>) -> Result<String> {
  match args.get(index) {
    Some(expr) => Ok(evaluate(expr, ctx)?.to_string_value(ctx.doc)),
    None => Ok(ctx.doc.string_value(ctx.node)),
  }
}

fn number_arg(args: &[Expr], index: usize, ctx: &Context<'_>) -> Result<f64> {
  match args.get(index) {
    Some(expr) => Ok(evaluate(expr, ctx)?.to_number(ctx.doc)),
    None => Ok(parse_number(&ctx.doc.string_value(ctx.node))),
  }
}

/// `substring()` on characters, with positions rounded and compared the way
/// XPath defines, so NaN and infinite bounds select nothing or everything.
fn substring(text: &str, start: f64, length: Option<f64>) -> String {
  let first = round_number(start);
  let end = length.map_or(f64::INFINITY, |len| first + round_number(len));
  text
    .chars()
    .enumerate()
    .filter(|&(index, _)| {
      #[allow(
        clippy::cast_precision_loss,
        reason = "String lengths are far below 2^52"
      )]
      let position = (index + 1) as f64;
      position >= first && position < end
    })
    .map(|(_, c)| c)
    .collect()
}

/// First node of an optional node-set argument, defaulting to the context
/// node.
fn node_arg(
  name: &str,
  args: &[Expr],
  ctx: &Context<'_>,
) -> Result<Option<NodeId>> {
  match args.first() {
    Some(expr) => Ok(expect_nodes(evaluate(expr, ctx)?, name)?.first().copied()),
    None => Ok(Some(ctx.node)),
  }
}

fn call_function(name: &str, args: &[Expr], ctx: &Context<'_>) -> Result<Value> {
  let doc = ctx.doc;
  match name {
    "true" => {
      arity(name, args, 0, 0)?;
      Ok(Value::Boolean(true))
    },
    "false" => {
      arity(name, args, 0, 0)?;
      Ok(Value::Boolean(false))
    },
    "not" => {
      arity(name, args, 1, 1)?;
      Ok(Value::Boolean(!evaluate(&args[0], ctx)?.to_boolean()))
    },
    "boolean" => {
      arity(name, args, 1, 1)?;
      Ok(Value::Boolean(evaluate(&args[0], ctx)?.to_boolean()))
    },
    "string" => {
      arity(name, args, 0, 1)?;
      Ok(Value::String(string_arg(args, 0, ctx)?))
    },
    "number" => {
      arity(name, args, 0, 1)?;
      let value = match args.first() {
        Some(expr) => evaluate(expr, ctx)?.to_number(doc),
        None => parse_number(&doc.string_value(ctx.node)),
      };
      Ok(Value::Number(value))
    },
    "concat" => {
      if args.len() < 2 {
        return Err(XsltError::runtime("concat() takes at least 2 arguments"));
      }
      let mut out = String::new();
      for arg in args {
        out.push_str(&evaluate(arg, ctx)?.to_string_value(doc));
      }
      Ok(Value::String(out))
    },
    "contains" => {
      arity(name, args, 2, 2)?;
      let haystack = string_arg(args, 0, ctx)?;
      let needle = string_arg(args, 1, ctx)?;
      Ok(Value::Boolean(haystack.contains(&needle)))
    },
    "starts-with" => {
      arity(name, args, 2, 2)?;
      let haystack = string_arg(args, 0, ctx)?;
      let needle = string_arg(args, 1, ctx)?;
      Ok(Value::Boolean(haystack.starts_with(&needle)))
    },
    "substring-before" => {
      arity(name, args, 2, 2)?;
      let haystack = string_arg(args, 0, ctx)?;
      let needle = string_arg(args, 1, ctx)?;
      Ok(Value::String(
        haystack
          .split_once(&needle)
          .map(|(before, _)| before.to_string())
          .unwrap_or_default(),
      ))
    },
    "substring-after" => {
      arity(name, args, 2, 2)?;
      let haystack = string_arg(args, 0, ctx)?;
      let needle = string_arg(args, 1, ctx)?;
      Ok(Value::String(
        haystack
          .split_once(&needle)
          .map(|(_, after)| after.to_string())
          .unwrap_or_default(),
      ))
    },
    "substring" => {
      arity(name, args, 2, 3)?;
      let text = string_arg(args, 0, ctx)?;
      let start = number_arg(args, 1, ctx)?;
      let length = args
        .get(2)
        .map(|expr| evaluate(expr, ctx).map(|v| v.to_number(doc)))
        .transpose()?;
      Ok(Value::String(substring(&text, start, length)))
    },
    "normalize-space" => {
      arity(name, args, 0, 1)?;
      let text = string_arg(args, 0, ctx)?;
      Ok(Value::String(
        text.split_whitespace().collect::<Vec<_>>().join(" "),
      ))
    },
    "string-length" => {
      arity(name, args, 0, 1)?;
      #[allow(
        clippy::cast_precision_loss,
        reason = "String lengths are far below 2^52"
      )]
      let length = string_arg(args, 0, ctx)?.chars().count() as f64;
      Ok(Value::Number(length))
    },
    "translate" => {
      arity(name, args, 3, 3)?;
      let text = string_arg(args, 0, ctx)?;
      let from: Vec<char> = string_arg(args, 1, ctx)?.chars().collect();
      let to: Vec<char> = string_arg(args, 2, ctx)?.chars().collect();
      let translated = text
        .chars()
        .filter_map(|c| {
          match from.iter().position(|&f| f == c) {
            Some(index) => to.get(index).copied(),
            None => Some(c),
          }
        })
        .collect();
      Ok(Value::String(translated))
    },
    "count" => {
      arity(name, args, 1, 1)?;
      #[allow(
        clippy::cast_precision_loss,
        reason = "Node counts are far below 2^52"
      )]
      let count = expect_nodes(evaluate(&args[0], ctx)?, name)?.len() as f64;
      Ok(Value::Number(count))
    },
    "sum" => {
      arity(name, args, 1, 1)?;
      let nodes = expect_nodes(evaluate(&args[0], ctx)?, name)?;
      Ok(Value::Number(
        nodes
          .iter()
          .map(|&n| parse_number(&doc.string_value(n)))
          .sum(),
      ))
    },
    "floor" => {
      arity(name, args, 1, 1)?;
      Ok(Value::Number(number_arg(args, 0, ctx)?.floor()))
    },
    "ceiling" => {
      arity(name, args, 1, 1)?;
      Ok(Value::Number(number_arg(args, 0, ctx)?.ceil()))
    },
    "round" => {
      arity(name, args, 1, 1)?;
      Ok(Value::Number(round_number(number_arg(args, 0, ctx)?)))
    },
    "position" => {
      arity(name, args, 0, 0)?;
      #[allow(clippy::cast_precision_loss, reason = "Positions are small")]
      let position = ctx.position as f64;
      Ok(Value::Number(position))
    },
    "last" => {
      arity(name, args, 0, 0)?;
      #[allow(clippy::cast_precision_loss, reason = "Sizes are small")]
      let size = ctx.size as f64;
      Ok(Value::Number(size))
    },
    "name" | "local-name" => {
      arity(name, args, 0, 1)?;
      let node = node_arg(name, args, ctx)?;
      let qualified = node.and_then(|n| doc.name(n)).unwrap_or_default();
      let result = if name == "local-name" {
        qualified
          .split_once(':')
          .map_or(qualified, |(_, local)| local)
      } else {
        qualified
      };
      Ok(Value::String(result.to_string()))
    },
    "namespace-uri" => {
      arity(name, args, 0, 1)?;
      node_arg(name, args, ctx)?;
      Ok(Value::String(String::new()))
    },
    "generate-id" => {
      arity(name, args, 0, 1)?;
      let id = node_arg(name, args, ctx)?
        .map(|n| format!("id{}", n.index()))
        .unwrap_or_default();
      Ok(Value::String(id))
    },
    "current" => {
      arity(name, args, 0, 0)?;
      Ok(Value::Nodes(vec![ctx.current]))
    },
    _ => Err(XsltError::runtime(format!("unknown function {name}()"))),
  }
}
