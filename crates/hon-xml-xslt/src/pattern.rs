//! Template match patterns.
//!
//! A pattern is a union of location path patterns restricted to the `child`
//! and `attribute` axes. Matching walks a path right to left: the last step
//! must match the candidate node, each earlier step must match its parent
//! (after `/`) or some ancestor (after `//`).
use crate::{
  document::NodeId,
  error::{Result, XsltError},
  xpath::{
    self,
    Axis,
    Context,
    Expr,
    LocationPath,
    NodeTest,
    Step,
    filter_along_axis,
    node_test_matches,
  },
};

/// How a step attaches to whatever precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
  /// Relative first step: any parent will do.
  Relative,
  /// `/`: the preceding step (or the root) is the parent.
  Parent,
  /// `//`: the preceding step (or the root) is an ancestor.
  Ancestor,
}

#[derive(Debug, Clone, PartialEq)]
struct PatternStep {
  anchor: Anchor,
  step:   Step,
}

/// One alternative of a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
  absolute: bool,
  steps:    Vec<PatternStep>,
}

/// A compiled `match` pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
  source:       String,
  alternatives: Vec<PathPattern>,
}

impl Pattern {
  /// Compile a pattern.
  ///
  /// # Errors
  ///
  /// Returns [`XsltError::Pattern`] when the source is not a valid
  /// expression or uses anything besides paths over `child` and `attribute`.
  pub fn parse(source: &str) -> Result<Self> {
    let invalid = |message: &str| {
      XsltError::Pattern {
        pattern: source.to_string(),
        message: message.to_string(),
      }
    };
    let expr = xpath::parse(source).map_err(|e| invalid(&e.to_string()))?;

    let mut paths = Vec::new();
    flatten_union(expr, &mut paths).map_err(invalid)?;
    let alternatives = paths
      .into_iter()
      .map(|path| PathPattern::from_location_path(path).map_err(invalid))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      source: source.to_string(),
      alternatives,
    })
  }

  #[must_use]
  pub fn source(&self) -> &str {
    &self.source
  }

  #[must_use]
  pub fn alternatives(&self) -> &[PathPattern] {
    &self.alternatives
  }

  /// Whether any alternative matches `node`.
  ///
  /// # Errors
  ///
  /// Propagates predicate evaluation failures.
  pub fn matches(&self, node: NodeId, ctx: &Context<'_>) -> Result<bool> {
    for alternative in &self.alternatives {
      if alternative.matches(node, ctx)? {
        return Ok(true);
      }
    }
    Ok(false)
  }
}

fn flatten_union(
  expr: Expr,
  out: &mut Vec<LocationPath>,
) -> std::result::Result<(), &'static str> {
  match expr {
    Expr::Union(lhs, rhs) => {
      flatten_union(*lhs, out)?;
      flatten_union(*rhs, out)
    },
    Expr::Path(path) => {
      out.push(path);
      Ok(())
    },
    _ => Err("patterns may only contain location paths and '|'"),
  }
}

impl PathPattern {
  fn from_location_path(
    path: LocationPath,
  ) -> std::result::Result<Self, &'static str> {
    let mut steps = Vec::new();
    let mut anchor = if path.absolute {
      Anchor::Parent
    } else {
      Anchor::Relative
    };

    for step in path.steps {
      if step.is_descendant_or_self_abbreviation() {
        if anchor == Anchor::Ancestor {
          return Err("unexpected '//'");
        }
        anchor = Anchor::Ancestor;
        continue;
      }
      if !matches!(step.axis, Axis::Child | Axis::Attribute) {
        return Err("only the child and attribute axes are allowed");
      }
      steps.push(PatternStep { anchor, step });
      anchor = Anchor::Parent;
    }

    if anchor == Anchor::Ancestor {
      return Err("pattern cannot end with '//'");
    }
    if steps.is_empty() && !path.absolute {
      return Err("empty pattern");
    }
    Ok(Self {
      absolute: path.absolute,
      steps,
    })
  }

  /// The default priority of a template rule with this pattern.
  #[must_use]
  pub fn default_priority(&self) -> f64 {
    match self.steps.as_slice() {
      [only] if only.anchor != Anchor::Ancestor && !self.absolute => {
        if !only.step.predicates.is_empty() {
          return 0.5;
        }
        match &only.step.test {
          NodeTest::Name(name) if name.ends_with(":*") => -0.25,
          NodeTest::Name(_) => 0.0,
          NodeTest::Any | NodeTest::Text | NodeTest::Node | NodeTest::Comment => {
            -0.5
          },
        }
      },
      _ => 0.5,
    }
  }

  /// Whether this alternative matches `node`.
  ///
  /// # Errors
  ///
  /// Propagates predicate evaluation failures.
  pub fn matches(&self, node: NodeId, ctx: &Context<'_>) -> Result<bool> {
    if self.steps.is_empty() {
      return Ok(node == ctx.doc.root());
    }
    self.match_step(self.steps.len() - 1, node, ctx)
  }

  fn match_step(
    &self,
    index: usize,
    node: NodeId,
    ctx: &Context<'_>,
  ) -> Result<bool> {
    let doc = ctx.doc;
    let PatternStep { anchor, step } = &self.steps[index];

    let Some(parent) = doc.parent(node) else {
      return Ok(false);
    };
    let on_attribute_axis = step.axis == Axis::Attribute;
    if doc.is_attribute(node) != on_attribute_axis
      || !node_test_matches(doc, node, step.axis, &step.test)
    {
      return Ok(false);
    }

    if !step.predicates.is_empty() {
      let siblings = if on_attribute_axis {
        doc.attributes(parent)
      } else {
        doc.children(parent)
      };
      let mut candidates: Vec<NodeId> = siblings
        .iter()
        .copied()
        .filter(|&n| node_test_matches(doc, n, step.axis, &step.test))
        .collect();
      for predicate in &step.predicates {
        candidates = filter_along_axis(&candidates, predicate, step.axis, ctx)?;
      }
      if !candidates.contains(&node) {
        return Ok(false);
      }
    }

    if index == 0 {
      return Ok(match anchor {
        Anchor::Parent => !self.absolute || parent == doc.root(),
        Anchor::Relative | Anchor::Ancestor => true,
      });
    }

    match anchor {
      Anchor::Ancestor => {
        let mut current = Some(parent);
        while let Some(ancestor) = current {
          if self.match_step(index - 1, ancestor, ctx)? {
            return Ok(true);
          }
          current = doc.parent(ancestor);
        }
        Ok(false)
      },
      Anchor::Parent | Anchor::Relative => self.match_step(index - 1, parent, ctx),
    }
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use super::*;
  use crate::{
    document::Document,
    parse::parse_html,
    xpath::{Value, select_path},
  };

  fn doc() -> Document {
    parse_html(
      r#"<body><div class="note"><p>one</p></div><p id="x">two</p><ul><li>a</li></ul></body>"#,
    )
  }

  fn first(doc: &Document, path: &str) -> NodeId {
    let vars: Vec<(String, Value)> = Vec::new();
    let ctx = Context::new(doc, doc.root(), &vars);
    let Expr::Path(path) = xpath::parse(path).unwrap() else {
      unreachable!("test paths are location paths");
    };
    select_path(&path, &ctx).unwrap()[0]
  }

  fn matches(doc: &Document, pattern: &str, node: NodeId) -> bool {
    let vars: Vec<(String, Value)> = Vec::new();
    let ctx = Context::new(doc, node, &vars);
    Pattern::parse(pattern).unwrap().matches(node, &ctx).unwrap()
  }

  #[test]
  fn matches_names_and_parents() {
    let doc = doc();
    let nested = first(&doc, "//div/p");
    let top = first(&doc, "/html/body/p");
    assert!(matches(&doc, "p", nested));
    assert!(matches(&doc, "div/p", nested));
    assert!(!matches(&doc, "div/p", top));
    assert!(matches(&doc, "body//p", nested));
    assert!(matches(&doc, "/html/body/p", top));
    assert!(!matches(&doc, "/body/p", top));
    assert!(matches(&doc, "ul | p", top));
  }

  #[test]
  fn root_pattern_matches_only_document() {
    let doc = doc();
    assert!(matches(&doc, "/", doc.root()));
    assert!(!matches(&doc, "/", first(&doc, "/html")));
    assert!(!matches(&doc, "node()", doc.root()));
  }

  #[test]
  fn predicates_and_attributes() {
    let doc = doc();
    let top = first(&doc, "/html/body/p");
    assert!(matches(&doc, "p[@id='x']", top));
    assert!(matches(&doc, "body/*[2]", top));
    assert!(!matches(&doc, "body/*[1]", top));
    let id = first(&doc, "//p/@id");
    assert!(matches(&doc, "@id", id));
    assert!(matches(&doc, "@*", id));
    assert!(!matches(&doc, "*", id));
    assert!(!matches(&doc, "node()", id));
  }

  #[test]
  fn text_nodes() {
    let doc = doc();
    let text = first(&doc, "//li/text()");
    assert!(matches(&doc, "text()", text));
    assert!(matches(&doc, "li/text()", text));
    assert!(matches(&doc, "node()", text));
  }

  #[test]
  fn default_priorities() {
    let priority = |source: &str| {
      Pattern::parse(source).unwrap().alternatives()[0].default_priority()
    };
    assert!((priority("p") - 0.0).abs() < f64::EPSILON);
    assert!((priority("*") + 0.5).abs() < f64::EPSILON);
    assert!((priority("text()") + 0.5).abs() < f64::EPSILON);
    assert!((priority("div/p") - 0.5).abs() < f64::EPSILON);
    assert!((priority("p[1]") - 0.5).abs() < f64::EPSILON);
    assert!((priority("/") - 0.5).abs() < f64::EPSILON);
  }

  #[test]
  fn rejects_non_patterns() {
    assert!(Pattern::parse("ancestor::p").is_err());
    assert!(Pattern::parse("count(p)").is_err());
    assert!(Pattern::parse("p[").is_err());
  }
}
