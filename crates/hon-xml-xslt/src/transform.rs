//! Stylesheet execution.
use std::{cell::Cell, cmp::Ordering, thread};

use log::{debug, info, warn};

use crate::{
  document::{Document, NodeId, NodeKind},
  error::{Result, XsltError},
  number::format_numbers,
  output::{ResultNode, TransformOutput},
  pattern::Pattern,
  stylesheet::{
    Avt,
    AvtPart,
    Binding,
    BindingValue,
    Instruction,
    NumberLevel,
    SortKey,
    Stylesheet,
  },
  xpath::{
    Context,
    Expr,
    Value,
    Variables,
    evaluate,
    format_number,
    round_number,
  },
};

/// Nesting limit for template invocations, the same as libxslt's default.
/// It stops stylesheets that recurse without end.
const MAX_DEPTH: usize = 3000;

/// Stack for the thread a transform runs on, enough for [`MAX_DEPTH`]
/// nested templates in unoptimised builds.
const TRANSFORM_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Values for a stylesheet's top-level `xsl:param`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
  values: Vec<(String, Value)>,
}

impl Parameters {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Set a parameter, replacing any earlier value with the same name.
  pub fn insert(&mut self, name: impl Into<String>, value: Value) {
    let name = name.into();
    if let Some(slot) = self.values.iter_mut().find(|(n, _)| *n == name) {
      slot.1 = value;
    } else {
      self.values.push((name, value));
    }
  }

  #[must_use]
  pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
    self.insert(name, value);
    self
  }

  #[must_use]
  pub fn get(&self, name: &str) -> Option<&Value> {
    self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.values.iter().map(|(n, v)| (n.as_str(), v))
  }
}

impl Stylesheet {
  /// Apply the stylesheet to a document.
  ///
  /// Parameters the stylesheet does not declare are ignored.
  ///
  /// # Errors
  ///
  /// Returns an error for runtime failures: undefined variables or
  /// functions, unknown named templates, type errors, runaway recursion and
  /// `xsl:message terminate="yes"`.
  pub fn transform(
    &self,
    doc: &Document,
    params: &Parameters,
  ) -> Result<TransformOutput> {
    thread::scope(|scope| {
      thread::Builder::new()
        .name("xslt-transform".to_string())
        .stack_size(TRANSFORM_STACK_SIZE)
        .spawn_scoped(scope, || self.run(doc, params))?
        .join()
        .map_err(|_| XsltError::runtime("transform thread panicked"))?
    })
  }

  fn run(&self, doc: &Document, params: &Parameters) -> Result<TransformOutput> {
    let stripped;
    let doc = if self.strip_space.is_empty() {
      doc
    } else {
      stripped = doc.without_whitespace(|name| self.strips_space(name));
      &stripped
    };

    for (name, _) in params.iter() {
      if !self.parameter_names().any(|declared| declared == name) {
        debug!("Ignoring undeclared stylesheet parameter '{name}'");
      }
    }

    let root = Focus::new(doc.root());
    let mut globals: Vec<(String, Value)> = Vec::new();
    for global in &self.globals {
      let name = &global.binding.name;
      let supplied = global.is_param.then(|| params.get(name)).flatten();
      let value = if let Some(value) = supplied {
        value.clone()
      } else {
        let runtime = Runtime::new(self, doc, &globals);
        let mut scope = Scope::new(&globals);
        runtime.binding_value(&global.binding.value, root, &mut scope)?
      };
      globals.push((name.clone(), value));
    }

    let runtime = Runtime::new(self, doc, &globals);
    let mut out = Frame::default();
    runtime.apply_templates(&[doc.root()], None, &[], &mut out)?;
    for (name, _) in &out.attributes {
      warn!("Attribute '{name}' created outside of any element was dropped");
    }

    Ok(TransformOutput {
      nodes:    out.children,
      settings: self.output.clone(),
    })
  }
}

/// Variables visible to an instruction: template locals shadow globals.
struct Scope<'a> {
  globals: &'a [(String, Value)],
  locals:  Vec<(String, Value)>,
}

impl<'a> Scope<'a> {
  const fn new(globals: &'a [(String, Value)]) -> Self {
    Self {
      globals,
      locals: Vec::new(),
    }
  }
}

impl Variables for Scope<'_> {
  fn variable(&self, name: &str) -> Option<&Value> {
    self
      .locals
      .iter()
      .rev()
      .chain(self.globals.iter().rev())
      .find(|(n, _)| n == name)
      .map(|(_, v)| v)
  }
}

/// The node being processed with its position in the current node list.
#[derive(Debug, Clone, Copy)]
struct Focus {
  node:     NodeId,
  position: usize,
  size:     usize,
}

impl Focus {
  const fn new(node: NodeId) -> Self {
    Self {
      node,
      position: 1,
      size: 1,
    }
  }
}

/// One `xsl:sort` key of a node.
enum SortValue {
  Text(String),
  Number(f64),
}

impl SortValue {
  /// NaN sorts before every number.
  fn compare(&self, other: &Self) -> Ordering {
    match (self, other) {
      (Self::Text(a), Self::Text(b)) => a.cmp(b),
      (Self::Number(a), Self::Number(b)) => {
        match (a.is_nan(), b.is_nan()) {
          (true, true) => Ordering::Equal,
          (true, false) => Ordering::Less,
          (false, true) => Ordering::Greater,
          (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        }
      },
      (Self::Text(_), Self::Number(_)) => Ordering::Less,
      (Self::Number(_), Self::Text(_)) => Ordering::Greater,
    }
  }
}

/// Result content under construction: the attributes and children of the
/// element currently being built.
#[derive(Debug, Default)]
struct Frame {
  attributes: Vec<(String, String)>,
  children:   Vec<ResultNode>,
}

impl Frame {
  fn push_text(&mut self, text: &str) {
    if text.is_empty() {
      return;
    }
    if let Some(ResultNode::Text(existing)) = self.children.last_mut() {
      existing.push_str(text);
    } else {
      self.children.push(ResultNode::Text(text.to_string()));
    }
  }

  fn push(&mut self, node: ResultNode) {
    match node {
      ResultNode::Text(text) => self.push_text(&text),
      other => self.children.push(other),
    }
  }

  fn set_attribute(&mut self, name: String, value: String) {
    if !self.children.is_empty() {
      warn!("Attribute '{name}' added after element content was ignored");
      return;
    }
    if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
      slot.1 = value;
    } else {
      self.attributes.push((name, value));
    }
  }

  fn text_content(&self) -> String {
    self.children.iter().map(ResultNode::text_content).collect()
  }

  fn into_element(self, name: String) -> ResultNode {
    ResultNode::Element {
      name,
      attributes: self.attributes,
      children: self.children,
    }
  }
}

struct Runtime<'a> {
  sheet:   &'a Stylesheet,
  doc:     &'a Document,
  globals: &'a [(String, Value)],
  depth:   Cell<usize>,
}

impl<'a> Runtime<'a> {
  const fn new(
    sheet: &'a Stylesheet,
    doc: &'a Document,
    globals: &'a [(String, Value)],
  ) -> Self {
    Self {
      sheet,
      doc,
      globals,
      depth: Cell::new(0),
    }
  }

  fn context<'c>(&'c self, focus: Focus, scope: &'c Scope<'_>) -> Context<'c> {
    Context {
      doc:      self.doc,
      node:     focus.node,
      position: focus.position,
      size:     focus.size,
      current:  focus.node,
      vars:     scope,
    }
  }

  fn eval(&self, expr: &Expr, focus: Focus, scope: &Scope<'_>) -> Result<Value> {
    evaluate(expr, &self.context(focus, scope))
  }

  fn eval_string(
    &self,
    expr: &Expr,
    focus: Focus,
    scope: &Scope<'_>,
  ) -> Result<String> {
    Ok(self.eval(expr, focus, scope)?.to_string_value(self.doc))
  }

  fn eval_nodes(
    &self,
    expr: &Expr,
    focus: Focus,
    scope: &Scope<'_>,
  ) -> Result<Vec<NodeId>> {
    match self.eval(expr, focus, scope)? {
      Value::Nodes(nodes) => Ok(nodes),
      other => {
        Err(XsltError::runtime(format!(
          "expected a node-set to process, found {other:?}"
        )))
      },
    }
  }

  fn eval_avt(&self, avt: &Avt, focus: Focus, scope: &Scope<'_>) -> Result<String> {
    let mut out = String::new();
    for part in &avt.0 {
      match part {
        AvtPart::Literal(text) => out.push_str(text),
        AvtPart::Expr(expr) => out.push_str(&self.eval_string(expr, focus, scope)?),
      }
    }
    Ok(out)
  }

  fn binding_value(
    &self,
    value: &BindingValue,
    focus: Focus,
    scope: &mut Scope<'_>,
  ) -> Result<Value> {
    match value {
      BindingValue::Select(expr) => self.eval(expr, focus, scope),
      BindingValue::Body(body) => {
        let mut frame = Frame::default();
        self.execute(body, focus, scope, &mut frame)?;
        Ok(Value::Fragment(frame.children))
      },
      BindingValue::Empty => Ok(Value::String(String::new())),
    }
  }

  fn with_params(
    &self,
    bindings: &[Binding],
    focus: Focus,
    scope: &mut Scope<'_>,
  ) -> Result<Vec<(String, Value)>> {
    bindings
      .iter()
      .map(|b| Ok((b.name.clone(), self.binding_value(&b.value, focus, scope)?)))
      .collect()
  }

  fn enter(&self) -> Result<()> {
    let depth = self.depth.get() + 1;
    if depth > MAX_DEPTH {
      return Err(XsltError::runtime(format!(
        "template nesting exceeded {MAX_DEPTH} levels"
      )));
    }
    self.depth.set(depth);
    Ok(())
  }

  fn leave(&self) {
    self.depth.set(self.depth.get().saturating_sub(1));
  }

  fn apply_templates(
    &self,
    nodes: &[NodeId],
    mode: Option<&str>,
    params: &[(String, Value)],
    out: &mut Frame,
  ) -> Result<()> {
    let size = nodes.len();
    for (index, &node) in nodes.iter().enumerate() {
      let focus = Focus {
        node,
        position: index + 1,
        size,
      };
      self.enter()?;
      let result = match self.find_rule(node, mode)? {
        Some(template) => self.invoke(template, focus, params, out),
        None => self.built_in(focus, mode, out),
      };
      self.leave();
      result?;
    }
    Ok(())
  }

  /// The template of the highest-priority matching rule in `mode`; later
  /// rules win ties.
  fn find_rule(&self, node: NodeId, mode: Option<&str>) -> Result<Option<usize>> {
    let scope = Scope::new(self.globals);
    let ctx = self.context(Focus::new(node), &scope);
    let mut best: Option<(f64, usize)> = None;
    for rule in &self.sheet.rules {
      if rule.mode.as_deref() != mode {
        continue;
      }
      if best.is_some_and(|(priority, _)| rule.priority < priority) {
        continue;
      }
      if rule.pattern.matches(node, &ctx)? {
        best = Some((rule.priority, rule.template));
      }
    }
    Ok(best.map(|(_, template)| template))
  }

  fn built_in(&self, focus: Focus, mode: Option<&str>, out: &mut Frame) -> Result<()> {
    match self.doc.kind(focus.node) {
      NodeKind::Document | NodeKind::Element { .. } => {
        let children = self.doc.children(focus.node).to_vec();
        self.apply_templates(&children, mode, &[], out)
      },
      NodeKind::Text(text) => {
        out.push_text(text);
        Ok(())
      },
      NodeKind::Attribute { value, .. } => {
        out.push_text(value);
        Ok(())
      },
      NodeKind::Comment(_) => Ok(()),
    }
  }

  fn invoke(
    &self,
    template: usize,
    focus: Focus,
    params: &[(String, Value)],
    out: &mut Frame,
  ) -> Result<()> {
    let template = &self.sheet.templates[template];
    let mut scope = Scope::new(self.globals);
    for param in &template.params {
      let supplied = params.iter().rev().find(|(n, _)| *n == param.name);
      let value = match supplied {
        Some((_, value)) => value.clone(),
        None => self.binding_value(&param.value, focus, &mut scope)?,
      };
      scope.locals.push((param.name.clone(), value));
    }
    self.execute(&template.body, focus, &mut scope, out)
  }

  fn execute(
    &self,
    body: &[Instruction],
    focus: Focus,
    scope: &mut Scope<'_>,
    out: &mut Frame,
  ) -> Result<()> {
    let mark = scope.locals.len();
    let result = body
      .iter()
      .try_for_each(|instruction| self.instruction(instruction, focus, scope, out));
    scope.locals.truncate(mark);
    result
  }

  fn instruction(
    &self,
    instruction: &Instruction,
    focus: Focus,
    scope: &mut Scope<'_>,
    out: &mut Frame,
  ) -> Result<()> {
    match instruction {
      Instruction::LiteralElement {
        name,
        namespaces,
        attributes,
        body,
      } => {
        let mut frame = Frame {
          attributes: namespaces.clone(),
          ..Frame::default()
        };
        for (key, avt) in attributes {
          frame
            .attributes
            .push((key.clone(), self.eval_avt(avt, focus, scope)?));
        }
        self.execute(body, focus, scope, &mut frame)?;
        out.push(frame.into_element(name.clone()));
      },
      Instruction::Text(text) => out.push_text(text),
      Instruction::ValueOf(expr) => {
        out.push_text(&self.eval_string(expr, focus, scope)?);
      },
      Instruction::ApplyTemplates {
        select,
        mode,
        params,
        sort,
      } => {
        let nodes = match select {
          Some(expr) => self.eval_nodes(expr, focus, scope)?,
          None => self.doc.children(focus.node).to_vec(),
        };
        let nodes = self.sorted(nodes, sort, focus, scope)?;
        let params = self.with_params(params, focus, scope)?;
        self.apply_templates(&nodes, mode.as_deref(), &params, out)?;
      },
      Instruction::CallTemplate { name, params } => {
        let template = *self.sheet.named.get(name).ok_or_else(|| {
          XsltError::runtime(format!("no template named '{name}'"))
        })?;
        let params = self.with_params(params, focus, scope)?;
        self.enter()?;
        let result = self.invoke(template, focus, &params, out);
        self.leave();
        result?;
      },
      Instruction::Copy(body) => self.shallow_copy(body, focus, scope, out)?,
      Instruction::CopyOf(expr) => {
        match self.eval(expr, focus, scope)? {
          Value::Nodes(nodes) => {
            for node in nodes {
              self.deep_copy(node, out);
            }
          },
          Value::Fragment(nodes) => {
            for node in nodes {
              out.push(node);
            }
          },
          other => out.push_text(&other.to_string_value(self.doc)),
        }
      },
      Instruction::Element { name, body } => {
        let name = self.eval_avt(name, focus, scope)?;
        if name.trim().is_empty() {
          return Err(XsltError::runtime("xsl:element produced an empty name"));
        }
        let mut frame = Frame::default();
        self.execute(body, focus, scope, &mut frame)?;
        out.push(frame.into_element(name));
      },
      Instruction::Attribute { name, body } => {
        let name = self.eval_avt(name, focus, scope)?;
        if name.trim().is_empty() {
          return Err(XsltError::runtime("xsl:attribute produced an empty name"));
        }
        let mut frame = Frame::default();
        self.execute(body, focus, scope, &mut frame)?;
        out.set_attribute(name, frame.text_content());
      },
      Instruction::If { test, body } => {
        if self.eval(test, focus, scope)?.to_boolean() {
          self.execute(body, focus, scope, out)?;
        }
      },
      Instruction::Choose {
        branches,
        otherwise,
      } => {
        let mut chosen = otherwise;
        for (test, body) in branches {
          if self.eval(test, focus, scope)?.to_boolean() {
            chosen = body;
            break;
          }
        }
        self.execute(chosen, focus, scope, out)?;
      },
      Instruction::ForEach { select, sort, body } => {
        let nodes = self.eval_nodes(select, focus, scope)?;
        let nodes = self.sorted(nodes, sort, focus, scope)?;
        let size = nodes.len();
        for (index, node) in nodes.into_iter().enumerate() {
          let item = Focus {
            node,
            position: index + 1,
            size,
          };
          self.execute(body, item, scope, out)?;
        }
      },
      Instruction::Number {
        value,
        level,
        count,
        from,
        format,
      } => {
        let format = self.eval_avt(format, focus, scope)?;
        let text = match value {
          Some(expr) => {
            let n = self.eval(expr, focus, scope)?.to_number(self.doc);
            let n = round_number(n);
            if n.is_finite() && n >= 0.0 {
              #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "Checked finite and non-negative above"
              )]
              let n = n as u64;
              format_numbers(&[n], &format)
            } else {
              format_number(n)
            }
          },
          None => {
            let numbers = self.count_position(
              focus.node,
              *level,
              count.as_ref(),
              from.as_ref(),
            )?;
            format_numbers(&numbers, &format)
          },
        };
        out.push_text(&text);
      },
      Instruction::Variable(binding) => {
        let value = self.binding_value(&binding.value, focus, scope)?;
        scope.locals.push((binding.name.clone(), value));
      },
      Instruction::Comment(body) => {
        let mut frame = Frame::default();
        self.execute(body, focus, scope, &mut frame)?;
        out.push(ResultNode::Comment(frame.text_content()));
      },
      Instruction::Message { body, terminate } => {
        let mut frame = Frame::default();
        self.execute(body, focus, scope, &mut frame)?;
        let message = frame.text_content();
        if *terminate {
          return Err(XsltError::Terminated(message));
        }
        info!("xsl:message: {message}");
      },
    }
    Ok(())
  }

  /// Reorder `nodes` by `keys`. The sort is stable and compares the first
  /// key first. Keys see each node with its position in the unsorted list.
  fn sorted(
    &self,
    nodes: Vec<NodeId>,
    keys: &[SortKey],
    focus: Focus,
    scope: &Scope<'_>,
  ) -> Result<Vec<NodeId>> {
    if keys.is_empty() {
      return Ok(nodes);
    }

    let mut specs = Vec::with_capacity(keys.len());
    for key in keys {
      let order = self.eval_avt(&key.order, focus, scope)?;
      let descending = match order.as_str() {
        "ascending" => false,
        "descending" => true,
        other => {
          return Err(XsltError::runtime(format!(
            "xsl:sort order must be ascending or descending, found '{other}'"
          )));
        },
      };
      let data_type = self.eval_avt(&key.data_type, focus, scope)?;
      let numeric = match data_type.as_str() {
        "text" => false,
        "number" => true,
        other => {
          return Err(XsltError::runtime(format!(
            "xsl:sort data-type must be text or number, found '{other}'"
          )));
        },
      };
      specs.push((key, descending, numeric));
    }

    let size = nodes.len();
    let mut rows = Vec::with_capacity(size);
    for (index, node) in nodes.into_iter().enumerate() {
      let item = Focus {
        node,
        position: index + 1,
        size,
      };
      let mut values = Vec::with_capacity(specs.len());
      for &(key, _, numeric) in &specs {
        let value = self.eval(&key.select, item, scope)?;
        values.push(if numeric {
          SortValue::Number(value.to_number(self.doc))
        } else {
          SortValue::Text(value.to_string_value(self.doc))
        });
      }
      rows.push((values, node));
    }

    rows.sort_by(|(a, _), (b, _)| {
      a.iter()
        .zip(b)
        .zip(&specs)
        .map(|((a, b), &(_, descending, _))| {
          let ordering = a.compare(b);
          if descending { ordering.reverse() } else { ordering }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
    });
    Ok(rows.into_iter().map(|(_, node)| node).collect())
  }

  /// Whether `candidate` is counted by `xsl:number`: it matches `count`, or
  /// without one, it has the same kind and name as `node`.
  fn counts(
    &self,
    candidate: NodeId,
    node: NodeId,
    count: Option<&Pattern>,
  ) -> Result<bool> {
    match count {
      Some(pattern) => self.matches(pattern, candidate),
      None => {
        Ok(
          std::mem::discriminant(self.doc.kind(candidate))
            == std::mem::discriminant(self.doc.kind(node))
            && self.doc.name(candidate) == self.doc.name(node),
        )
      },
    }
  }

  fn matches(&self, pattern: &Pattern, node: NodeId) -> Result<bool> {
    let scope = Scope::new(self.globals);
    pattern.matches(node, &self.context(Focus::new(node), &scope))
  }

  /// 1 plus the number of counted preceding siblings.
  fn sibling_number(
    &self,
    target: NodeId,
    node: NodeId,
    count: Option<&Pattern>,
  ) -> Result<u64> {
    let Some(parent) = self.doc.parent(target) else {
      return Ok(1);
    };
    let siblings = if self.doc.is_attribute(target) {
      self.doc.attributes(parent)
    } else {
      self.doc.children(parent)
    };
    let mut number = 1;
    for &sibling in siblings.iter().take_while(|&&s| s != target) {
      if self.counts(sibling, node, count)? {
        number += 1;
      }
    }
    Ok(number)
  }

  /// The numbers `xsl:number` reports for `node` without a `value`.
  fn count_position(
    &self,
    node: NodeId,
    level: NumberLevel,
    count: Option<&Pattern>,
    from: Option<&Pattern>,
  ) -> Result<Vec<u64>> {
    if level == NumberLevel::Any {
      let mut number = 0;
      for candidate in self.doc.nodes().take(node.index() + 1).rev() {
        if let Some(from) = from
          && self.matches(from, candidate)?
        {
          break;
        }
        if self.counts(candidate, node, count)? {
          number += 1;
        }
      }
      return Ok(if number == 0 { Vec::new() } else { vec![number] });
    }

    let mut counted = Vec::new();
    let mut current = Some(node);
    while let Some(candidate) = current {
      if let Some(from) = from
        && self.matches(from, candidate)?
      {
        break;
      }
      if self.counts(candidate, node, count)? {
        counted.push(candidate);
        if level == NumberLevel::Single {
          break;
        }
      }
      current = self.doc.parent(candidate);
    }
    counted
      .into_iter()
      .rev()
      .map(|target| self.sibling_number(target, node, count))
      .collect()
  }

  fn shallow_copy(
    &self,
    body: &[Instruction],
    focus: Focus,
    scope: &mut Scope<'_>,
    out: &mut Frame,
  ) -> Result<()> {
    match self.doc.kind(focus.node) {
      NodeKind::Document => self.execute(body, focus, scope, out),
      NodeKind::Element { name } => {
        let mut frame = Frame::default();
        self.execute(body, focus, scope, &mut frame)?;
        out.push(frame.into_element(name.clone()));
        Ok(())
      },
      NodeKind::Attribute { name, value } => {
        out.set_attribute(name.clone(), value.clone());
        Ok(())
      },
      NodeKind::Text(text) => {
        out.push_text(text);
        Ok(())
      },
      NodeKind::Comment(text) => {
        out.push(ResultNode::Comment(text.clone()));
        Ok(())
      },
    }
  }

  fn deep_copy(&self, node: NodeId, out: &mut Frame) {
    match self.doc.kind(node) {
      NodeKind::Document => {
        for &child in self.doc.children(node) {
          self.deep_copy(child, out);
        }
      },
      NodeKind::Element { name } => {
        let mut frame = Frame::default();
        for &attr in self.doc.attributes(node) {
          self.deep_copy(attr, &mut frame);
        }
        for &child in self.doc.children(node) {
          self.deep_copy(child, &mut frame);
        }
        out.push(frame.into_element(name.clone()));
      },
      NodeKind::Attribute { name, value } => {
        out.set_attribute(name.clone(), value.clone());
      },
      NodeKind::Text(text) => out.push_text(text),
      NodeKind::Comment(text) => out.push(ResultNode::Comment(text.clone())),
    }
  }
}
