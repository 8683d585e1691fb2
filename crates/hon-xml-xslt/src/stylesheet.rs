//! Stylesheet compilation.
//!
//! A stylesheet document is read with [`crate::xml`] and compiled into
//! template rules whose bodies are trees of [`Instruction`]s. Expressions,
//! patterns and attribute value templates are all parsed here, so a
//! stylesheet that compiles only fails at runtime on dynamic errors.
use std::{collections::HashMap, fs, path::Path};

use log::debug;

use crate::{
  error::{Result, XsltError},
  output::{OutputMethod, OutputSettings},
  pattern::{PathPattern, Pattern},
  xml::{
    self,
    XmlElement,
    XmlNode,
    declaration_for,
    is_namespace_declaration,
  },
  xpath::{self, Expr},
};

/// Namespace URI that identifies XSLT instructions.
pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// A piece of an attribute value template.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AvtPart {
  Literal(String),
  Expr(Expr),
}

/// An attribute value template such as `chapter-{@id}`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Avt(pub(crate) Vec<AvtPart>);

impl Avt {
  fn parse(source: &str) -> Result<Self> {
    let invalid = |message: &str| XsltError::expression(source, message);
    let chars: Vec<char> = source.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
      match chars[i] {
        '{' if chars.get(i + 1) == Some(&'{') => {
          literal.push('{');
          i += 2;
        },
        '}' if chars.get(i + 1) == Some(&'}') => {
          literal.push('}');
          i += 2;
        },
        '}' => return Err(invalid("unmatched '}' in attribute value template")),
        '{' => {
          let start = i + 1;
          let mut end = start;
          let mut quote: Option<char> = None;
          loop {
            let Some(&c) = chars.get(end) else {
              return Err(invalid("unterminated '{' in attribute value template"));
            };
            match (quote, c) {
              (Some(q), c) if c == q => quote = None,
              (None, '"' | '\'') => quote = Some(c),
              (None, '}') => break,
              _ => {},
            }
            end += 1;
          }
          if !literal.is_empty() {
            parts.push(AvtPart::Literal(std::mem::take(&mut literal)));
          }
          let expression: String = chars[start..end].iter().collect();
          parts.push(AvtPart::Expr(xpath::parse(&expression)?));
          i = end + 1;
        },
        c => {
          literal.push(c);
          i += 1;
        },
      }
    }
    if !literal.is_empty() {
      parts.push(AvtPart::Literal(literal));
    }
    Ok(Self(parts))
  }
}

/// How a variable or parameter gets its value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindingValue {
  Select(Expr),
  Body(Vec<Instruction>),
  /// Neither `select` nor content: the empty string.
  Empty,
}

/// A named variable, parameter or `xsl:with-param`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Binding {
  pub(crate) name:  String,
  pub(crate) value: BindingValue,
}

/// An `xsl:sort` key. `order` and `data-type` are attribute value templates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SortKey {
  pub(crate) select:    Expr,
  pub(crate) order:     Avt,
  pub(crate) data_type: Avt,
}

/// Which nodes `xsl:number` counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberLevel {
  /// Preceding siblings of the nearest counted ancestor-or-self.
  Single,
  /// One number per counted ancestor-or-self.
  Multiple,
  /// Every counted node before the current one in document order.
  Any,
}

/// A compiled template instruction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Instruction {
  LiteralElement {
    name:       String,
    /// Namespace declarations written before the attributes.
    namespaces: Vec<(String, String)>,
    attributes: Vec<(String, Avt)>,
    body:       Vec<Self>,
  },
  Text(String),
  ValueOf(Expr),
  ApplyTemplates {
    select: Option<Expr>,
    mode:   Option<String>,
    params: Vec<Binding>,
    sort:   Vec<SortKey>,
  },
  CallTemplate {
    name:   String,
    params: Vec<Binding>,
  },
  Copy(Vec<Self>),
  CopyOf(Expr),
  Element {
    name: Avt,
    body: Vec<Self>,
  },
  Attribute {
    name: Avt,
    body: Vec<Self>,
  },
  If {
    test: Expr,
    body: Vec<Self>,
  },
  Choose {
    branches:  Vec<(Expr, Vec<Self>)>,
    otherwise: Vec<Self>,
  },
  ForEach {
    select: Expr,
    sort:   Vec<SortKey>,
    body:   Vec<Self>,
  },
  Number {
    value:  Option<Expr>,
    level:  NumberLevel,
    count:  Option<Pattern>,
    from:   Option<Pattern>,
    format: Avt,
  },
  Variable(Binding),
  Comment(Vec<Self>),
  Message {
    body:      Vec<Self>,
    terminate: bool,
  },
}

/// An `xsl:template` element.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Template {
  pub(crate) name:   Option<String>,
  pub(crate) params: Vec<Binding>,
  pub(crate) body:   Vec<Instruction>,
}

/// One alternative of a template's match pattern, ready for rule selection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Rule {
  pub(crate) pattern:  PathPattern,
  pub(crate) mode:     Option<String>,
  pub(crate) priority: f64,
  pub(crate) template: usize,
}

/// A top-level `xsl:param` or `xsl:variable`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Global {
  pub(crate) binding:  Binding,
  /// Parameters can be overridden by the caller; variables cannot.
  pub(crate) is_param: bool,
}

/// A compiled stylesheet, reusable across any number of transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct Stylesheet {
  pub(crate) templates:   Vec<Template>,
  pub(crate) rules:       Vec<Rule>,
  pub(crate) named:       HashMap<String, usize>,
  pub(crate) globals:     Vec<Global>,
  pub(crate) output:      OutputSettings,
  pub(crate) strip_space: Vec<String>,
}

impl Stylesheet {
  /// Read and compile a stylesheet file.
  ///
  /// # Errors
  ///
  /// Returns [`XsltError::NotFound`] when `path` is not a file, and any
  /// read or compilation error otherwise.
  pub fn from_file(path: &Path) -> Result<Self> {
    if !path.is_file() {
      return Err(XsltError::NotFound(path.to_path_buf()));
    }
    debug!("Loading stylesheet {}", path.display());
    let source = fs::read_to_string(path)?;
    Self::parse(&source)
  }

  /// Compile a stylesheet from source text.
  ///
  /// # Errors
  ///
  /// Returns an error for malformed XML, a root element that is not an XSLT
  /// stylesheet, unsupported instructions, and invalid expressions or
  /// patterns.
  pub fn parse(source: &str) -> Result<Self> {
    let root = xml::parse_document(source)?;
    let prefix = xsl_prefix(&root).ok_or_else(|| {
      XsltError::Stylesheet(format!(
        "root element <{}> does not declare the XSLT namespace",
        root.name
      ))
    })?;
    let compiler = Compiler::new(prefix, &root);
    compiler.compile(&root)
  }

  /// Serialisation settings from `xsl:output`.
  #[must_use]
  pub const fn output(&self) -> &OutputSettings {
    &self.output
  }

  /// Names of the top-level parameters a caller may set.
  pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
    self
      .globals
      .iter()
      .filter(|g| g.is_param)
      .map(|g| g.binding.name.as_str())
  }

  /// Whether whitespace-only text inside elements called `name` is dropped
  /// from the source document.
  #[must_use]
  pub fn strips_space(&self, name: &str) -> bool {
    self.strip_space.iter().any(|s| s == "*" || s == name)
  }
}

/// Find the prefix bound to the XSLT namespace on the root element.
fn xsl_prefix(root: &XmlElement) -> Option<String> {
  root.attributes.iter().find_map(|(key, value)| {
    key
      .strip_prefix("xmlns:")
      .filter(|_| value == XSLT_NAMESPACE)
      .map(ToString::to_string)
  })
}

fn parse_yes_no(element: &XmlElement, attribute: &str) -> Result<bool> {
  match element.attribute(attribute) {
    None | Some("no") => Ok(false),
    Some("yes") => Ok(true),
    Some(other) => {
      Err(XsltError::Stylesheet(format!(
        "<{}> {attribute}=\"{other}\" must be \"yes\" or \"no\"",
        element.name
      )))
    },
  }
}

/// Namespace declarations while compiling a template body: every
/// declaration in scope in the stylesheet, and those an enclosing literal
/// result element already writes to the output.
#[derive(Debug, Clone, Default)]
struct Namespaces {
  in_scope: Vec<(String, String)>,
  emitted:  Vec<(String, String)>,
}

impl Namespaces {
  /// Scope inside `element`, with its own declarations added.
  fn enter(&self, element: &XmlElement) -> Self {
    let mut scope = self.clone();
    for (key, uri) in element.namespace_declarations() {
      scope.in_scope.retain(|(k, _)| k != key);
      scope.in_scope.push((key.to_string(), uri.to_string()));
    }
    scope
  }

  /// The same declarations with nothing written yet, for content that may
  /// end up anywhere in the result, such as variable bodies.
  fn detached(&self) -> Self {
    Self {
      in_scope: self.in_scope.clone(),
      emitted:  Vec::new(),
    }
  }
}

struct Compiler {
  prefix:   String,
  /// Namespace URIs named by `exclude-result-prefixes`.
  excluded: Vec<String>,
}

impl Compiler {
  fn new(prefix: String, root: &XmlElement) -> Self {
    let excluded = root
      .attribute("exclude-result-prefixes")
      .unwrap_or_default()
      .split_whitespace()
      .filter_map(|prefix| {
        let key = if prefix == "#default" {
          "xmlns".to_string()
        } else {
          format!("xmlns:{prefix}")
        };
        root
          .namespace_declarations()
          .find(|(k, _)| *k == key)
          .map(|(_, uri)| uri.to_string())
      })
      .collect();
    Self { prefix, excluded }
  }

  /// The XSLT local name of an element, or `None` for literal result
  /// elements.
  fn xsl_name<'e>(&self, element: &'e XmlElement) -> Option<&'e str> {
    (element.prefix() == Some(self.prefix.as_str()))
      .then(|| element.local_name())
  }

  fn required<'e>(
    element: &'e XmlElement,
    attribute: &str,
  ) -> Result<&'e str> {
    element.attribute(attribute).ok_or_else(|| {
      XsltError::Stylesheet(format!(
        "<{}> requires a '{attribute}' attribute",
        element.name
      ))
    })
  }

  fn compile(&self, root: &XmlElement) -> Result<Stylesheet> {
    if !matches!(self.xsl_name(root), Some("stylesheet" | "transform")) {
      return Err(XsltError::Stylesheet(format!(
        "expected <{0}:stylesheet> or <{0}:transform>, found <{1}>",
        self.prefix, root.name
      )));
    }

    let mut stylesheet = Stylesheet {
      templates:   Vec::new(),
      rules:       Vec::new(),
      named:       HashMap::new(),
      globals:     Vec::new(),
      output:      OutputSettings::default(),
      strip_space: Vec::new(),
    };
    let ns = Namespaces::default().enter(root);

    for child in &root.children {
      let element = match child {
        XmlNode::Element(element) => element,
        XmlNode::Text(text) if text.trim().is_empty() => continue,
        XmlNode::Text(text) => {
          return Err(XsltError::Stylesheet(format!(
            "text is not allowed at the top level: '{}'",
            text.trim()
          )));
        },
      };
      match self.xsl_name(element) {
        Some("template") => {
          self.compile_template(element, &ns.enter(element), &mut stylesheet)?;
        },
        Some("output") => stylesheet.output = compile_output(element)?,
        Some("strip-space") => {
          stylesheet.strip_space.extend(
            Self::required(element, "elements")?
              .split_whitespace()
              .map(ToString::to_string),
          );
        },
        Some(kind @ ("param" | "variable")) => {
          stylesheet.globals.push(Global {
            binding:  self.compile_binding(element, &ns.enter(element))?,
            is_param: kind == "param",
          });
        },
        Some(other) => {
          return Err(XsltError::Stylesheet(format!(
            "unsupported top-level element <{}:{other}>",
            self.prefix
          )));
        },
        // Top-level elements in other namespaces carry user data.
        None => {},
      }
    }

    Ok(stylesheet)
  }

  fn compile_template(
    &self,
    element: &XmlElement,
    ns: &Namespaces,
    stylesheet: &mut Stylesheet,
  ) -> Result<()> {
    let name = element.attribute("name").map(ToString::to_string);
    let pattern = element.attribute("match").map(Pattern::parse).transpose()?;
    if name.is_none() && pattern.is_none() {
      return Err(XsltError::Stylesheet(
        "<xsl:template> needs a 'match' or 'name' attribute".into(),
      ));
    }
    let priority = element
      .attribute("priority")
      .map(|p| {
        p.trim().parse::<f64>().map_err(|_| {
          XsltError::Stylesheet(format!("invalid template priority '{p}'"))
        })
      })
      .transpose()?;
    let mode = element.attribute("mode").map(ToString::to_string);

    let mut params = Vec::new();
    let mut rest = Vec::new();
    for child in &element.children {
      match child {
        XmlNode::Element(e) if self.xsl_name(e) == Some("param") => {
          if !rest.iter().all(is_blank) {
            return Err(XsltError::Stylesheet(
              "<xsl:param> must come first in a template".into(),
            ));
          }
          params.push(self.compile_binding(e, &ns.enter(e))?);
        },
        other => rest.push(other.clone()),
      }
    }

    let index = stylesheet.templates.len();
    stylesheet.templates.push(Template {
      name: name.clone(),
      params,
      body: self.compile_body(&rest, ns)?,
    });

    if let Some(name) = name
      && stylesheet.named.insert(name.clone(), index).is_some()
    {
      return Err(XsltError::Stylesheet(format!(
        "duplicate named template '{name}'"
      )));
    }
    if let Some(pattern) = pattern {
      for alternative in pattern.alternatives() {
        stylesheet.rules.push(Rule {
          pattern:  alternative.clone(),
          mode:     mode.clone(),
          priority: priority.unwrap_or_else(|| alternative.default_priority()),
          template: index,
        });
      }
    }
    Ok(())
  }

  fn compile_binding(
    &self,
    element: &XmlElement,
    ns: &Namespaces,
  ) -> Result<Binding> {
    let name = Self::required(element, "name")?.to_string();
    let value = if let Some(select) = element.attribute("select") {
      BindingValue::Select(xpath::parse(select)?)
    } else if element.children.iter().all(is_blank) {
      BindingValue::Empty
    } else {
      BindingValue::Body(self.compile_body(&element.children, &ns.detached())?)
    };
    Ok(Binding { name, value })
  }

  fn compile_body(
    &self,
    nodes: &[XmlNode],
    ns: &Namespaces,
  ) -> Result<Vec<Instruction>> {
    let mut body = Vec::new();
    for node in nodes {
      match node {
        XmlNode::Text(text) if text.trim().is_empty() => {},
        XmlNode::Text(text) => body.push(Instruction::Text(text.clone())),
        XmlNode::Element(element) => {
          body.push(self.compile_element(element, ns)?);
        },
      }
    }
    Ok(body)
  }

  /// `xsl:with-param` children, plus `xsl:sort` keys where `sortable`.
  fn arguments(
    &self,
    element: &XmlElement,
    ns: &Namespaces,
    sortable: bool,
  ) -> Result<(Vec<Binding>, Vec<SortKey>)> {
    let mut params = Vec::new();
    let mut sort = Vec::new();
    for child in element.elements() {
      match self.xsl_name(child) {
        Some("with-param") => {
          params.push(self.compile_binding(child, &ns.enter(child))?);
        },
        Some("sort") if sortable => sort.push(compile_sort(child)?),
        _ => {
          return Err(XsltError::Stylesheet(format!(
            "<{}> is not allowed inside <{}>",
            child.name, element.name
          )));
        },
      }
    }
    Ok((params, sort))
  }

  /// Split the leading `xsl:sort` keys of an `xsl:for-each` from its body.
  fn sort_and_body(
    &self,
    element: &XmlElement,
    ns: &Namespaces,
  ) -> Result<(Vec<SortKey>, Vec<Instruction>)> {
    let mut sort = Vec::new();
    let mut rest = Vec::new();
    for child in &element.children {
      match child {
        XmlNode::Element(e) if self.xsl_name(e) == Some("sort") => {
          if !rest.iter().all(is_blank) {
            return Err(XsltError::Stylesheet(
              "<xsl:sort> must come first in <xsl:for-each>".into(),
            ));
          }
          sort.push(compile_sort(e)?);
        },
        other => rest.push(other.clone()),
      }
    }
    Ok((sort, self.compile_body(&rest, ns)?))
  }

  fn compile_element(
    &self,
    element: &XmlElement,
    ns: &Namespaces,
  ) -> Result<Instruction> {
    let Some(kind) = self.xsl_name(element) else {
      return self.compile_literal(element, ns);
    };
    let ns = &ns.enter(element);

    let instruction = match kind {
      "value-of" => {
        Instruction::ValueOf(xpath::parse(Self::required(element, "select")?)?)
      },
      "text" => {
        let text = element
          .children
          .iter()
          .map(|child| {
            match child {
              XmlNode::Text(text) => Ok(text.as_str()),
              XmlNode::Element(e) => {
                Err(XsltError::Stylesheet(format!(
                  "<{}> is not allowed inside <xsl:text>",
                  e.name
                )))
              },
            }
          })
          .collect::<Result<String>>()?;
        Instruction::Text(text)
      },
      "apply-templates" => {
        let (params, sort) = self.arguments(element, ns, true)?;
        Instruction::ApplyTemplates {
          select: element.attribute("select").map(xpath::parse).transpose()?,
          mode: element.attribute("mode").map(ToString::to_string),
          params,
          sort,
        }
      },
      "call-template" => {
        Instruction::CallTemplate {
          name:   Self::required(element, "name")?.to_string(),
          params: self.arguments(element, ns, false)?.0,
        }
      },
      "copy" => Instruction::Copy(self.compile_body(&element.children, ns)?),
      "copy-of" => {
        Instruction::CopyOf(xpath::parse(Self::required(element, "select")?)?)
      },
      "element" => {
        Instruction::Element {
          name: Avt::parse(Self::required(element, "name")?)?,
          body: self.compile_body(&element.children, ns)?,
        }
      },
      "attribute" => {
        Instruction::Attribute {
          name: Avt::parse(Self::required(element, "name")?)?,
          body: self.compile_body(&element.children, ns)?,
        }
      },
      "if" => {
        Instruction::If {
          test: xpath::parse(Self::required(element, "test")?)?,
          body: self.compile_body(&element.children, ns)?,
        }
      },
      "choose" => self.compile_choose(element, ns)?,
      "for-each" => {
        let (sort, body) = self.sort_and_body(element, ns)?;
        Instruction::ForEach {
          select: xpath::parse(Self::required(element, "select")?)?,
          sort,
          body,
        }
      },
      "number" => compile_number(element)?,
      "variable" => Instruction::Variable(self.compile_binding(element, ns)?),
      "comment" => {
        Instruction::Comment(self.compile_body(&element.children, ns)?)
      },
      "message" => {
        Instruction::Message {
          body:      self.compile_body(&element.children, ns)?,
          terminate: parse_yes_no(element, "terminate")?,
        }
      },
      "sort" => {
        return Err(XsltError::Stylesheet(
          "<xsl:sort> is only allowed in <xsl:apply-templates> and \
           <xsl:for-each>"
            .into(),
        ));
      },
      other => {
        return Err(XsltError::Stylesheet(format!(
          "unsupported instruction <{}:{other}>",
          self.prefix
        )));
      },
    };
    Ok(instruction)
  }

  fn compile_choose(
    &self,
    element: &XmlElement,
    ns: &Namespaces,
  ) -> Result<Instruction> {
    let mut branches = Vec::new();
    let mut otherwise = None;
    for child in element.elements() {
      let inner = ns.enter(child);
      match self.xsl_name(child) {
        Some("when") if otherwise.is_none() => {
          branches.push((
            xpath::parse(Self::required(child, "test")?)?,
            self.compile_body(&child.children, &inner)?,
          ));
        },
        Some("otherwise") if otherwise.is_none() => {
          otherwise = Some(self.compile_body(&child.children, &inner)?);
        },
        _ => {
          return Err(XsltError::Stylesheet(format!(
            "<{}> is not allowed inside <xsl:choose> here",
            child.name
          )));
        },
      }
    }
    if branches.is_empty() {
      return Err(XsltError::Stylesheet(
        "<xsl:choose> needs at least one <xsl:when>".into(),
      ));
    }
    Ok(Instruction::Choose {
      branches,
      otherwise: otherwise.unwrap_or_default(),
    })
  }

  /// A literal result element. It declares every namespace in scope that
  /// its result ancestors have not declared yet, leaving out the XSLT
  /// namespace and excluded prefixes its own names do not use.
  fn compile_literal(
    &self,
    element: &XmlElement,
    ns: &Namespaces,
  ) -> Result<Instruction> {
    let scope = ns.enter(element);
    let xsl_attribute_prefix = format!("{}:", self.prefix);

    let mut used = vec![declaration_for(&element.name)];
    used.extend(
      element
        .attributes
        .iter()
        .filter(|(key, _)| key.contains(':') && !is_namespace_declaration(key))
        .map(|(key, _)| declaration_for(key)),
    );
    let namespaces: Vec<(String, String)> = scope
      .in_scope
      .iter()
      .filter(|(key, uri)| {
        uri != XSLT_NAMESPACE
          && (!self.excluded.contains(uri) || used.contains(key))
      })
      .filter(|declaration| !scope.emitted.contains(declaration))
      .cloned()
      .collect();

    let attributes = element
      .attributes
      .iter()
      .filter(|(key, _)| {
        !is_namespace_declaration(key) && !key.starts_with(&xsl_attribute_prefix)
      })
      .map(|(key, value)| Ok((key.clone(), Avt::parse(value)?)))
      .collect::<Result<Vec<_>>>()?;

    let mut inner = scope;
    inner.emitted.extend(namespaces.iter().cloned());
    Ok(Instruction::LiteralElement {
      name: element.name.clone(),
      namespaces,
      attributes,
      body: self.compile_body(&element.children, &inner)?,
    })
  }
}

fn is_blank(node: &XmlNode) -> bool {
  matches!(node, XmlNode::Text(text) if text.trim().is_empty())
}

fn compile_sort(element: &XmlElement) -> Result<SortKey> {
  Ok(SortKey {
    select:    xpath::parse(element.attribute("select").unwrap_or("."))?,
    order:     Avt::parse(element.attribute("order").unwrap_or("ascending"))?,
    data_type: Avt::parse(element.attribute("data-type").unwrap_or("text"))?,
  })
}

fn compile_number(element: &XmlElement) -> Result<Instruction> {
  let level = match element.attribute("level") {
    None | Some("single") => NumberLevel::Single,
    Some("multiple") => NumberLevel::Multiple,
    Some("any") => NumberLevel::Any,
    Some(other) => {
      return Err(XsltError::Stylesheet(format!(
        "<xsl:number> level=\"{other}\" must be single, multiple or any"
      )));
    },
  };
  Ok(Instruction::Number {
    value: element.attribute("value").map(xpath::parse).transpose()?,
    level,
    count: element.attribute("count").map(Pattern::parse).transpose()?,
    from: element.attribute("from").map(Pattern::parse).transpose()?,
    format: Avt::parse(element.attribute("format").unwrap_or("1"))?,
  })
}

fn compile_output(element: &XmlElement) -> Result<OutputSettings> {
  let method = match element.attribute("method") {
    None | Some("xml") => OutputMethod::Xml,
    Some("html") => OutputMethod::Html,
    Some("text") => OutputMethod::Text,
    Some(other) => {
      return Err(XsltError::Stylesheet(format!(
        "unsupported output method '{other}'"
      )));
    },
  };
  // Results are always written as UTF-8, so the declaration must say so.
  match element.attribute("encoding") {
    None => {},
    Some(encoding)
      if encoding.eq_ignore_ascii_case("UTF-8")
        || encoding.eq_ignore_ascii_case("UTF8") => {},
    Some(other) => {
      return Err(XsltError::Stylesheet(format!(
        "unsupported output encoding '{other}', only UTF-8 is written"
      )));
    },
  }
  Ok(OutputSettings {
    method,
    indent: parse_yes_no(element, "indent")?,
    omit_xml_declaration: parse_yes_no(element, "omit-xml-declaration")?,
    ..OutputSettings::default()
  })
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::panic, reason = "Fine in tests")]

  use super::*;

  fn wrap(body: &str) -> String {
    format!(
      r#"<xsl:stylesheet version="1.0" xmlns:xsl="{XSLT_NAMESPACE}">{body}</xsl:stylesheet>"#
    )
  }

  #[test]
  fn compiles_rules_and_globals() {
    let sheet = Stylesheet::parse(&wrap(
      r#"
      <xsl:output method="xml" indent="yes" omit-xml-declaration="no"/>
      <xsl:strip-space elements="html body"/>
      <xsl:param name="add_linebreak" select="true()"/>
      <xsl:param name="linebreak"/>
      <xsl:variable name="v" select="1"/>
      <xsl:template match="p | li"><para><xsl:apply-templates/></para></xsl:template>
      <xsl:template name="named" match="h1" priority="2"><x/></xsl:template>
      "#,
    ))
    .unwrap();

    assert!(sheet.output().indent);
    assert!(sheet.strips_space("body"));
    assert!(!sheet.strips_space("p"));
    assert_eq!(sheet.parameter_names().collect::<Vec<_>>(), vec![
      "add_linebreak",
      "linebreak"
    ]);
    assert_eq!(sheet.templates.len(), 2);
    assert_eq!(sheet.rules.len(), 3);
    assert!((sheet.rules[2].priority - 2.0).abs() < f64::EPSILON);
    assert_eq!(sheet.named.get("named"), Some(&1));
  }

  #[test]
  fn accepts_any_prefix_for_the_namespace() {
    let source = format!(
      r#"<t:transform version="1.0" xmlns:t="{XSLT_NAMESPACE}"><t:template match="/"><t:text> kept </t:text></t:template></t:transform>"#
    );
    let sheet = Stylesheet::parse(&source).unwrap();
    assert_eq!(sheet.templates[0].body, vec![Instruction::Text(
      " kept ".to_string()
    )]);
  }

  #[test]
  fn parses_attribute_value_templates() {
    let avt = Avt::parse("a{@id}b{{c}}").unwrap();
    assert_eq!(avt.0.len(), 3);
    assert_eq!(avt.0[0], AvtPart::Literal("a".to_string()));
    assert!(matches!(avt.0[1], AvtPart::Expr(_)));
    assert_eq!(avt.0[2], AvtPart::Literal("b{c}".to_string()));
    assert!(Avt::parse("{'}'}").is_ok());
    assert!(Avt::parse("{@id").is_err());
    assert!(Avt::parse("a}b").is_err());
  }

  fn literal(instruction: &Instruction) -> (&[(String, String)], &[Instruction]) {
    let Instruction::LiteralElement {
      namespaces, body, ..
    } = instruction
    else {
      panic!("expected literal element, found {instruction:?}");
    };
    (namespaces, body)
  }

  #[test]
  fn outermost_literal_elements_declare_namespaces_in_scope() {
    let sheet = Stylesheet::parse(&format!(
      r#"<xsl:stylesheet version="1.0" xmlns:xsl="{XSLT_NAMESPACE}" xmlns="http://docbook.org/ns/docbook" xmlns:db="urn:x">
        <xsl:template match="/"><book role="r-{{name()}}"><db:x/></book></xsl:template>
      </xsl:stylesheet>"#
    ))
    .unwrap();
    let (namespaces, body) = literal(&sheet.templates[0].body[0]);
    assert_eq!(namespaces, [
      ("xmlns".to_string(), "http://docbook.org/ns/docbook".to_string()),
      ("xmlns:db".to_string(), "urn:x".to_string()),
    ]);
    let (inner, _) = literal(&body[0]);
    assert!(inner.is_empty());

    let Instruction::LiteralElement { attributes, .. } =
      &sheet.templates[0].body[0]
    else {
      panic!("expected literal element");
    };
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].0, "role");
  }

  #[test]
  fn nested_declarations_and_excluded_prefixes() {
    let sheet = Stylesheet::parse(&format!(
      r#"<xsl:stylesheet version="1.0" xmlns:xsl="{XSLT_NAMESPACE}" xmlns:h="urn:h" xmlns:u="urn:u" exclude-result-prefixes="h u">
        <xsl:template match="/"><out xmlns:n="urn:n"><u:in/><n:in/></out></xsl:template>
      </xsl:stylesheet>"#
    ))
    .unwrap();
    let (namespaces, body) = literal(&sheet.templates[0].body[0]);
    assert_eq!(namespaces, [("xmlns:n".to_string(), "urn:n".to_string())]);
    // An excluded prefix is still declared where a name uses it.
    let (used, _) = literal(&body[0]);
    assert_eq!(used, [("xmlns:u".to_string(), "urn:u".to_string())]);
    let (inherited, _) = literal(&body[1]);
    assert!(inherited.is_empty());
  }

  #[test]
  fn only_utf8_output_is_accepted() {
    assert!(
      Stylesheet::parse(&wrap(r#"<xsl:output encoding="utf-8"/>"#)).is_ok()
    );
    assert!(matches!(
      Stylesheet::parse(&wrap(r#"<xsl:output encoding="ISO-8859-1"/>"#)),
      Err(XsltError::Stylesheet(m)) if m.contains("ISO-8859-1")
    ));
  }

  #[test]
  fn compiles_sort_keys_and_numbers() {
    let sheet = Stylesheet::parse(&wrap(
      r#"<xsl:template match="/">
        <xsl:for-each select="//li"><xsl:sort select="@n" data-type="number" order="descending"/><xsl:number format="a"/></xsl:for-each>
        <xsl:apply-templates select="//p"><xsl:sort/><xsl:with-param name="x" select="1"/></xsl:apply-templates>
      </xsl:template>"#,
    ))
    .unwrap();
    let body = &sheet.templates[0].body;
    let Instruction::ForEach { sort, body: inner, .. } = &body[0] else {
      panic!("expected for-each");
    };
    assert_eq!(sort.len(), 1);
    assert!(matches!(
      inner[0],
      Instruction::Number {
        level: NumberLevel::Single,
        value: None,
        ..
      }
    ));
    let Instruction::ApplyTemplates { sort, params, .. } = &body[1] else {
      panic!("expected apply-templates");
    };
    assert_eq!((sort.len(), params.len()), (1, 1));

    assert!(
      Stylesheet::parse(&wrap(
        r#"<xsl:template match="/"><xsl:for-each select="*"><x/><xsl:sort/></xsl:for-each></xsl:template>"#
      ))
      .is_err()
    );
    assert!(
      Stylesheet::parse(&wrap(
        r#"<xsl:template match="/"><xsl:number level="deep"/></xsl:template>"#
      ))
      .is_err()
    );
  }

  #[test]
  fn rejects_invalid_stylesheets() {
    assert!(matches!(
      Stylesheet::parse("<root/>"),
      Err(XsltError::Stylesheet(_))
    ));
    assert!(matches!(
      Stylesheet::parse(&wrap("<xsl:template>x</xsl:template>")),
      Err(XsltError::Stylesheet(_))
    ));
    assert!(matches!(
      Stylesheet::parse(&wrap(
        r#"<xsl:template match="/"><xsl:apply-imports/></xsl:template>"#
      )),
      Err(XsltError::Stylesheet(_))
    ));
    assert!(matches!(
      Stylesheet::parse(&wrap(r#"<xsl:template match="p["/>"#)),
      Err(XsltError::Pattern { .. })
    ));
    assert!(matches!(
      Stylesheet::parse(&wrap(
        r#"<xsl:template match="/"><xsl:value-of select="1 +"/></xsl:template>"#
      )),
      Err(XsltError::Expression { .. })
    ));
    assert!(matches!(
      Stylesheet::parse(&wrap("<xsl:template")),
      Err(XsltError::Xml(_))
    ));
  }

  #[test]
  fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.xslt");
    assert!(matches!(
      Stylesheet::from_file(&path),
      Err(XsltError::NotFound(p)) if p == path
    ));
    assert!(matches!(
      Stylesheet::from_file(dir.path()),
      Err(XsltError::NotFound(_))
    ));
  }
}
