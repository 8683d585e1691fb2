//! Recursive-descent parser following the XPath 1.0 grammar.
//!
//! `*`, `and`, `or`, `div` and `mod` are read as operators only where an
//! operand has just ended, as the grammar's disambiguation rules require.
use super::{
  ArithOp,
  Axis,
  CompareOp,
  Expr,
  LocationPath,
  NodeTest,
  Step,
  lexer::{Token, tokenize},
};
use crate::error::{Result, XsltError};

/// Parse an expression.
///
/// # Errors
///
/// Returns [`XsltError::Expression`] when the expression is malformed or uses
/// syntax outside the supported subset.
pub fn parse(source: &str) -> Result<Expr> {
  let tokens = tokenize(source)?;
  let mut parser = Parser {
    source,
    tokens,
    pos: 0,
  };
  let expr = parser.or_expr()?;
  if parser.pos < parser.tokens.len() {
    return Err(parser.error(format!(
      "unexpected {:?}",
      parser.tokens[parser.pos]
    )));
  }
  Ok(expr)
}

struct Parser<'a> {
  source: &'a str,
  tokens: Vec<Token>,
  pos:    usize,
}

impl Parser<'_> {
  fn error(&self, message: impl Into<String>) -> XsltError {
    XsltError::expression(self.source, message)
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn peek_at(&self, offset: usize) -> Option<&Token> {
    self.tokens.get(self.pos + offset)
  }

  fn advance(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  fn eat(&mut self, expected: &Token) -> bool {
    if self.peek() == Some(expected) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn expect(&mut self, expected: &Token) -> Result<()> {
    if self.eat(expected) {
      Ok(())
    } else {
      Err(self.error(format!("expected {expected:?}")))
    }
  }

  fn eat_operator_name(&mut self, name: &str) -> bool {
    if matches!(self.peek(), Some(Token::Name(n)) if n == name) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn or_expr(&mut self) -> Result<Expr> {
    let mut lhs = self.and_expr()?;
    while self.eat_operator_name("or") {
      let rhs = self.and_expr()?;
      lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
  }

  fn and_expr(&mut self) -> Result<Expr> {
    let mut lhs = self.equality_expr()?;
    while self.eat_operator_name("and") {
      let rhs = self.equality_expr()?;
      lhs = Expr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
  }

  fn equality_expr(&mut self) -> Result<Expr> {
    let mut lhs = self.relational_expr()?;
    loop {
      let op = match self.peek() {
        Some(Token::Eq) => CompareOp::Eq,
        Some(Token::NotEq) => CompareOp::NotEq,
        _ => return Ok(lhs),
      };
      self.pos += 1;
      let rhs = self.relational_expr()?;
      lhs = Expr::Compare(op, Box::new(lhs), Box::new(rhs));
    }
  }

  fn relational_expr(&mut self) -> Result<Expr> {
    let mut lhs = self.additive_expr()?;
    loop {
      let op = match self.peek() {
        Some(Token::Lt) => CompareOp::Lt,
        Some(Token::LtEq) => CompareOp::LtEq,
        Some(Token::Gt) => CompareOp::Gt,
        Some(Token::GtEq) => CompareOp::GtEq,
        _ => return Ok(lhs),
      };
      self.pos += 1;
      let rhs = self.additive_expr()?;
      lhs = Expr::Compare(op, Box::new(lhs), Box::new(rhs));
    }
  }

  fn additive_expr(&mut self) -> Result<Expr> {
    let mut lhs = self.multiplicative_expr()?;
    loop {
      let op = match self.peek() {
        Some(Token::Plus) => ArithOp::Add,
        Some(Token::Minus) => ArithOp::Sub,
        _ => return Ok(lhs),
      };
      self.pos += 1;
      let rhs = self.multiplicative_expr()?;
      lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
    }
  }

  fn multiplicative_expr(&mut self) -> Result<Expr> {
    let mut lhs = self.unary_expr()?;
    loop {
      let op = match self.peek() {
        Some(Token::Star) => ArithOp::Mul,
        Some(Token::Name(name)) if name == "div" => ArithOp::Div,
        Some(Token::Name(name)) if name == "mod" => ArithOp::Mod,
        _ => return Ok(lhs),
      };
      self.pos += 1;
      let rhs = self.unary_expr()?;
      lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
    }
  }

  fn unary_expr(&mut self) -> Result<Expr> {
    if self.eat(&Token::Minus) {
      let inner = self.unary_expr()?;
      return Ok(Expr::Negate(Box::new(inner)));
    }
    self.union_expr()
  }

  fn union_expr(&mut self) -> Result<Expr> {
    let mut lhs = self.path_expr()?;
    while self.eat(&Token::Pipe) {
      let rhs = self.path_expr()?;
      lhs = Expr::Union(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
  }

  /// Whether the next tokens start a primary (filter) expression rather than
  /// a location path.
  fn at_primary(&self) -> bool {
    match self.peek() {
      Some(
        Token::Variable(_) | Token::Literal(_) | Token::Number(_) | Token::LParen,
      ) => true,
      Some(Token::Name(name)) => {
        self.peek_at(1) == Some(&Token::LParen)
          && !matches!(
            name.as_str(),
            "text" | "node" | "comment" | "processing-instruction"
          )
      },
      _ => false,
    }
  }

  fn path_expr(&mut self) -> Result<Expr> {
    if !self.at_primary() {
      return self.location_path().map(Expr::Path);
    }

    let primary = self.primary_expr()?;
    let mut predicates = Vec::new();
    while self.peek() == Some(&Token::LBracket) {
      predicates.push(self.predicate()?);
    }

    let mut steps = Vec::new();
    loop {
      if self.eat(&Token::Slash) {
        steps.push(self.step()?);
      } else if self.eat(&Token::DoubleSlash) {
        steps.push(Step::descendant_or_self());
        steps.push(self.step()?);
      } else {
        break;
      }
    }

    if predicates.is_empty() && steps.is_empty() {
      Ok(primary)
    } else {
      Ok(Expr::Filter {
        primary: Box::new(primary),
        predicates,
        steps,
      })
    }
  }

  fn primary_expr(&mut self) -> Result<Expr> {
    match self.advance() {
      Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
      Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
      Some(Token::Number(value)) => Ok(Expr::Number(value)),
      Some(Token::LParen) => {
        let inner = self.or_expr()?;
        self.expect(&Token::RParen)?;
        Ok(inner)
      },
      Some(Token::Name(name)) => {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
          loop {
            args.push(self.or_expr()?);
            if self.eat(&Token::RParen) {
              break;
            }
            self.expect(&Token::Comma)?;
          }
        }
        Ok(Expr::Function { name, args })
      },
      other => Err(self.error(format!("unexpected {other:?}"))),
    }
  }

  fn location_path(&mut self) -> Result<LocationPath> {
    let mut steps = Vec::new();
    let absolute = match self.peek() {
      Some(Token::Slash) => {
        self.pos += 1;
        if !self.at_step_start() {
          return Ok(LocationPath {
            absolute: true,
            steps,
          });
        }
        true
      },
      Some(Token::DoubleSlash) => {
        self.pos += 1;
        steps.push(Step::descendant_or_self());
        true
      },
      _ => false,
    };

    steps.push(self.step()?);
    loop {
      if self.eat(&Token::Slash) {
        steps.push(self.step()?);
      } else if self.eat(&Token::DoubleSlash) {
        steps.push(Step::descendant_or_self());
        steps.push(self.step()?);
      } else {
        break;
      }
    }

    Ok(LocationPath { absolute, steps })
  }

  fn at_step_start(&self) -> bool {
    matches!(
      self.peek(),
      Some(
        Token::Dot | Token::DotDot | Token::At | Token::Star | Token::Name(_)
      )
    )
  }

  fn step(&mut self) -> Result<Step> {
    if self.eat(&Token::Dot) {
      return Ok(Step {
        axis:       Axis::SelfAxis,
        test:       NodeTest::Node,
        predicates: Vec::new(),
      });
    }
    if self.eat(&Token::DotDot) {
      return Ok(Step {
        axis:       Axis::Parent,
        test:       NodeTest::Node,
        predicates: Vec::new(),
      });
    }

    let axis = if self.eat(&Token::At) {
      Axis::Attribute
    } else if let (Some(Token::Name(name)), Some(Token::DoubleColon)) =
      (self.peek(), self.peek_at(1))
    {
      let axis = Axis::from_name(name)
        .ok_or_else(|| self.error(format!("unsupported axis '{name}'")))?;
      self.pos += 2;
      axis
    } else {
      Axis::Child
    };

    let test = self.node_test()?;
    let mut predicates = Vec::new();
    while self.peek() == Some(&Token::LBracket) {
      predicates.push(self.predicate()?);
    }

    Ok(Step {
      axis,
      test,
      predicates,
    })
  }

  fn node_test(&mut self) -> Result<NodeTest> {
    match self.advance() {
      Some(Token::Star) => Ok(NodeTest::Any),
      Some(Token::Name(name)) => {
        if self.peek() == Some(&Token::LParen) {
          let test = match name.as_str() {
            "text" => NodeTest::Text,
            "node" => NodeTest::Node,
            "comment" => NodeTest::Comment,
            _ => {
              return Err(self.error(format!("unsupported node test '{name}()'")));
            },
          };
          self.pos += 1;
          self.expect(&Token::RParen)?;
          Ok(test)
        } else {
          Ok(NodeTest::Name(name))
        }
      },
      other => Err(self.error(format!("expected node test, found {other:?}"))),
    }
  }

  fn predicate(&mut self) -> Result<Expr> {
    self.expect(&Token::LBracket)?;
    let expr = self.or_expr()?;
    self.expect(&Token::RBracket)?;
    Ok(expr)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::panic, reason = "Fine in tests")]

  use super::*;

  fn name_step(name: &str) -> Step {
    Step {
      axis:       Axis::Child,
      test:       NodeTest::Name(name.to_string()),
      predicates: Vec::new(),
    }
  }

  #[test]
  fn parses_relative_path() {
    let expr = parse("html/body").unwrap();
    assert_eq!(
      expr,
      Expr::Path(LocationPath {
        absolute: false,
        steps:    vec![name_step("html"), name_step("body")],
      })
    );
  }

  #[test]
  fn parses_root_only() {
    assert_eq!(
      parse("/").unwrap(),
      Expr::Path(LocationPath {
        absolute: true,
        steps:    Vec::new(),
      })
    );
  }

  #[test]
  fn expands_double_slash() {
    let Expr::Path(path) = parse("//p").unwrap() else {
      panic!("expected path");
    };
    assert!(path.absolute);
    assert!(path.steps[0].is_descendant_or_self_abbreviation());
    assert_eq!(path.steps[1], name_step("p"));
  }

  #[test]
  fn parses_boolean_operators_with_precedence() {
    let expr = parse("$a or $b and $c").unwrap();
    let Expr::Or(lhs, rhs) = expr else {
      panic!("expected or at the top");
    };
    assert_eq!(*lhs, Expr::Variable("a".to_string()));
    assert!(matches!(*rhs, Expr::And(..)));
  }

  #[test]
  fn parses_function_calls_and_node_tests() {
    let expr = parse("concat(name(), ':', text())").unwrap();
    let Expr::Function { name, args } = expr else {
      panic!("expected function");
    };
    assert_eq!(name, "concat");
    assert_eq!(args.len(), 3);
    assert!(matches!(&args[2], Expr::Path(p) if p.steps[0].test == NodeTest::Text));
  }

  #[test]
  fn parses_filter_with_trailing_steps() {
    let expr = parse("$parts[1]/@title").unwrap();
    let Expr::Filter {
      predicates, steps, ..
    } = expr
    else {
      panic!("expected filter");
    };
    assert_eq!(predicates, vec![Expr::Number(1.0)]);
    assert_eq!(steps[0].axis, Axis::Attribute);
  }

  #[test]
  fn parses_explicit_axes() {
    let Expr::Path(path) = parse("ancestor::section[1]").unwrap() else {
      panic!("expected path");
    };
    assert_eq!(path.steps[0].axis, Axis::Ancestor);
    assert_eq!(path.steps[0].predicates.len(), 1);
  }

  #[test]
  fn star_is_multiplication_after_an_operand() {
    let Expr::Arith(ArithOp::Mul, lhs, rhs) = parse("count(//p) * 2").unwrap()
    else {
      panic!("expected multiplication");
    };
    assert!(matches!(*lhs, Expr::Function { .. }));
    assert_eq!(*rhs, Expr::Number(2.0));

    let Expr::Arith(ArithOp::Mul, lhs, _) = parse("* * 3").unwrap() else {
      panic!("expected multiplication");
    };
    assert!(matches!(&*lhs, Expr::Path(p) if p.steps[0].test == NodeTest::Any));
  }

  #[test]
  fn div_and_mod_bind_tighter_than_addition() {
    let Expr::Arith(ArithOp::Add, lhs, rhs) = parse("1 + 10 div 2").unwrap()
    else {
      panic!("expected addition at the top");
    };
    assert_eq!(*lhs, Expr::Number(1.0));
    assert!(matches!(*rhs, Expr::Arith(ArithOp::Div, ..)));
    assert!(matches!(
      parse("7 mod 3").unwrap(),
      Expr::Arith(ArithOp::Mod, ..)
    ));
    // Element names that happen to be operator words.
    let Expr::Path(path) = parse("div/mod").unwrap() else {
      panic!("expected path");
    };
    assert_eq!(path.steps, vec![name_step("div"), name_step("mod")]);
  }

  #[test]
  fn rejects_trailing_tokens() {
    assert!(parse("a b").is_err());
    assert!(parse("foo::bar").is_err());
    assert!(parse("processing-instruction()").is_err());
  }
}
