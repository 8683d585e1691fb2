use crate::error::{Result, XsltError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
  Slash,
  DoubleSlash,
  Dot,
  DotDot,
  At,
  Comma,
  LParen,
  RParen,
  LBracket,
  RBracket,
  Pipe,
  Plus,
  Minus,
  Star,
  Eq,
  NotEq,
  Lt,
  LtEq,
  Gt,
  GtEq,
  DoubleColon,
  Variable(String),
  Literal(String),
  Number(f64),
  Name(String),
}

fn is_name_start(c: char) -> bool {
  c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
  c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Split an expression into tokens.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>> {
  let chars: Vec<char> = source.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    let next = chars.get(i + 1).copied();
    match c {
      c if c.is_whitespace() => {
        i += 1;
      },
      '/' => {
        if next == Some('/') {
          tokens.push(Token::DoubleSlash);
          i += 2;
        } else {
          tokens.push(Token::Slash);
          i += 1;
        }
      },
      '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
        let (number, end) = read_number(&chars, i);
        tokens.push(Token::Number(number));
        i = end;
      },
      '.' => {
        if next == Some('.') {
          tokens.push(Token::DotDot);
          i += 2;
        } else {
          tokens.push(Token::Dot);
          i += 1;
        }
      },
      '@' => {
        tokens.push(Token::At);
        i += 1;
      },
      ',' => {
        tokens.push(Token::Comma);
        i += 1;
      },
      '(' => {
        tokens.push(Token::LParen);
        i += 1;
      },
      ')' => {
        tokens.push(Token::RParen);
        i += 1;
      },
      '[' => {
        tokens.push(Token::LBracket);
        i += 1;
      },
      ']' => {
        tokens.push(Token::RBracket);
        i += 1;
      },
      '|' => {
        tokens.push(Token::Pipe);
        i += 1;
      },
      '+' => {
        tokens.push(Token::Plus);
        i += 1;
      },
      '-' => {
        tokens.push(Token::Minus);
        i += 1;
      },
      '*' => {
        tokens.push(Token::Star);
        i += 1;
      },
      '=' => {
        tokens.push(Token::Eq);
        i += 1;
      },
      '!' if next == Some('=') => {
        tokens.push(Token::NotEq);
        i += 2;
      },
      '<' => {
        if next == Some('=') {
          tokens.push(Token::LtEq);
          i += 2;
        } else {
          tokens.push(Token::Lt);
          i += 1;
        }
      },
      '>' => {
        if next == Some('=') {
          tokens.push(Token::GtEq);
          i += 2;
        } else {
          tokens.push(Token::Gt);
          i += 1;
        }
      },
      ':' if next == Some(':') => {
        tokens.push(Token::DoubleColon);
        i += 2;
      },
      '"' | '\'' => {
        let end = chars[i + 1..]
          .iter()
          .position(|&ch| ch == c)
          .ok_or_else(|| {
            XsltError::expression(source, "unterminated string literal")
          })?;
        let literal: String = chars[i + 1..i + 1 + end].iter().collect();
        tokens.push(Token::Literal(literal));
        i += end + 2;
      },
      '$' => {
        let (name, end) = read_name(&chars, i + 1);
        if name.is_empty() {
          return Err(XsltError::expression(source, "expected variable name"));
        }
        tokens.push(Token::Variable(name));
        i = end;
      },
      c if c.is_ascii_digit() => {
        let (number, end) = read_number(&chars, i);
        tokens.push(Token::Number(number));
        i = end;
      },
      c if is_name_start(c) => {
        let (name, end) = read_name(&chars, i);
        tokens.push(Token::Name(name));
        i = end;
      },
      other => {
        return Err(XsltError::expression(
          source,
          format!("unexpected character '{other}'"),
        ));
      },
    }
  }

  Ok(tokens)
}

/// Read a (possibly prefixed) name. A single `:` joins prefix and local part;
/// `::` is left for the axis separator.
fn read_name(chars: &[char], start: usize) -> (String, usize) {
  let mut end = start;
  while end < chars.len() {
    let c = chars[end];
    if is_name_char(c) {
      end += 1;
    } else if c == ':'
      && chars.get(end + 1).is_some_and(|&n| is_name_start(n))
      && end > start
    {
      end += 1;
    } else {
      break;
    }
  }
  (chars[start..end].iter().collect(), end)
}

fn read_number(chars: &[char], start: usize) -> (f64, usize) {
  let mut end = start;
  let mut seen_dot = false;
  while end < chars.len() {
    let c = chars[end];
    if c.is_ascii_digit() {
      end += 1;
    } else if c == '.' && !seen_dot {
      seen_dot = true;
      end += 1;
    } else {
      break;
    }
  }
  let text: String = chars[start..end].iter().collect();
  (text.parse().unwrap_or(f64::NAN), end)
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use super::*;

  #[test]
  fn tokenizes_paths_and_operators() {
    let tokens = tokenize("//p[@class != 'x']/text()").unwrap();
    assert_eq!(tokens, vec![
      Token::DoubleSlash,
      Token::Name("p".to_string()),
      Token::LBracket,
      Token::At,
      Token::Name("class".to_string()),
      Token::NotEq,
      Token::Literal("x".to_string()),
      Token::RBracket,
      Token::Slash,
      Token::Name("text".to_string()),
      Token::LParen,
      Token::RParen,
    ]);
  }

  #[test]
  fn distinguishes_axis_separator_from_prefix() {
    let tokens = tokenize("child::xsl:value-of").unwrap();
    assert_eq!(tokens, vec![
      Token::Name("child".to_string()),
      Token::DoubleColon,
      Token::Name("xsl:value-of".to_string()),
    ]);
  }

  #[test]
  fn reads_numbers_and_variables() {
    let tokens = tokenize("$add_linebreak and .5 + 10.25").unwrap();
    assert_eq!(tokens, vec![
      Token::Variable("add_linebreak".to_string()),
      Token::Name("and".to_string()),
      Token::Number(0.5),
      Token::Plus,
      Token::Number(10.25),
    ]);
  }

  #[test]
  fn rejects_unterminated_literal() {
    assert!(tokenize("'open").is_err());
  }
}
