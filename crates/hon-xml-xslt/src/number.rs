//! Number formatting for `xsl:number`.
//!
//! A format string is split into alphanumeric format tokens and the
//! separators between them, e.g. `(1.a)` has prefix `(`, tokens `1` and `a`,
//! separator `.` and suffix `)`. The n-th number uses the n-th token, or the
//! last one once they run out.

/// Format `numbers` with an `xsl:number` format string.
#[must_use]
pub fn format_numbers(numbers: &[u64], format: &str) -> String {
  if numbers.is_empty() {
    return String::new();
  }
  let Format {
    prefix,
    tokens,
    separators,
    suffix,
  } = Format::parse(format);

  let mut out = prefix;
  for (index, &number) in numbers.iter().enumerate() {
    if index > 0 {
      let separator = separators
        .get(index - 1)
        .or_else(|| separators.last())
        .map_or(".", String::as_str);
      out.push_str(separator);
    }
    let token = tokens
      .get(index)
      .or_else(|| tokens.last())
      .map_or("1", String::as_str);
    out.push_str(&format_one(number, token));
  }
  out.push_str(&suffix);
  out
}

struct Format {
  prefix:     String,
  tokens:     Vec<String>,
  separators: Vec<String>,
  suffix:     String,
}

impl Format {
  fn parse(format: &str) -> Self {
    let mut runs: Vec<(bool, String)> = Vec::new();
    for c in format.chars() {
      let alphanumeric = c.is_alphanumeric();
      match runs.last_mut() {
        Some((kind, run)) if *kind == alphanumeric => run.push(c),
        _ => runs.push((alphanumeric, c.to_string())),
      }
    }

    let mut runs = runs.into_iter().peekable();
    let prefix = match runs.peek() {
      Some((false, _)) => runs.next().map(|(_, run)| run).unwrap_or_default(),
      _ => String::new(),
    };
    let mut tokens = Vec::new();
    let mut separators = Vec::new();
    let mut suffix = String::new();
    while let Some((alphanumeric, run)) = runs.next() {
      if alphanumeric {
        tokens.push(run);
      } else if runs.peek().is_some() {
        separators.push(run);
      } else {
        suffix = run;
      }
    }
    if tokens.is_empty() {
      tokens.push("1".to_string());
    }

    Self {
      prefix,
      tokens,
      separators,
      suffix,
    }
  }
}

fn format_one(number: u64, token: &str) -> String {
  match token {
    "a" => alphabetic(number, b'a'),
    "A" => alphabetic(number, b'A'),
    "i" => roman(number).to_lowercase(),
    "I" => roman(number),
    // `001` pads to the token width.
    t if t
      .strip_suffix('1')
      .is_some_and(|zeros| zeros.chars().all(|c| c == '0')) =>
    {
      format!("{number:0width$}", width = t.len())
    },
    _ => number.to_string(),
  }
}

/// `a`, `b`, ..., `z`, `aa`, `ab`, ...
fn alphabetic(mut number: u64, base: u8) -> String {
  if number == 0 {
    return "0".to_string();
  }
  let mut letters = Vec::new();
  while number > 0 {
    number -= 1;
    #[allow(clippy::cast_possible_truncation, reason = "Remainder is below 26")]
    letters.push(char::from(base + (number % 26) as u8));
    number /= 26;
  }
  letters.iter().rev().collect()
}

fn roman(number: u64) -> String {
  const NUMERALS: &[(u64, &str)] = &[
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
  ];
  if number == 0 || number >= 4000 {
    return number.to_string();
  }
  let mut rest = number;
  let mut out = String::new();
  for &(value, numeral) in NUMERALS {
    while rest >= value {
      out.push_str(numeral);
      rest -= value;
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decimal_and_padding() {
    assert_eq!(format_numbers(&[7], "1"), "7");
    assert_eq!(format_numbers(&[7], "001"), "007");
    assert_eq!(format_numbers(&[1234], "01"), "1234");
    assert_eq!(format_numbers(&[3], "1. "), "3. ");
  }

  #[test]
  fn letters_and_roman_numerals() {
    assert_eq!(format_numbers(&[1], "a"), "a");
    assert_eq!(format_numbers(&[27], "A"), "AA");
    assert_eq!(format_numbers(&[1994], "I"), "MCMXCIV");
    assert_eq!(format_numbers(&[4], "i"), "iv");
    assert_eq!(format_numbers(&[4000], "I"), "4000");
  }

  #[test]
  fn multi_level_numbers_reuse_the_last_token() {
    assert_eq!(format_numbers(&[1, 2, 3], "1.1"), "1.2.3");
    assert_eq!(format_numbers(&[1, 2, 3], "1."), "1.2.3.");
    assert_eq!(format_numbers(&[2, 1], "(I-a)"), "(II-a)");
    assert_eq!(format_numbers(&[1, 2], "A"), "A.B");
  }

  #[test]
  fn empty_inputs() {
    assert_eq!(format_numbers(&[], "1"), "");
    assert_eq!(format_numbers(&[5], "--"), "--5");
  }
}
