use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default separator appended after block elements: U+2029 PARAGRAPH
/// SEPARATOR.
pub const DEFAULT_LINEBREAK: &str = "\u{2029}";

/// Options of the XML rendering stage, the `[xml]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlConfig {
  /// Whether the stage runs at all.
  pub enabled: bool,

  /// Write each chapter's pre-transform document next to its XML output as
  /// `<filename>.input`.
  pub debug_xml: bool,

  /// Ask the transform to append `linebreak_character` after block elements.
  pub insert_linebreaks_for_blocks: bool,

  /// Separator handed to the transform verbatim.
  pub linebreak_character: String,

  /// Path to a custom XSLT stylesheet.
  ///
  /// `None` selects the stylesheet from `template_dir` when one is there,
  /// and the bundled `hon.xslt` otherwise.
  pub xslt_template: Option<PathBuf>,
}

impl Default for XmlConfig {
  fn default() -> Self {
    Self {
      enabled:                      true,
      debug_xml:                    true,
      insert_linebreaks_for_blocks: true,
      linebreak_character:          DEFAULT_LINEBREAK.to_string(),
      xslt_template:                None,
    }
  }
}

impl XmlConfig {
  /// Merge another table into this one. Plain fields take the other value;
  /// `xslt_template` only when the other one is set.
  pub fn merge(&mut self, other: Self) {
    self.enabled = other.enabled;
    self.debug_xml = other.debug_xml;
    self.insert_linebreaks_for_blocks = other.insert_linebreaks_for_blocks;
    self.linebreak_character = other.linebreak_character;
    if other.xslt_template.is_some() {
      self.xslt_template = other.xslt_template;
    }
  }
}
