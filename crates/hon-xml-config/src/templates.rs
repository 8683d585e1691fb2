use thiserror::Error;

/// Errors raised while picking a default configuration template.
#[derive(Debug, Error)]
pub enum TemplateError {
  /// The requested configuration format has no template.
  #[error("Unsupported config format: {0}")]
  UnsupportedFormat(String),
}

/// Default configuration in TOML, commented so a fresh file explains itself.
pub const DEFAULT_TOML_TEMPLATE: &str = r#"# hon-xml configuration file

# Book root containing the markdown chapters
input_dir = "book"

# Output root for the generated XML tree
output_dir = "build"

# Title of the book, available to templates as `title`
title = "My Book"

# Directory whose page.xhtml, chapter.xhtml and hon.xslt replace the bundled ones
# template_dir = "templates"

# Extra data available to every template
[data]
# author = "Jane Doe"

[xml]
# Whether the XML stage runs at all
enabled = true

# Write the pre-transform chapter document next to each output as <name>.input
debug_xml = true

# Append `linebreak_character` after block elements
insert_linebreaks_for_blocks = true

# Separator appended after blocks (U+2029 PARAGRAPH SEPARATOR)
linebreak_character = "\u2029"

# Custom XSLT stylesheet, takes precedence over template_dir/hon.xslt
# xslt_template = "hon.xslt"
"#;

/// Default configuration in JSON.
pub const DEFAULT_JSON_TEMPLATE: &str = r#"{
  "input_dir": "book",
  "output_dir": "build",
  "title": "My Book",
  "data": {},
  "xml": {
    "enabled": true,
    "debug_xml": true,
    "insert_linebreaks_for_blocks": true,
    "linebreak_character": "\u2029"
  }
}
"#;

/// Get the configuration template for the requested format.
///
/// # Errors
///
/// Returns an error if the requested format is not supported.
pub fn get_template(format: &str) -> Result<&'static str, TemplateError> {
  match format.to_lowercase().as_str() {
    "toml" => Ok(DEFAULT_TOML_TEMPLATE),
    "json" => Ok(DEFAULT_JSON_TEMPLATE),
    _ => Err(TemplateError::UnsupportedFormat(format.to_string())),
  }
}
