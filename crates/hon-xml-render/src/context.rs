use std::{
  fs,
  path::{Path, PathBuf},
};

use hon_xml_config::Config;
use hon_xml_templates::{
  CHAPTER_TEMPLATE,
  CHAPTER_TEMPLATE_NAME,
  PAGE_TEMPLATE,
  PAGE_TEMPLATE_NAME,
};
use serde_json::{Map, Value};
use tera::Tera;

use crate::error::{RenderError, Result};

/// Escape interpolated values for markup without touching `/`, which the
/// default escaper turns into an entity.
fn escape_markup(input: &str) -> String {
  html_escape::encode_double_quoted_attribute(input).into_owned()
}

/// State shared by every page and chapter of one render pass: where output
/// goes, the layout templates and the ambient template data.
#[derive(Debug)]
pub struct RenderingContext {
  path: PathBuf,
  tera: Tera,
  data: Map<String, Value>,
}

impl RenderingContext {
  /// Context using the embedded layout templates.
  ///
  /// # Errors
  ///
  /// Returns an error if a template fails to compile.
  pub fn new(
    path: impl Into<PathBuf>,
    data: Map<String, Value>,
  ) -> Result<Self> {
    Self::with_templates(path, data, PAGE_TEMPLATE, CHAPTER_TEMPLATE)
  }

  /// Context using the given page and chapter layouts.
  ///
  /// # Errors
  ///
  /// Returns an error if a template fails to compile.
  pub fn with_templates(
    path: impl Into<PathBuf>,
    data: Map<String, Value>,
    page_template: &str,
    chapter_template: &str,
  ) -> Result<Self> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![".xhtml"]);
    tera.set_escape_fn(escape_markup);
    tera
      .add_raw_templates(vec![
        (PAGE_TEMPLATE_NAME, page_template),
        (CHAPTER_TEMPLATE_NAME, chapter_template),
      ])
      .map_err(|e| RenderError::template("layout templates", e))?;

    Ok(Self {
      path: path.into(),
      tera,
      data,
    })
  }

  /// Context for `config`: output into `output_dir`, layouts from
  /// `template_dir` where present, ambient data from `title` and `data`.
  ///
  /// # Errors
  ///
  /// Returns an error if a custom template cannot be read or a template fails
  /// to compile.
  pub fn from_config(config: &Config) -> Result<Self> {
    let page = load_template(config, PAGE_TEMPLATE_NAME, PAGE_TEMPLATE)?;
    let chapter =
      load_template(config, CHAPTER_TEMPLATE_NAME, CHAPTER_TEMPLATE)?;
    Self::with_templates(
      &config.output_dir,
      config.template_data(),
      &page,
      &chapter,
    )
  }

  /// Output root.
  #[must_use]
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Ambient data merged into every template invocation.
  #[must_use]
  pub const fn data(&self) -> &Map<String, Value> {
    &self.data
  }

  /// Render the layout template `name` with `data` updated by the ambient
  /// data. Ambient keys win on conflict.
  ///
  /// # Errors
  ///
  /// Returns an error if rendering fails.
  pub fn render(
    &self,
    name: &str,
    mut data: Map<String, Value>,
  ) -> Result<String> {
    data.extend(self.data.clone());
    let context = tera::Context::from_value(Value::Object(data))
      .map_err(|e| RenderError::template(name, e))?;
    self
      .tera
      .render(name, &context)
      .map_err(|e| RenderError::template(name, e))
  }
}

fn load_template(
  config: &Config,
  name: &str,
  fallback: &str,
) -> Result<String> {
  match config.get_template_file(name) {
    Some(path) => {
      log::debug!("Using custom template: {}", path.display());
      fs::read_to_string(&path)
        .map_err(|source| RenderError::Read { path, source })
    },
    None => Ok(fallback.to_string()),
  }
}
