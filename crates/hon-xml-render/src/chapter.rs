//! Chapter documents and their structural transform into XML.
use std::path::PathBuf;

use hon_xml_config::{Config, XmlConfig};
use hon_xml_templates::{CHAPTER_TEMPLATE_NAME, XSLT_TEMPLATE, XSLT_TEMPLATE_NAME};
use hon_xml_xslt::{Parameters, Stylesheet, Value as XsltValue, XsltError, parse_html};
use serde_json::{Map, Value, json};

use crate::{
  book::{Book, Chapter},
  context::RenderingContext,
  error::{RenderError, Result},
  paths,
};

/// A chapter followed by all of its descendants in local document order.
#[must_use]
pub fn collect_parts(chapter: &Chapter) -> Vec<&Chapter> {
  let mut parts = vec![chapter];
  for child in &chapter.children {
    parts.extend(collect_parts(child));
  }
  parts
}

/// Turns assembled chapters into XML files with a compiled stylesheet.
#[derive(Debug)]
pub struct StructuralTransformer {
  stylesheet:    Stylesheet,
  debug_xml:     bool,
  add_linebreak: bool,
  linebreak:     String,
}

impl StructuralTransformer {
  #[must_use]
  pub fn new(stylesheet: Stylesheet, options: &XmlConfig) -> Self {
    Self {
      stylesheet,
      debug_xml: options.debug_xml,
      add_linebreak: options.insert_linebreaks_for_blocks,
      linebreak: options.linebreak_character.clone(),
    }
  }

  /// Load the stylesheet selected by `config`: `xml.xslt_template`, then
  /// `hon.xslt` in `template_dir`, then the bundled one.
  ///
  /// # Errors
  ///
  /// Returns [`RenderError::Configuration`] if a configured stylesheet is not
  /// a file or fails to compile.
  pub fn from_config(config: &Config) -> Result<Self> {
    let configured = config
      .xml
      .xslt_template
      .clone()
      .or_else(|| config.get_template_file(XSLT_TEMPLATE_NAME));

    let stylesheet = match configured {
      Some(path) => {
        log::debug!("Loading XSLT from {}", path.display());
        Stylesheet::from_file(&path).map_err(|e| {
          match e {
            XsltError::NotFound(path) => {
              RenderError::Configuration(format!(
                "Unable to find the XSLT file: {}",
                path.display()
              ))
            },
            other => {
              RenderError::Configuration(format!(
                "Failed to load XSLT {}: {other}",
                path.display()
              ))
            },
          }
        })?
      },
      None => {
        Stylesheet::parse(XSLT_TEMPLATE).map_err(|e| {
          RenderError::Configuration(format!("Bundled XSLT is invalid: {e}"))
        })?
      },
    };

    Ok(Self::new(stylesheet, &config.xml))
  }

  /// Parameters handed to the stylesheet: `add_linebreak` as a boolean and
  /// `linebreak` as an unmodified string.
  #[must_use]
  pub fn parameters(&self) -> Parameters {
    Parameters::new()
      .with("add_linebreak", XsltValue::Boolean(self.add_linebreak))
      .with("linebreak", XsltValue::String(self.linebreak.clone()))
  }

  /// Render `chapter.xhtml` over the chapter's parts and transform it.
  /// Returns the pre-transform document and the serialised XML.
  ///
  /// # Errors
  ///
  /// Returns an error if the template fails to render or the transform fails.
  pub fn transform_chapter(
    &self,
    chapter: &Chapter,
    context: &RenderingContext,
  ) -> Result<(String, String)> {
    let parts: Vec<Value> = collect_parts(chapter)
      .into_iter()
      .map(|part| {
        json!({
          "title": part.name,
          "filename": part.filename,
          "text": part.text,
        })
      })
      .collect();

    let mut data = Map::new();
    data.insert("chapter".to_string(), json!({ "title": chapter.name }));
    data.insert("parts".to_string(), Value::Array(parts));
    let input = context.render(CHAPTER_TEMPLATE_NAME, data)?;

    let document = parse_html(&input);
    let output = self
      .stylesheet
      .transform(&document, &self.parameters())
      .map_err(|source| {
        RenderError::Transform {
          chapter: chapter.filename.clone(),
          source,
        }
      })?;

    Ok((input, output.serialize()))
  }

  /// Write `<filename>.xml` for `chapter` into the mirrored output
  /// directory, plus `<filename>.input` when debugging is enabled. Returns the
  /// path of the XML file.
  ///
  /// # Errors
  ///
  /// Returns an error if the output directory cannot be created, the chapter
  /// fails to render or transform, or a file cannot be written. Everything
  /// after the directory is created is logged with the chapter before being
  /// returned.
  pub fn render_chapter(
    &self,
    chapter: &Chapter,
    book: &Book,
    context: &RenderingContext,
  ) -> Result<PathBuf> {
    let output_dir =
      paths::output_dir_for(&chapter.path, book.root(), context.path())?;
    let write_to = output_dir.join(format!("{}.xml", chapter.filename));

    self
      .transform_chapter(chapter, context)
      .and_then(|(input, xml)| {
        paths::write_atomic(&write_to, &xml)?;
        log::debug!("Wrote {}", write_to.display());

        if self.debug_xml {
          let debug_path =
            output_dir.join(format!("{}.input", chapter.filename));
          paths::write_atomic(&debug_path, &input)?;
          log::debug!("Wrote {}", debug_path.display());
        }
        Ok(())
      })
      .inspect_err(|e| {
        log::error!("Failed to write: {}: {e}", chapter.filename);
      })?;

    Ok(write_to)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use std::fs;

  use super::*;

  #[test]
  fn parts_are_local_pre_order() {
    let chapter = Chapter::new("a", "a", "/book/a.md", "").with_children(vec![
      Chapter::new("a1", "a1", "/book/a/a1.md", "")
        .with_children(vec![Chapter::new("a1x", "a1x", "/book/a/a1/a1x.md", "")]),
      Chapter::new("a2", "a2", "/book/a/a2.md", ""),
    ]);
    let names: Vec<_> = collect_parts(&chapter)
      .into_iter()
      .map(|c| c.name.as_str())
      .collect();
    assert_eq!(names, ["a", "a1", "a1x", "a2"]);
    assert_eq!(
      collect_parts(&chapter.children[1])
        .into_iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>(),
      ["a2"]
    );
  }

  #[test]
  fn parameters_follow_options() {
    let options = XmlConfig {
      insert_linebreaks_for_blocks: false,
      linebreak_character: "\u{2028}".to_string(),
      ..XmlConfig::default()
    };
    let transformer = StructuralTransformer::new(
      Stylesheet::parse(XSLT_TEMPLATE).unwrap(),
      &options,
    );
    let params = transformer.parameters();
    assert_eq!(
      params.get("add_linebreak"),
      Some(&XsltValue::Boolean(false))
    );
    assert_eq!(
      params.get("linebreak"),
      Some(&XsltValue::String("\u{2028}".to_string()))
    );
  }

  #[test]
  fn missing_stylesheet_is_a_configuration_error() {
    let mut config = Config::default();
    config.xml.xslt_template = Some(PathBuf::from("/nonexistent/hon.xslt"));
    let err = StructuralTransformer::from_config(&config).unwrap_err();
    assert!(matches!(err, RenderError::Configuration(_)));
    assert!(err.to_string().contains("/nonexistent/hon.xslt"));
  }

  #[test]
  fn stylesheet_from_template_dir_is_used() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
      dir.path().join(XSLT_TEMPLATE_NAME),
      r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:output omit-xml-declaration="yes"/>
  <xsl:template match="/"><custom/></xsl:template>
</xsl:stylesheet>"#,
    )
    .unwrap();

    let config = Config {
      template_dir: Some(dir.path().to_path_buf()),
      ..Config::default()
    };
    let transformer = StructuralTransformer::from_config(&config).unwrap();
    let context = RenderingContext::new("/out", Map::new()).unwrap();
    let chapter = Chapter::new("T", "t", "/book/t.md", "");
    let (_, xml) = transformer.transform_chapter(&chapter, &context).unwrap();
    assert_eq!(xml, "<custom/>\n");
  }

  #[test]
  fn bundled_stylesheet_emits_parts() {
    let config = Config::default();
    let transformer = StructuralTransformer::from_config(&config).unwrap();
    let context = RenderingContext::new("/out", Map::new()).unwrap();

    let mut chapter = Chapter::new("Guide", "guide", "/book/guide.md", "");
    chapter.text = Some("<p>Hello</p>".to_string());
    let (input, xml) = transformer.transform_chapter(&chapter, &context).unwrap();

    assert!(input.contains("<title>Guide</title>"), "{input}");
    assert!(xml.contains("<chapter title=\"Guide\">"), "{xml}");
    assert!(
      xml.contains("<part title=\"Guide\" filename=\"guide\"><p>Hello\u{2029}</p></part>"),
      "{xml}"
    );
  }
  #[test]
  fn debug_input_write_failure_is_a_path_error() {
    let out = tempfile::tempdir().unwrap();
    // A directory in the way makes the rename onto `intro.input` fail.
    fs::create_dir_all(out.path().join("intro.input/blocker")).unwrap();

    let options = XmlConfig {
      debug_xml: true,
      ..XmlConfig::default()
    };
    let transformer = StructuralTransformer::new(
      Stylesheet::parse(XSLT_TEMPLATE).unwrap(),
      &options,
    );
    let context = RenderingContext::new(out.path(), Map::new()).unwrap();
    let book = Book::new("/book", vec![Chapter::new(
      "Intro",
      "intro",
      "/book/intro.md",
      "",
    )]);

    let err = transformer
      .render_chapter(&book.chapters[0], &book, &context)
      .unwrap_err();
    assert!(
      matches!(err, RenderError::Path(crate::error::PathError::Write { ref path, .. }) if path.ends_with("intro.input")),
      "{err}"
    );
    assert!(out.path().join("intro.xml").is_file());
  }
}
