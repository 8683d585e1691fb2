#![allow(clippy::expect_used, clippy::panic, reason = "Fine in tests")]
use std::{
  fs,
  path::{Path, PathBuf},
};

use hon_xml_config::Config;
use hon_xml_render::{
  Book,
  Chapter,
  PathError,
  RenderError,
  Renderer,
  StructuralTransformer,
  build,
};
use tempfile::tempdir;

const FAILING_SHEET: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:message terminate="yes">refusing <xsl:value-of select="//title"/></xsl:message>
  </xsl:template>
</xsl:stylesheet>
"#;

fn write(root: &Path, relative: &str, contents: &str) {
  let path = root.join(relative);
  fs::create_dir_all(path.parent().expect("Path has a parent"))
    .expect("Failed to create dir in test");
  fs::write(path, contents).expect("Failed to write file in test");
}

fn config(input_dir: &Path, output_dir: &Path) -> Config {
  Config {
    input_dir: Some(input_dir.to_path_buf()),
    output_dir: output_dir.to_path_buf(),
    title: "Test Book".to_string(),
    ..Config::default()
  }
}

fn sample_book(root: &Path) {
  write(root, "intro.md", "# Introduction\n\nWelcome to the book.\n");
  write(root, "a/b/chapter.md", "# Deep Chapter\n\nBuried text.\n");
  write(root, "empty.md", "   \n");
}

fn read(path: &Path) -> String {
  fs::read_to_string(path)
    .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()))
}

#[test]
fn test_nested_source_maps_to_mirrored_output() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  let output = temp_dir.path().join("out");
  sample_book(&input);

  let summary = build(&config(&input, &output))
    .expect("Build failed")
    .expect("Stage is enabled");

  assert!(output.join("a/b").is_dir());
  let xml = read(&output.join("a/b/chapter.xml"));
  assert!(xml.starts_with("<?xml"), "{xml}");
  assert!(xml.contains("Buried text."), "{xml}");
  assert!(xml.contains("<title>Deep Chapter</title>"), "{xml}");

  assert_eq!(summary.pages, 2);
  assert!(summary.outputs.contains(&output.join("intro.xml")));
  assert!(summary.outputs.contains(&output.join("a/b/chapter.xml")));
}

#[test]
fn test_debug_xml_writes_pre_transform_document() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  let output = temp_dir.path().join("out");
  sample_book(&input);

  build(&config(&input, &output)).expect("Build failed");

  let debug = read(&output.join("a/b/chapter.input"));
  assert!(debug.contains("<div class=\"part\""), "{debug}");
  assert!(debug.contains("<p class=\"page-title\">Deep Chapter</p>"), "{debug}");
  assert!(debug.contains("<p>Buried text.</p>"), "{debug}");
  assert!(!debug.contains("<chapter"), "{debug}");
}

#[test]
fn test_debug_xml_disabled_writes_only_xml() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  let output = temp_dir.path().join("out");
  sample_book(&input);

  let mut config = config(&input, &output);
  config.xml.debug_xml = false;
  build(&config).expect("Build failed");

  assert!(output.join("a/b/chapter.xml").is_file());
  assert!(!output.join("a/b/chapter.input").exists());
}

#[test]
fn test_linebreak_separator_is_passed_through() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  sample_book(&input);

  let default_out = temp_dir.path().join("default");
  build(&config(&input, &default_out)).expect("Build failed");
  let xml = read(&default_out.join("intro.xml"));
  assert!(xml.contains("Welcome to the book.\u{2029}</p>"), "{xml}");

  let custom_out = temp_dir.path().join("custom");
  let mut custom = config(&input, &custom_out);
  custom.xml.linebreak_character = "<br/>&".to_string();
  build(&custom).expect("Build failed");
  let xml = read(&custom_out.join("intro.xml"));
  assert!(xml.contains("Welcome to the book.&lt;br/&gt;&amp;</p>"), "{xml}");

  let off_out = temp_dir.path().join("off");
  let mut off = config(&input, &off_out);
  off.xml.insert_linebreaks_for_blocks = false;
  build(&off).expect("Build failed");
  let xml = read(&off_out.join("intro.xml"));
  assert!(xml.contains("Welcome to the book.</p>"), "{xml}");
  assert!(!xml.contains('\u{2029}'), "{xml}");
}

#[test]
fn test_rerun_is_byte_identical() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  let output = temp_dir.path().join("out");
  sample_book(&input);
  let config = config(&input, &output);

  build(&config).expect("First build failed");
  let first = read(&output.join("a/b/chapter.xml"));
  let first_input = read(&output.join("intro.input"));

  build(&config).expect("Second build failed");
  assert_eq!(read(&output.join("a/b/chapter.xml")), first);
  assert_eq!(read(&output.join("intro.input")), first_input);
}

#[test]
fn test_missing_stylesheet_fails_before_output() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  let output = temp_dir.path().join("out");
  sample_book(&input);

  let mut config = config(&input, &output);
  config.xml.xslt_template = Some(temp_dir.path().join("missing.xslt"));
  let err = build(&config).expect_err("Build should fail");

  assert!(matches!(err, RenderError::Configuration(_)), "{err}");
  assert!(!output.exists());
}

#[test]
fn test_disabled_stage_writes_nothing() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  let output = temp_dir.path().join("out");
  sample_book(&input);

  let mut config = config(&input, &output);
  config.xml.enabled = false;
  assert_eq!(build(&config).expect("Build failed"), None);
  assert!(!output.exists());
}

#[test]
fn test_failed_transform_keeps_previous_output() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  let output = temp_dir.path().join("out");
  sample_book(&input);
  build(&config(&input, &output)).expect("Build failed");
  let before = read(&output.join("intro.xml"));

  let sheet = temp_dir.path().join("failing.xslt");
  fs::write(&sheet, FAILING_SHEET).expect("Failed to write stylesheet");
  let mut failing = config(&input, &output);
  failing.xml.xslt_template = Some(sheet);

  let err = build(&failing).expect_err("Build should fail");
  assert!(matches!(err, RenderError::Transform { .. }), "{err}");
  assert_eq!(read(&output.join("intro.xml")), before);
  assert!(!output.join("intro.xml.tmp").exists());
}

#[test]
fn test_ambient_data_reaches_templates() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let output = temp_dir.path().join("out");
  let templates = temp_dir.path().join("templates");
  write(
    &templates,
    "page.xhtml",
    "<p class=\"page-title\">{{ page.title }} - {{ edition }}</p>{{ page.content | safe }}",
  );

  let mut config = config(temp_dir.path(), &output);
  config.template_dir = Some(templates);
  config
    .data
    .insert("edition".to_string(), serde_json::Value::from("2nd"));

  let renderer = Renderer::from_config(&config).expect("Renderer setup failed");
  let mut book = Book::new(temp_dir.path(), vec![Chapter::new(
    "Only",
    "only",
    temp_dir.path().join("only.md"),
    "Body.",
  )]);
  renderer.render(&mut book).expect("Render failed");

  let text = book.chapters[0].text.clone().expect("Page was assembled");
  assert!(text.contains("Only - 2nd"), "{text}");
  let xml = read(&output.join("only.xml"));
  assert!(xml.contains("<title>Only - 2nd</title>"), "{xml}");
}

#[test]
fn test_chapter_outside_book_root_is_rejected() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let output = temp_dir.path().join("out");
  let config = config(temp_dir.path(), &output);
  let renderer = Renderer::new(
    StructuralTransformer::from_config(&config).expect("Bundled stylesheet"),
    hon_xml_render::RenderingContext::from_config(&config)
      .expect("Default templates"),
  );

  let mut book = Book::new(temp_dir.path().join("book"), vec![Chapter::new(
    "Stray",
    "stray",
    PathBuf::from("/elsewhere/stray.md"),
    "text",
  )]);
  let err = renderer.render(&mut book).expect_err("Render should fail");
  assert!(matches!(err, RenderError::Path(_)), "{err}");
  assert!(!output.exists());
}

#[test]
fn test_chapters_sharing_an_output_file_are_rejected() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let input = temp_dir.path().join("book");
  let output = temp_dir.path().join("out");
  write(&input, "guide/README.md", "# Guide\n");
  write(&input, "guide/guide.md", "# Also Guide\n");

  let err = build(&config(&input, &output)).expect_err("Build should fail");
  let RenderError::Path(PathError::DuplicateOutput {
    output: file,
    first,
    second,
  }) = &err
  else {
    panic!("Unexpected error: {err}");
  };
  assert_eq!(file, &PathBuf::from("guide/guide.xml"));
  let mut sources = [first.clone(), second.clone()];
  sources.sort();
  assert_eq!(sources, [
    input.join("guide/README.md"),
    input.join("guide/guide.md"),
  ]);
  assert!(!output.join("guide").exists());
}
