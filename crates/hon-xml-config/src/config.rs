use std::{
  collections::HashMap,
  fs,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::ConfigError, xml::XmlConfig};

/// File names searched for, in order, when no configuration file is given.
const CONFIG_FILENAMES: &[&str] = &[
  "hon-xml.toml",
  "hon-xml.json",
  ".hon-xml.toml",
  ".hon-xml.json",
  ".config/hon-xml.toml",
  ".config/hon-xml.json",
];

/// Configuration for the hon-xml renderer.
///
/// [`Config`] holds the book location, the output location, template
/// customisation, ambient template data and the options of the XML stage.
/// Fields are typically loaded from a TOML or JSON config file, but can also
/// be set via CLI arguments and `--config KEY=VALUE` overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Book root containing the markdown sources.
  pub input_dir: Option<PathBuf>,

  /// Output root the XML tree is written to.
  pub output_dir: PathBuf,

  /// Title of the book, available to every template as `title`.
  pub title: String,

  /// Directory whose `page.xhtml`, `chapter.xhtml` and `hon.xslt` replace the
  /// embedded ones.
  pub template_dir: Option<PathBuf>,

  /// Free-form data merged into every template invocation.
  pub data: Map<String, Value>,

  /// Options of the XML stage.
  pub xml: XmlConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      input_dir:    None,
      output_dir:   PathBuf::from("build"),
      title:        "hon book".to_string(),
      template_dir: None,
      data:         Map::new(),
      xml:          XmlConfig::default(),
    }
  }
}

/// Parse a boolean override value.
fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
  match value.to_lowercase().as_str() {
    "true" | "yes" | "1" | "on" => Ok(true),
    "false" | "no" | "0" | "off" => Ok(false),
    _ => {
      Err(ConfigError::Config(format!(
        "Invalid boolean value for '{key}': '{value}'. Expected true/false, \
         yes/no, on/off, or 1/0"
      )))
    },
  }
}

/// An empty override value clears an optional path.
fn parse_optional_path(value: &str) -> Option<PathBuf> {
  (!value.is_empty()).then(|| PathBuf::from(value))
}

impl Config {
  /// Load configuration from a file (TOML or JSON).
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if the format is
  /// unsupported.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content =
      fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
      })?;

    let extension = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(str::to_lowercase);
    match extension.as_deref() {
      Some("json") => {
        serde_json::from_str(&content).map_err(|source| {
          ConfigError::Serde {
            path: path.to_path_buf(),
            source,
          }
        })
      },
      Some("toml") => {
        toml::from_str(&content).map_err(|source| {
          ConfigError::Toml {
            path: path.to_path_buf(),
            source,
          }
        })
      },
      Some(_) => {
        Err(ConfigError::Config(format!(
          "Unsupported config file format: {}",
          path.display()
        )))
      },
      None => {
        Err(ConfigError::Config(format!(
          "Config file has no extension: {}",
          path.display()
        )))
      },
    }
  }

  /// Load configuration from files, then apply `KEY=VALUE` overrides.
  ///
  /// Explicit files are merged in order. Without any, a configuration file
  /// is looked up in the current directory, falling back to the defaults.
  ///
  /// # Errors
  ///
  /// Returns an error if a file cannot be loaded or an override is invalid.
  pub fn load(
    config_files: &[PathBuf],
    config_overrides: &[String],
  ) -> Result<Self, ConfigError> {
    let mut config = if let Some((first, rest)) = config_files.split_first() {
      let mut merged = Self::from_file(first)?;
      for path in rest {
        merged.merge(Self::from_file(path)?);
      }
      if config_files.len() > 1 {
        log::info!("Loaded and merged {} config files", config_files.len());
      }
      merged
    } else if let Some(discovered) = Self::find_config_file() {
      log::info!("Using discovered config file: {}", discovered.display());
      Self::from_file(&discovered)?
    } else {
      Self::default()
    };

    config.apply_overrides(config_overrides)?;
    Ok(config)
  }

  /// Merge another config into this one, with the other config's values taking
  /// precedence.
  ///
  /// [`Option`] fields are only replaced by [`Some`], `data` entries are
  /// merged key by key, everything else is replaced.
  pub fn merge(&mut self, other: Self) {
    if other.input_dir.is_some() {
      self.input_dir = other.input_dir;
    }
    self.output_dir = other.output_dir;
    self.title = other.title;
    if other.template_dir.is_some() {
      self.template_dir = other.template_dir;
    }
    self.data.extend(other.data);
    self.xml.merge(other.xml);
  }

  /// Apply configuration overrides from KEY=VALUE strings.
  ///
  /// # Errors
  ///
  /// Returns an error if an override is not in KEY=VALUE format, names an
  /// unknown key, or carries a value of the wrong type.
  pub fn apply_overrides(
    &mut self,
    overrides: &[String],
  ) -> Result<(), ConfigError> {
    for override_str in overrides {
      let (key, value) = override_str.split_once('=').ok_or_else(|| {
        ConfigError::Config(format!(
          "Invalid config override format: '{override_str}'. Expected \
           KEY=VALUE"
        ))
      })?;

      self.apply_override(key.trim(), value.trim())?;
    }

    Ok(())
  }

  /// Apply a single override.
  ///
  /// Keys under `data.` set string entries of the ambient template data.
  ///
  /// # Errors
  ///
  /// Returns an error for unknown keys and invalid boolean values.
  pub fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    match key {
      "input_dir" => self.input_dir = parse_optional_path(value),
      "output_dir" => self.output_dir = PathBuf::from(value),
      "title" => self.title = value.to_string(),
      "template_dir" => self.template_dir = parse_optional_path(value),
      "xml.enabled" => self.xml.enabled = parse_bool(key, value)?,
      "xml.debug_xml" => self.xml.debug_xml = parse_bool(key, value)?,
      "xml.insert_linebreaks_for_blocks" => {
        self.xml.insert_linebreaks_for_blocks = parse_bool(key, value)?;
      },
      "xml.linebreak_character" => {
        self.xml.linebreak_character = value.to_string();
      },
      "xml.xslt_template" => {
        self.xml.xslt_template = parse_optional_path(value);
      },
      _ => {
        if let Some(name) = key.strip_prefix("data.")
          && !name.is_empty()
        {
          self
            .data
            .insert(name.to_string(), Value::String(value.to_string()));
          return Ok(());
        }
        return Err(ConfigError::Config(format!(
          "Unknown configuration key: '{key}'. See documentation for \
           supported keys."
        )));
      },
    }
    Ok(())
  }

  /// Data merged into every template invocation: the book `title` followed
  /// by the free-form `data` table, which may override it.
  #[must_use]
  pub fn template_data(&self) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("title".to_string(), Value::String(self.title.clone()));
    data.extend(self.data.clone());
    data
  }

  /// Get the path to a template file in `template_dir`, if that directory is
  /// configured and holds a file with this name.
  #[must_use]
  pub fn get_template_file(&self, name: &str) -> Option<PathBuf> {
    self
      .template_dir
      .as_ref()
      .map(|dir| dir.join(name))
      .filter(|path| path.is_file())
  }

  /// Search for config files in the current directory.
  #[must_use]
  pub fn find_config_file() -> Option<PathBuf> {
    let current_dir = std::env::current_dir().ok()?;
    Self::find_config_file_in(&current_dir)
  }

  /// Search for config files in `dir`.
  #[must_use]
  pub fn find_config_file_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
      .iter()
      .map(|filename| dir.join(filename))
      .find(|path| path.is_file())
  }

  /// Validate all paths specified in the configuration.
  ///
  /// # Errors
  ///
  /// Returns an error if any configured path does not exist or is invalid.
  pub fn validate_paths(&self) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if let Some(ref input_dir) = self.input_dir
      && !input_dir.is_dir()
    {
      errors.push(format!(
        "Input directory does not exist: {}",
        input_dir.display()
      ));
    }

    if let Some(ref template_dir) = self.template_dir
      && !template_dir.is_dir()
    {
      errors.push(format!(
        "Template directory does not exist: {}",
        template_dir.display()
      ));
    }

    if let Some(ref xslt) = self.xml.xslt_template
      && !xslt.is_file()
    {
      errors.push(format!(
        "XSLT template is not a file: {}",
        xslt.display()
      ));
    }

    if !errors.is_empty() {
      let error_message = errors.join("\n");
      return Err(ConfigError::Config(format!(
        "Configuration path validation errors:\n{error_message}"
      )));
    }

    Ok(())
  }

  /// Generate a default configuration file with commented explanations.
  ///
  /// # Errors
  ///
  /// Returns an error if the format is unsupported or the file cannot be
  /// written.
  pub fn generate_default_config(
    format: &str,
    path: &Path,
  ) -> Result<(), ConfigError> {
    let config_content = crate::templates::get_template(format)
      .map_err(|e| ConfigError::Template(e.to_string()))?;

    fs::write(path, config_content).map_err(|e| {
      ConfigError::Config(format!(
        "Failed to write default config to {}: {}",
        path.display(),
        e
      ))
    })?;

    log::info!("Created default configuration file: {}", path.display());
    Ok(())
  }

  /// Export embedded templates to a directory for customization.
  ///
  /// Existing files are kept unless `force` is set.
  ///
  /// # Errors
  ///
  /// Returns an error if the output directory cannot be created or a template
  /// cannot be written.
  pub fn export_templates(
    output_dir: &Path,
    force: bool,
  ) -> Result<(), ConfigError> {
    fs::create_dir_all(output_dir).map_err(|e| {
      ConfigError::Config(format!(
        "Failed to create template directory: {}: {}",
        output_dir.display(),
        e
      ))
    })?;

    let mut templates: Vec<(&str, &str)> =
      Self::get_template_sources().into_iter().collect();
    templates.sort_unstable();

    for (filename, content) in templates {
      let file_path = output_dir.join(filename);

      if file_path.exists() && !force {
        log::warn!(
          "File {} already exists. Use --force to overwrite.",
          file_path.display()
        );
        continue;
      }

      fs::write(&file_path, content).map_err(|e| {
        ConfigError::Config(format!(
          "Failed to write template file: {}: {}",
          file_path.display(),
          e
        ))
      })?;
      log::info!("Exported template: {}", file_path.display());
    }

    Ok(())
  }

  /// Get mapping of template filenames to their embedded content
  fn get_template_sources() -> HashMap<&'static str, &'static str> {
    hon_xml_templates::all_templates()
  }
}

#[cfg(test)]
mod tests {
  #![allow(
    clippy::unwrap_used,
    clippy::field_reassign_with_default,
    reason = "Fine in tests"
  )]

  use super::*;

  #[test]
  fn test_from_file_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hon-xml.toml");
    fs::write(
      &path,
      r#"
input_dir = "book"
title = "Guide"

[data]
author = "Someone"

[xml]
debug_xml = false
linebreak_character = "\n"
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.input_dir, Some(PathBuf::from("book")));
    assert_eq!(config.output_dir, PathBuf::from("build"));
    assert_eq!(config.title, "Guide");
    assert_eq!(config.data.get("author"), Some(&Value::from("Someone")));
    assert!(!config.xml.debug_xml);
    assert!(config.xml.enabled);
    assert_eq!(config.xml.linebreak_character, "\n");
  }

  #[test]
  fn test_from_file_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hon-xml.json");
    fs::write(
      &path,
      r#"{ "output_dir": "out", "xml": { "insert_linebreaks_for_blocks": false } }"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.output_dir, PathBuf::from("out"));
    assert!(!config.xml.insert_linebreaks_for_blocks);
    assert_eq!(config.xml.linebreak_character, "\u{2029}");
  }

  #[test]
  fn test_from_file_rejects_unknown_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hon-xml.yaml");
    fs::write(&path, "title: x").unwrap();
    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Unsupported config file format"));
  }

  #[test]
  fn test_from_file_reports_typed_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.toml");
    let err = Config::from_file(&missing).unwrap_err();
    assert!(matches!(&err, ConfigError::Io { path, .. } if *path == missing));

    let toml_path = dir.path().join("broken.toml");
    fs::write(&toml_path, "title = ").unwrap();
    let err = Config::from_file(&toml_path).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }), "{err}");
    assert!(err.to_string().contains("broken.toml"));

    let json_path = dir.path().join("broken.json");
    fs::write(&json_path, "{ \"title\": ").unwrap();
    let err = Config::from_file(&json_path).unwrap_err();
    assert!(matches!(err, ConfigError::Serde { .. }), "{err}");
  }

  #[test]
  fn test_load_merges_files_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.toml");
    let second = dir.path().join("b.toml");
    fs::write(&first, "input_dir = \"book\"\n[data]\na = \"1\"\nb = \"1\"\n")
      .unwrap();
    fs::write(&second, "title = \"Second\"\n[data]\nb = \"2\"\n").unwrap();

    let config =
      Config::load(&[first, second], &["xml.enabled=off".to_string()])
        .unwrap();
    assert_eq!(config.input_dir, Some(PathBuf::from("book")));
    assert_eq!(config.title, "Second");
    assert_eq!(config.data.get("a"), Some(&Value::from("1")));
    assert_eq!(config.data.get("b"), Some(&Value::from("2")));
    assert!(!config.xml.enabled);
  }

  #[test]
  fn test_apply_overrides_boolean() {
    let mut config = Config::default();
    config
      .apply_overrides(&[
        "xml.debug_xml=no".to_string(),
        "xml.insert_linebreaks_for_blocks=0".to_string(),
        "xml.enabled=yes".to_string(),
      ])
      .unwrap();
    assert!(!config.xml.debug_xml);
    assert!(!config.xml.insert_linebreaks_for_blocks);
    assert!(config.xml.enabled);
  }

  #[test]
  fn test_apply_overrides_paths_and_strings() {
    let mut config = Config::default();
    config
      .apply_overrides(&[
        "output_dir=/tmp/output".to_string(),
        "input_dir=/tmp/input".to_string(),
        "xml.xslt_template=custom.xslt".to_string(),
        "title=My Book".to_string(),
        "data.edition=2nd".to_string(),
      ])
      .unwrap();
    assert_eq!(config.output_dir, PathBuf::from("/tmp/output"));
    assert_eq!(config.input_dir, Some(PathBuf::from("/tmp/input")));
    assert_eq!(config.xml.xslt_template, Some(PathBuf::from("custom.xslt")));
    assert_eq!(config.title, "My Book");
    assert_eq!(config.data.get("edition"), Some(&Value::from("2nd")));

    config.apply_override("xml.xslt_template", "").unwrap();
    assert_eq!(config.xml.xslt_template, None);
  }

  #[test]
  fn test_apply_overrides_invalid_format() {
    let mut config = Config::default();
    let result = config.apply_overrides(&["no_equals_sign".to_string()]);
    assert!(
      result
        .unwrap_err()
        .to_string()
        .contains("Expected KEY=VALUE")
    );
  }

  #[test]
  fn test_apply_overrides_unknown_key() {
    let mut config = Config::default();
    let result = config.apply_overrides(&["unknown_key=value".to_string()]);
    assert!(
      result
        .unwrap_err()
        .to_string()
        .contains("Unknown configuration key")
    );
  }

  #[test]
  fn test_apply_overrides_invalid_boolean() {
    let mut config = Config::default();
    let result = config.apply_overrides(&["xml.enabled=maybe".to_string()]);
    assert!(result.unwrap_err().to_string().contains("Invalid boolean"));
  }

  #[test]
  fn test_template_data_lets_data_override_title() {
    let mut config = Config::default();
    config.title = "Book".to_string();
    assert_eq!(config.template_data().get("title"), Some(&Value::from("Book")));

    config
      .data
      .insert("title".to_string(), Value::from("Overridden"));
    assert_eq!(
      config.template_data().get("title"),
      Some(&Value::from("Overridden"))
    );
  }

  #[test]
  fn test_find_config_file_in() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(Config::find_config_file_in(dir.path()), None);

    fs::create_dir_all(dir.path().join(".config")).unwrap();
    fs::write(dir.path().join(".config/hon-xml.toml"), "").unwrap();
    assert_eq!(
      Config::find_config_file_in(dir.path()),
      Some(dir.path().join(".config/hon-xml.toml"))
    );

    fs::write(dir.path().join("hon-xml.json"), "{}").unwrap();
    assert_eq!(
      Config::find_config_file_in(dir.path()),
      Some(dir.path().join("hon-xml.json"))
    );
  }

  #[test]
  fn test_get_template_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("page.xhtml"), "<p/>").unwrap();

    let mut config = Config::default();
    assert_eq!(config.get_template_file("page.xhtml"), None);

    config.template_dir = Some(dir.path().to_path_buf());
    assert_eq!(
      config.get_template_file("page.xhtml"),
      Some(dir.path().join("page.xhtml"))
    );
    assert_eq!(config.get_template_file("chapter.xhtml"), None);
  }

  #[test]
  fn test_validate_paths_reports_missing_stylesheet() {
    let mut config = Config::default();
    config.xml.xslt_template = Some(PathBuf::from("/nonexistent/hon.xslt"));
    let err = config.validate_paths().unwrap_err();
    assert!(err.to_string().contains("XSLT template is not a file"));
  }

  #[test]
  fn test_default_config_templates_parse() {
    let dir = tempfile::tempdir().unwrap();
    for format in ["toml", "json"] {
      let path = dir.path().join(format!("hon-xml.{format}"));
      Config::generate_default_config(format, &path).unwrap();
      let config = Config::from_file(&path).unwrap();
      assert!(config.xml.enabled);
      assert_eq!(config.xml.linebreak_character, "\u{2029}");
    }
    assert!(Config::generate_default_config("yaml", &dir.path().join("x")).is_err());
  }

  #[test]
  fn test_export_templates_respects_force() {
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("page.xhtml");
    fs::write(&page, "custom").unwrap();

    Config::export_templates(dir.path(), false).unwrap();
    assert_eq!(fs::read_to_string(&page).unwrap(), "custom");
    assert!(dir.path().join("chapter.xhtml").is_file());
    assert!(dir.path().join("hon.xslt").is_file());

    Config::export_templates(dir.path(), true).unwrap();
    assert_eq!(
      fs::read_to_string(&page).unwrap(),
      hon_xml_templates::PAGE_TEMPLATE
    );
  }
}
