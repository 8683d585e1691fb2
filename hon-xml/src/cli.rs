use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hon_xml_config::{Config, ConfigError};

/// Command line interface for hon-xml
#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "hon-xml: render a book of markdown chapters into XML"
)]
pub struct Cli {
  /// Subcommand to execute (see [`Commands`])
  #[command(subcommand)]
  pub command: Option<Commands>,

  /// Enable verbose debug logging
  #[arg(short, long, global = true)]
  pub verbose: bool,

  /// Path to configuration file(s) (TOML or JSON, can be specified multiple
  /// times). Multiple files are merged in order, with later files overriding
  /// earlier ones
  #[arg(short = 'c', long = "config-file", action = clap::ArgAction::Append, global = true)]
  pub config_files: Vec<PathBuf>,

  /// Override configuration values (KEY=VALUE format, can be used multiple
  /// times)
  #[arg(long = "config", action = clap::ArgAction::Append, global = true)]
  pub config_overrides: Vec<String>,
}

/// All supported subcommands for the hon-xml CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Render the book into XML.
  Build {
    /// Path to the book root containing markdown files.
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Output directory for the generated XML tree.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Path to a custom XSLT stylesheet.
    #[arg(short = 'x', long)]
    xslt: Option<PathBuf>,

    /// Write each chapter's pre-transform document next to its XML output.
    #[arg(long = "debug-xml", value_name = "BOOL")]
    debug_xml: Option<bool>,

    /// Path to a directory whose page.xhtml, chapter.xhtml and hon.xslt
    /// override the built-in ones.
    #[arg(long = "template-dir")]
    template_dir: Option<PathBuf>,
  },

  /// Initialize a new hon-xml configuration file
  Init {
    /// Path to create the configuration file at
    #[arg(short, long, default_value = "hon-xml.toml")]
    output: PathBuf,

    /// Format of the configuration file.
    #[arg(short = 'F', long, default_value = "toml", value_parser = ["toml", "json"])]
    format: String,

    /// Force overwrite if file already exists
    #[arg(short, long)]
    force: bool,
  },

  /// Export default templates to a directory for customization.
  Export {
    /// Output directory for template files.
    #[arg(short, long, default_value = "templates")]
    output_dir: PathBuf,

    /// Whether to overwrite existing files.
    #[arg(long)]
    force: bool,
  },
}

impl Cli {
  /// Parse command line arguments into a [`Cli`] struct.
  #[must_use]
  pub fn parse_args() -> Self {
    Self::parse()
  }

  /// Load the configuration: config files (or a discovered one), then
  /// `--config` overrides, then the options of the `build` subcommand.
  ///
  /// # Errors
  ///
  /// Returns an error if a config file cannot be loaded or an override is
  /// invalid.
  pub fn load_config(&self) -> Result<Config, ConfigError> {
    let mut config = Config::load(&self.config_files, &self.config_overrides)?;
    self.merge_into(&mut config);
    Ok(config)
  }

  /// Apply the options of the `build` subcommand to `config`.
  pub fn merge_into(&self, config: &mut Config) {
    if let Some(Commands::Build {
      input_dir,
      output_dir,
      xslt,
      debug_xml,
      template_dir,
    }) = &self.command
    {
      if let Some(input_dir) = input_dir {
        config.input_dir = Some(input_dir.clone());
      }

      if let Some(output_dir) = output_dir {
        config.output_dir.clone_from(output_dir);
      }

      if let Some(xslt) = xslt {
        config.xml.xslt_template = Some(xslt.clone());
      }

      if let Some(debug_xml) = debug_xml {
        config.xml.debug_xml = *debug_xml;
      }

      if let Some(template_dir) = template_dir {
        config.template_dir = Some(template_dir.clone());
      }
    }
  }
}
