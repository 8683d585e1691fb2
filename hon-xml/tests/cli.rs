#![allow(clippy::expect_used, clippy::panic, reason = "Fine in tests")]
use std::{fs, path::PathBuf};

use clap::Parser;
use hon_xml::cli::{Cli, Commands};
use hon_xml_config::Config;
use tempfile::tempdir;

#[test]
fn test_build_arguments_override_config_file() {
  let temp_dir = tempdir().expect("Failed to create temp dir in test");
  let config_path = temp_dir.path().join("hon-xml.toml");
  fs::write(
    &config_path,
    "input_dir = \"from-file\"\noutput_dir = \"file-out\"\n[xml]\ndebug_xml = \
     true\n",
  )
  .expect("Failed to write config in test");

  let cli = Cli::try_parse_from([
    "hon-xml",
    "--config-file",
    config_path.to_str().expect("UTF-8 temp path"),
    "--config",
    "xml.insert_linebreaks_for_blocks=off",
    "build",
    "--output-dir",
    "cli-out",
    "--xslt",
    "custom.xslt",
    "--debug-xml",
    "false",
  ])
  .expect("Failed to parse arguments");

  let config = cli.load_config().expect("Failed to load config");
  assert_eq!(config.input_dir, Some(PathBuf::from("from-file")));
  assert_eq!(config.output_dir, PathBuf::from("cli-out"));
  assert_eq!(config.xml.xslt_template, Some(PathBuf::from("custom.xslt")));
  assert!(!config.xml.debug_xml);
  assert!(!config.xml.insert_linebreaks_for_blocks);
}

#[test]
fn test_global_flags_after_subcommand() {
  let cli = Cli::try_parse_from([
    "hon-xml",
    "build",
    "--verbose",
    "--config",
    "title=Late",
  ])
  .expect("Failed to parse arguments");
  assert!(cli.verbose);
  assert_eq!(cli.config_overrides, ["title=Late"]);
}

#[test]
fn test_merge_into_leaves_unset_options_alone() {
  let cli = Cli::try_parse_from(["hon-xml", "build", "--input-dir", "book"])
    .expect("Failed to parse arguments");

  let mut config = Config::default();
  config.xml.debug_xml = false;
  cli.merge_into(&mut config);

  assert_eq!(config.input_dir, Some(PathBuf::from("book")));
  assert_eq!(config.output_dir, PathBuf::from("build"));
  assert!(!config.xml.debug_xml);
  assert_eq!(config.template_dir, None);
}

#[test]
fn test_init_defaults() {
  let cli =
    Cli::try_parse_from(["hon-xml", "init"]).expect("Failed to parse arguments");
  match cli.command {
    Some(Commands::Init {
      output,
      format,
      force,
    }) => {
      assert_eq!(output, PathBuf::from("hon-xml.toml"));
      assert_eq!(format, "toml");
      assert!(!force);
    },
    other => panic!("Unexpected command: {other:?}"),
  }
}

#[test]
fn test_init_rejects_unknown_format() {
  assert!(Cli::try_parse_from(["hon-xml", "init", "--format", "yaml"]).is_err());
}
