use std::fs;

use color_eyre::eyre::{Context, Result, bail};
use hon_xml::cli::{Cli, Commands};
use hon_xml_config::Config;
use log::{LevelFilter, info};

fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse_args();

  // Initialize logging first so we can log during command handling
  env_logger::Builder::new()
    .filter_level(if cli.verbose {
      LevelFilter::Debug
    } else {
      LevelFilter::Info
    })
    .write_style(env_logger::WriteStyle::Always)
    .init();

  match &cli.command {
    Some(Commands::Init {
      output,
      format,
      force,
    }) => {
      if output.exists() && !force {
        bail!(
          "Configuration file already exists: {}. Use --force to overwrite.",
          output.display()
        );
      }

      if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
      {
        fs::create_dir_all(parent).wrap_err_with(|| {
          format!("Failed to create directory: {}", parent.display())
        })?;
        info!("Created directory: {}", parent.display());
      }

      Config::generate_default_config(format, output).wrap_err_with(|| {
        format!("Failed to generate configuration file: {}", output.display())
      })?;

      info!(
        "Configuration file created successfully. Edit it to customize the \
         XML rendering."
      );
      Ok(())
    },

    Some(Commands::Export { output_dir, force }) => {
      Config::export_templates(output_dir, *force).wrap_err_with(|| {
        format!("Failed to export templates to {}", output_dir.display())
      })
    },

    Some(Commands::Build { .. }) | None => build(&cli),
  }
}

/// Main rendering process
fn build(cli: &Cli) -> Result<()> {
  let config = cli.load_config().wrap_err("Failed to load configuration")?;

  if !config.xml.enabled {
    info!("XML rendering is disabled, nothing to do");
    return Ok(());
  }

  if config.input_dir.is_none() {
    bail!(
      "No input directory provided. Use 'hon-xml build --input-dir <DIR>' or \
       set input_dir in a config file."
    );
  }
  config
    .validate_paths()
    .wrap_err("Invalid paths in configuration")?;

  info!("Starting XML rendering...");
  if let Some(summary) =
    hon_xml_render::build(&config).wrap_err("Failed to render book")?
  {
    info!(
      "Rendered {} pages into {} XML files in {}",
      summary.pages,
      summary.outputs.len(),
      config.output_dir.display()
    );
  }

  Ok(())
}
