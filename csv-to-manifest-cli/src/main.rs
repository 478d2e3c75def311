use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csv_to_manifest::{LoadManifest, Processor};
use manifest::{Template, BASIC_MANIFEST, FULL_MANIFEST};
use std::{fs, path::PathBuf};
use tracing::{info, warn, Level};

mod manifest;

/// CSV to Manifest Processor
/// Synthesizes load-ready JSON manifests from CSV files based on templates
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output for detailed processing information
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate manifests for every mapping in a load manifest
    Process {
        /// Path to the load manifest that pairs templates with CSV files
        #[arg(short, long, value_name = "PATH TO LOAD MANIFEST")]
        manifest: PathBuf,

        /// Output directory for generated manifest files
        #[arg(short, long, value_name = "OUTPUT DIRECTORY PATH")]
        output: Option<PathBuf>,
    },
    /// Generate a load manifest template
    GenerateManifest {
        /// Type of load manifest template to generate (basic/full)
        #[arg(short = 't', long = "type", default_value = "basic")]
        template_type: String,

        /// Output path for the generated load manifest
        #[arg(
            short,
            long,
            default_value = "load-manifest.jsonc",
            value_name = "OUTPUT PATH"
        )]
        output: PathBuf,
    },
    /// Validate a load manifest file
    Validate {
        /// Path to the load manifest file to validate
        #[arg(
            short,
            long,
            default_value = "load-manifest.jsonc",
            value_name = "PATH TO LOAD MANIFEST"
        )]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with appropriate level
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("CSV to Manifest Processor starting up...");

    match &cli.command {
        Commands::GenerateManifest {
            template_type,
            output,
        } => generate_manifest_command(template_type, output),
        Commands::Validate { manifest } => validate_command(manifest),
        Commands::Process { manifest, output } => process_command(manifest, output).await,
    }
}

async fn process_command(manifest_path: &PathBuf, output: &Option<PathBuf>) -> Result<()> {
    // Verify load manifest file exists
    if !manifest_path.exists() {
        anyhow::bail!("Load manifest file not found: {}", manifest_path.display());
    }

    // Get the manifest's parent directory to use as base path
    let base_path = manifest_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Could not determine parent directory of load manifest"))?;

    let output_path = output.clone().unwrap_or_else(|| base_path.to_path_buf());

    // Load and validate the load manifest
    info!("Loading load manifest from {}", manifest_path.display());
    let load_manifest = LoadManifest::from_file(manifest_path)
        .context("Failed to load load manifest. See errors for additional details:")?;

    info!("Validating load manifest configuration...");
    load_manifest
        .validate()
        .context("Failed to validate load manifest")?;

    info!(
        "Load manifest '{}' loaded and validated successfully",
        load_manifest.name
    );
    info!("Description: {}", load_manifest.description);

    // Create and run processor
    info!("Initializing processor...");
    let mut processor =
        Processor::with_base_path(load_manifest, base_path, output_path.as_path());

    info!("Beginning manifest generation...");
    let summary = processor
        .process()
        .await
        .context("Failed to process load manifest")?;

    for mapping in &summary.mappings {
        info!(
            "{}: {} rows, {} manifests written",
            mapping.mapping, mapping.rows_processed, mapping.manifests_written
        );
        for message in &mapping.messages {
            match (message.row, &message.phase) {
                (Some(row), Some(phase)) => {
                    warn!("  row {} ({}): {}", row, phase, message.message)
                }
                _ => warn!("  {}", message.message),
            }
        }
    }

    if !summary.succeeded {
        anyhow::bail!("One or more mappings failed; see log output for details");
    }

    info!("Processing completed successfully");
    Ok(())
}

fn generate_manifest_command(template_type: &str, output: &PathBuf) -> Result<()> {
    let template_path = match template_type.to_lowercase().as_str() {
        "basic" => Template::Basic,
        "full" => Template::Full,
        _ => anyhow::bail!("Invalid template type. Must be either 'basic' or 'full'"),
    };

    info!("Generating {} load manifest template...", template_type);

    // Read the template file
    let template_content = match template_path {
        Template::Basic => BASIC_MANIFEST,
        Template::Full => FULL_MANIFEST,
    };

    // if output is a directory, append the default file name
    let full_file_output_path = if output.is_dir() {
        output.join("load-manifest.jsonc")
    } else {
        output.into()
    };

    // Write the template to the output file
    fs::write(&full_file_output_path, template_content)
        .context(format!("Failed to write load manifest to: {}", output.display()))?;

    info!(
        "Successfully generated load manifest template at: {}",
        full_file_output_path.display()
    );
    Ok(())
}

fn validate_command(manifest_path: &PathBuf) -> Result<()> {
    info!("Validating load manifest...");

    // Verify load manifest file exists
    if !manifest_path.exists() {
        anyhow::bail!(
            "Load manifest file not found: {}. Try using --manifest <PATH TO LOAD MANIFEST>",
            manifest_path.display()
        );
    }

    // Attempt to deserialize the load manifest to validate it
    let load_manifest = LoadManifest::from_file(manifest_path)
        .context("Failed to parse load manifest. See errors for additional details:")?;

    // Run additional validation checks
    load_manifest
        .validate()
        .context("Failed to validate load manifest")?;

    info!("Load manifest validation successful");
    info!("Name: {}", load_manifest.name);
    info!("Description: {}", load_manifest.description);
    Ok(())
}
