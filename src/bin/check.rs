//! Router Configuration Check CLI
//!
//! Validates router configuration files against a schema declaration.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use router_schema::{Pipeline, Schema, Section, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "router-config-check")]
#[command(about = "Validate router configuration files against a schema")]
struct Cli {
    /// Path to the schema declaration (JSON)
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Path to a settings file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, rewrite and validate a configuration file
    Check {
        /// Configuration file
        file: PathBuf,

        /// Print the validated entities as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the sections of a configuration file after rewrites
    Sections {
        /// Configuration file
        file: PathBuf,
    },

    /// Print the loaded schema as JSON
    Schema,
}

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: failed to load settings: {}", e);
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli, settings) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    let schema_path = cli
        .schema
        .or_else(|| settings.schema_path())
        .ok_or_else(|| anyhow!("no schema given; pass --schema or set [schema] path"))?;
    let schema = Schema::load(&schema_path)
        .with_context(|| format!("loading schema {}", schema_path.display()))?;

    let pipeline = Pipeline::new(schema, settings);

    match cli.command {
        Commands::Check { file, json } => {
            let text = read(&file)?;
            let entities = pipeline
                .run(&text)
                .with_context(|| format!("validating {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entities)?);
            } else {
                println!("✅ {} - {} entities valid", file.display(), entities.len());
                for entity in &entities {
                    println!(
                        "  {} {}",
                        pipeline.schema().short_name(entity.type_name()),
                        entity.name().unwrap_or("-")
                    );
                }
            }
            Ok(())
        }

        Commands::Sections { file } => {
            let text = read(&file)?;
            let sections = pipeline
                .sections(&text)
                .with_context(|| format!("parsing {}", file.display()))?;
            let raw: Vec<_> = sections.iter().map(Section::to_raw).collect();
            println!("{}", serde_json::to_string_pretty(&raw)?);
            Ok(())
        }

        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&pipeline.schema().dump()?)?);
            Ok(())
        }
    }
}

fn read(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}
