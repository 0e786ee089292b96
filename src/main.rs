// ABOUTME: Main entry point for the deckmark program.
// ABOUTME: Provides the CLI for generating decks and inspecting template layouts.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use deckmark::{ConfigLoader, merge_config};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a PPTX deck from Markdown content
    Generate(GenerateArgs),

    /// List the layouts and placeholders of a template
    Layouts {
        /// Path to the .pptx template
        template: PathBuf,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Main configuration file (defaults to $DECKMARK_CONFIG or config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Style overrides file, replacing paths.styles_overrides
    #[arg(long)]
    style_overrides: Option<PathBuf>,

    /// Template .pptx, replacing paths.template
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Markdown content, replacing paths.content
    #[arg(long)]
    content: Option<PathBuf>,

    /// Output .pptx, replacing paths.output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory image sources are resolved against, replacing paths.assets_dir
    #[arg(long)]
    assets_dir: Option<PathBuf>,
}

fn init_logging(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).try_init();
}

/// CLI paths are relative to the working directory, not the project root.
fn cli_path(path: &Path) -> anyhow::Result<Value> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read the current directory")?
            .join(path)
    };
    Ok(Value::String(absolute.to_string_lossy().into_owned()))
}

fn run_generate(args: &GenerateArgs) -> anyhow::Result<()> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::new(path),
        None => ConfigLoader::from_env(),
    }
    .with_style_overrides(args.style_overrides.clone());

    let mut layers = loader.load_layers()?;
    let flags = [
        ("paths.template", &args.template),
        ("paths.content", &args.content),
        ("paths.output", &args.output),
        ("paths.assets_dir", &args.assets_dir),
    ];
    for (key, value) in flags {
        if let Some(path) = value {
            layers.set_override(key, cli_path(path)?);
        }
    }
    let config = merge_config(layers)?;
    init_logging(&config.log_level());

    let report = deckmark::generate(&config)?;
    println!(
        "Generated {} slides from template {:?}: {:?}",
        report.slides, report.template, report.output
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Generate(args)) => run_generate(args),
        Some(Commands::Layouts { template }) => {
            init_logging("warn");
            deckmark::describe_template(template)
                .map(|listing| print!("{}", listing))
                .map_err(anyhow::Error::from)
        }
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
