//! Glimpse CLI - live preview host for generated React components.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "glimpse")]
#[command(about = "Live preview host for generated React components")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to glimpse.toml config file
    #[arg(short, long, default_value = "glimpse.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default glimpse.toml
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        yes: bool,
    },

    /// Print a source file normalized to plain JSX
    Normalize {
        file: PathBuf,

        /// Treat the file as a markdown response and unwrap its code block
        #[arg(short, long)]
        markdown: bool,
    },

    /// Print the component name found in a source file
    Extract {
        file: PathBuf,

        /// Treat the file as a markdown response and unwrap its code block
        #[arg(short, long)]
        markdown: bool,
    },

    /// Normalize every source under a directory and report leftover syntax
    Check {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Compile, instantiate and render a component
    Preview {
        file: PathBuf,

        /// Target runtime tag (defaults to config or "react")
        #[arg(short, long)]
        target: Option<String>,

        /// Props as a JSON object
        #[arg(short, long)]
        props: Option<String>,

        /// Re-run the preview whenever the file changes
        #[arg(short, long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes).await?;
        }
        Commands::Normalize { file, markdown } => {
            commands::normalize::run(&file, markdown)?;
        }
        Commands::Extract { file, markdown } => {
            commands::extract::run(&file, markdown)?;
        }
        Commands::Check { dir } => {
            commands::check::run(&dir)?;
        }
        Commands::Preview {
            file,
            target,
            props,
            watch,
        } => {
            let options = commands::preview::PreviewOptions {
                file,
                target,
                props,
                watch,
            };
            commands::preview::run(&cli.config, options).await?;
        }
    }

    Ok(())
}
