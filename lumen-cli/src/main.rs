use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen", version, about = "Lumen template tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a template and report errors.
    Check {
        /// Path to the template
        template: PathBuf,
        /// Reject structures the default parser tolerates
        #[arg(long)]
        strict: bool,
        /// Print the compiled program
        #[arg(long)]
        emit: bool,
    },
    /// Render a template once and print the HTML.
    Render {
        /// Path to the template
        template: PathBuf,
        /// JSON object used as component state
        #[arg(long)]
        state: Option<PathBuf>,
        /// Component stylesheet
        #[arg(long)]
        styles: Option<PathBuf>,
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let out = match cli.command {
        Commands::Check {
            template,
            strict,
            emit,
        } => lumen_cli::check_cmd(&template, strict, emit)?,
        Commands::Render {
            template,
            state,
            styles,
            strict,
        } => lumen_cli::render_cmd(&template, state.as_deref(), styles.as_deref(), strict)?,
    };
    println!("{out}");
    Ok(())
}
