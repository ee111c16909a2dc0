use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use output::OutputFormat;

/// boot - apply two-phase configuration scripts
#[derive(Parser)]
#[command(name = "boot")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Apply a script to an empty object and print the result
  Apply {
    /// Path to the script
    file: PathBuf,

    /// Name of the classpath block (default: buildscript)
    #[arg(short, long)]
    block: Option<String>,

    /// Extra base classpath entry; may be repeated
    #[arg(short, long = "classpath", value_name = "ENTRY")]
    classpath: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Print the import statements prepended to every script
  Imports {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Apply {
      file,
      block,
      classpath,
      output,
    } => cmd::cmd_apply(&file, block, classpath, output),
    Commands::Imports { output } => cmd::cmd_imports(output),
  }
}
