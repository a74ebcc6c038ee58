use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shipwright_core::ShipwrightError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{
    build::{BuildArgs, handle_build_command},
    check::{CheckArgs, handle_check_command},
    key_properties::{KeyPropertiesArgs, handle_key_properties_command},
    keystore::{InspectKeystoreArgs, handle_inspect_keystore_command},
};

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(about = "Signed Android application packaging", long_about = None)]
struct Cli {
    /// Project root directory
    #[arg(long, short = 'C', global = true, default_value = ".")]
    project: PathBuf,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, sign and package a variant
    Build(BuildArgs),

    /// Validate credentials, SDK bounds and the manifest without building
    Check(CheckArgs),

    /// List the entries of a keystore
    InspectKeystore(InspectKeystoreArgs),

    /// Generate a key.properties file
    KeyProperties(KeyPropertiesArgs),

    /// Show CLI version
    Version,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "shipwright_core=debug,shipwright_cli=debug"
    } else {
        "shipwright_core=info,shipwright_cli=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Maps an error to the process exit code of its failure kind.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|e| e.downcast_ref::<ShipwrightError>())
        .map_or(1, ShipwrightError::exit_code)
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build(args) => handle_build_command(&cli.project, args).await,
        Commands::Check(args) => handle_check_command(&cli.project, args).await,
        Commands::InspectKeystore(args) => handle_inspect_keystore_command(args).await,
        Commands::KeyProperties(args) => handle_key_properties_command(&cli.project, args).await,
        Commands::Version => {
            println!("shipwright {}", shipwright_core::VERSION);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (doesn't override existing env vars)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", console::style("Error:").red().bold(), err);
            ExitCode::from(exit_code(&err))
        }
    }
}
