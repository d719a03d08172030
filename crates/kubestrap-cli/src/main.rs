//! kubestrap CLI - provision the AWS side of a self-managed Kubernetes cluster

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;
mod logging;

#[derive(Parser)]
#[command(name = "kubestrap")]
#[command(author = "kubestrap Contributors")]
#[command(version)]
#[command(about = "Provision the AWS resources of a self-managed Kubernetes cluster", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision keys, artifacts, image and secret, then submit the stack
    Deploy {
        /// Configuration file merged over the built-in defaults
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,

        /// Set configuration values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,
    },

    /// Print the resolved configuration
    Config {
        /// Configuration file merged over the built-in defaults
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,

        /// Set configuration values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,
    },
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    if cli.debug {
        // SAFETY: We're the only thread at this point (start of main)
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }

    let result = match cli.command {
        Commands::Deploy { config, set } => commands::deploy::run(config.as_deref(), &set, cli.debug),
        Commands::Config { config, set } => commands::config::run(config.as_deref(), &set, cli.debug),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
