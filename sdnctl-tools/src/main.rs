use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sdnctl_core::crypto::generate_salt;
use sdnctl_core::{CredentialRecord, CredentialStore};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// sdnctl Tools - credential management
#[derive(Parser)]
#[command(name = "sdnctl-tools")]
#[command(about = "sdnctl credential management tools")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a credential file for a password
    Hash {
        /// Salt text, random when omitted
        #[arg(long)]
        salt: Option<String>,

        /// Password to hash
        #[arg(long)]
        pw: String,

        /// Output credential file
        #[arg(long, default_value = sdnctl_core::DEFAULT_CREDENTIALS_FILE)]
        output: PathBuf,
    },

    /// Check a password against a credential file
    Verify {
        /// Credential file
        #[arg(long, default_value = sdnctl_core::DEFAULT_CREDENTIALS_FILE)]
        config: PathBuf,

        /// Password to check
        #[arg(long)]
        pw: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Setup logging
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Hash { salt, pw, output } => hash(salt, &pw, &output),
        Commands::Verify { config, pw } => verify(&config, &pw),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn hash(salt: Option<String>, password: &str, output: &Path) -> anyhow::Result<()> {
    let salt = match salt {
        Some(salt) => salt,
        None => generate_salt()?,
    };

    let record = CredentialRecord::derive(&salt, password)?;
    record
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(salt = %salt, "credential written to {}", output.display());
    println!("Wrote credentials to {}", output.display());
    Ok(())
}

fn verify(config: &Path, password: &str) -> anyhow::Result<()> {
    let store = CredentialStore::load(config)
        .with_context(|| format!("loading {}", config.display()))?;
    if !store.verify(password) {
        bail!("password does not match {}", config.display());
    }
    println!("Password matches {}", config.display());
    Ok(())
}
