//! # FLECTL CLI
//!
//! Command-line interface for reconciling a single CloudFront field-level
//! encryption profile from a YAML spec, with the last known remote state kept
//! in a JSON state file.
//!
//! ## Usage
//!
//! ```bash
//! # Show what would change
//! flectl plan --spec profile.yaml
//!
//! # Create or update the profile
//! flectl apply --spec profile.yaml
//!
//! # Re-read the profile and report drift
//! flectl refresh
//!
//! # Start managing a profile created elsewhere
//! flectl import E2QWRUHAPOMQZL
//!
//! # Delete the profile
//! flectl destroy
//! ```
//!
//! Retry, timeout and rename behaviour is read from the `FLE_*` environment
//! variables; `--timeout-secs` and `--name-change-policy` override them.

mod commands;
mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fle_profile_controller::config::{NameChangePolicy, ReconcilerConfig};
use fle_profile_controller::controller::Reconciler;
use fle_profile_controller::observability::{gather_metrics, init_tracing, register_metrics};
use fle_profile_controller::provider::CloudFrontProfiles;
use state::StateFile;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Field-level encryption profile reconciler CLI
#[derive(Debug, Parser)]
#[command(name = "flectl")]
#[command(about = "Reconcile a CloudFront field-level encryption profile", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file holding the last known remote record
    #[arg(long, global = true, default_value = "flectl.state.json")]
    state: PathBuf,

    /// AWS region used to sign CloudFront requests
    #[arg(long, global = true)]
    region: Option<String>,

    /// Overall deadline for each operation in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// How a changed profile name is applied: recreate (default) or update-in-place
    #[arg(long, global = true)]
    name_change_policy: Option<NameChangePolicy>,

    /// Print Prometheus metrics to stdout before exiting
    #[arg(long, global = true)]
    print_metrics: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the changes apply would make
    Plan {
        /// YAML desired spec
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// Create, update or replace the profile to match the spec
    Apply {
        /// YAML desired spec
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// Re-read the tracked profile and report drift
    Refresh,
    /// Start tracking an existing profile by identifier
    Import {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Delete the tracked profile
    Destroy,
}

impl Commands {
    fn writes_state(&self) -> bool {
        !matches!(self, Commands::Plan { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;
    register_metrics()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("BUILD_GIT_HASH"),
        built = env!("BUILD_DATETIME"),
        "Starting flectl"
    );

    let mut config = ReconcilerConfig::from_env();
    if let Some(timeout) = cli.timeout_secs {
        config.operation_timeout_secs = timeout;
    }
    if let Some(policy) = cli.name_change_policy {
        config.name_change_policy = policy;
    }

    let client = CloudFrontProfiles::new(cli.region.clone()).await;
    let reconciler = Reconciler::new(Arc::new(client), config);
    let mut state = StateFile::load(&cli.state)?;

    let result = run(&reconciler, &mut state, &cli.command).await;

    // Persist even on failure: an unconfirmed create is still tracked
    if cli.command.writes_state() {
        state
            .save(&cli.state)
            .context("Failed to persist state")?;
    }

    if cli.print_metrics {
        print!("{}", gather_metrics()?);
    }
    result
}

async fn run(reconciler: &Reconciler, state: &mut StateFile, command: &Commands) -> Result<()> {
    match command {
        Commands::Plan { spec } => {
            let desired = commands::load_spec(spec)?;
            let plan = commands::plan(reconciler, state, &desired).await?;
            println!("Plan for '{}': {plan}", desired.name);
        }
        Commands::Apply { spec } => {
            let desired = commands::load_spec(spec)?;
            let plan = commands::apply(reconciler, state, &desired).await?;
            match &state.record {
                Some(record) => println!(
                    "Applied '{}' ({plan}): id={} etag={}",
                    desired.name, record.id, record.etag
                ),
                None => println!("Applied '{}' ({plan})", desired.name),
            }
        }
        Commands::Refresh => {
            let drift = commands::refresh(reconciler, state).await?;
            match &state.record {
                Some(record) => println!("Profile {}: {drift}", record.id),
                None => println!("Tracked profile no longer exists ({drift})"),
            }
        }
        Commands::Import { id } => {
            let record = commands::import(reconciler, state, id).await?;
            println!(
                "Imported '{}': id={} etag={}",
                record.spec.name, record.id, record.etag
            );
        }
        Commands::Destroy => {
            if commands::destroy(reconciler, state).await? {
                println!("Profile deleted");
            } else {
                println!("No profile is tracked; nothing to delete");
            }
        }
    }
    Ok(())
}
