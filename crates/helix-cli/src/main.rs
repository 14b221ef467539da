//! Helix CLI
//!
//! Replays system account scenarios against the in-memory host.

mod scenario;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use helix_economics::{EconomicsConfig, COMMANDS};
use scenario::Scenario;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "helix")]
#[command(version)]
#[command(about = "Helix system account economics engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON scenario and print the resulting state digest
    Replay {
        /// Scenario file
        scenario: PathBuf,

        /// Economics configuration (TOML); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the final state as JSON
        #[arg(long)]
        state_out: Option<PathBuf>,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        config: ConfigCommands,
    },

    /// List every command the system account accepts
    Commands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the default configuration as TOML
    Defaults,
    /// Validate a configuration file
    Check {
        /// Configuration file
        path: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EconomicsConfig> {
    match path {
        Some(path) => EconomicsConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => Ok(EconomicsConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Replay {
            scenario,
            config,
            state_out,
        } => {
            let config = load_config(config.as_ref())?;
            let accounts = config.accounts.clone();
            let json = std::fs::read_to_string(&scenario)
                .with_context(|| format!("failed to read {}", scenario.display()))?;
            let scenario = Scenario::from_json(&json)?;

            tracing::info!(steps = scenario.steps.len(), "replaying scenario");
            let report = scenario.replay(config)?;
            let state = report.engine.state();

            println!("Applied:  {}", report.applied);
            println!("Rejected: {} (expected)", report.rejected);
            println!("Deferred: {}", report.deferred);
            println!("Clock:    {}", report.now);
            println!("Digest:   {}", state.digest()?);
            println!();

            let mut watched: Vec<_> = scenario.balances.keys().cloned().collect();
            watched.extend([
                accounts.system,
                accounts.ram,
                accounts.ramfee,
                accounts.stake,
                accounts.bpay,
                accounts.vpay,
                accounts.names,
                accounts.saving,
            ]);
            println!("Balances:");
            for (account, balance) in report.balances(watched) {
                println!("  {account:<12} {balance}");
            }

            if let Some(path) = state_out {
                std::fs::write(&path, state.to_json()?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "state written");
            }
        }

        Commands::Config { config } => match config {
            ConfigCommands::Defaults => {
                print!("{}", EconomicsConfig::default().to_toml_string()?);
            }
            ConfigCommands::Check { path } => {
                load_config(Some(&path))?;
                println!("{}: ok", path.display());
            }
        },

        Commands::Commands => {
            for command in COMMANDS {
                println!("{command}");
            }
        }
    }

    Ok(())
}
