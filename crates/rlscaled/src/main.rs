//! rlscaled — the rlscale controller binary.
//!
//! Trains and evaluates autoscaling policies against the simulated
//! cluster, and inspects saved Q-tables.
//!
//! # Usage
//!
//! ```text
//! rlscaled scaffold --name checkout > rlscale.toml
//! rlscaled train --config rlscale.toml --episodes 50 --note baseline
//! rlscaled evaluate --config rlscale.toml --model model/qlearning/.../final/qlearning_1700000000.json
//! rlscaled inspect --model model/qlearning/.../final/qlearning_1700000000.json --max-states 20
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rlscale_core::Algorithm;

mod commands;

#[derive(Parser)]
#[command(
    name = "rlscaled",
    about = "Reinforcement-learning autoscaling controller",
    version,
    propagate_version = true
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a policy against the simulated cluster.
    Train {
        /// Controller configuration (TOML).
        #[arg(short, long)]
        config: PathBuf,
        /// Override `training.episodes`.
        #[arg(long)]
        episodes: Option<u32>,
        /// Override `training.note`; names the run directory.
        #[arg(long)]
        note: Option<String>,
        /// Continue from a saved checkpoint.
        #[arg(long)]
        resume: Option<PathBuf>,
        /// Simulated cluster settings (TOML).
        #[arg(long)]
        sim_config: Option<PathBuf>,
    },
    /// Run a saved policy greedily without learning.
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        /// Checkpoint to evaluate.
        #[arg(short, long)]
        model: PathBuf,
        #[arg(long, default_value = "1")]
        episodes: u32,
        #[arg(long)]
        sim_config: Option<PathBuf>,
    },
    /// Summarize a saved Q-table.
    Inspect {
        #[arg(short, long)]
        model: PathBuf,
        /// Policy the table belongs to; detected from the state keys when
        /// omitted.
        #[arg(short, long)]
        algorithm: Option<Algorithm>,
        /// States to list.
        #[arg(long, default_value = "20")]
        max_states: usize,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print a configuration with every default spelled out.
    Scaffold {
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(long, default_value = "app")]
        name: String,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print simulated cluster settings instead.
        #[arg(long)]
        sim: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Command::Train {
            config,
            episodes,
            note,
            resume,
            sim_config,
        } => {
            commands::train::run(commands::train::TrainArgs {
                config,
                episodes,
                note,
                resume,
                sim_config,
            })
            .await
        }
        Command::Evaluate {
            config,
            model,
            episodes,
            sim_config,
        } => commands::evaluate::run(&config, &model, episodes, sim_config.as_deref()).await,
        Command::Inspect {
            model,
            algorithm,
            max_states,
            format,
        } => commands::inspect::run(&model, algorithm, max_states, &format),
        Command::Scaffold {
            namespace,
            name,
            output,
            sim,
        } => commands::scaffold::run(&namespace, &name, output.as_deref(), sim),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rlscale=debug"));
    // Reports go to stdout; keep logs off it.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
