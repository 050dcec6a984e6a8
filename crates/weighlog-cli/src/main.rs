//! CLI for weighlog: record, watch and query weighing experiments.

mod commands;
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "weighlog")]
#[command(about = "weighlog: dual-cylinder weighing experiment logger")]
#[command(version = weighlog_core::VERSION)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the log, counter file and experiment segments
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one experiment headless until the duration elapses or Ctrl+C
    Record {
        /// Sampling interval value
        #[arg(long, default_value = "2")]
        interval: f64,

        /// Unit of --interval
        #[arg(long, default_value = "seconds", value_parser = ["seconds", "minutes"])]
        unit: String,

        /// Maximum recording duration (e.g. "5m", "30s", "1h")
        #[arg(long)]
        duration: Option<String>,

        /// Chart time scale shown in the status line
        #[arg(long, value_parser = ["seconds", "minutes", "hours"])]
        scale: Option<String>,

        /// Seed the mock rig for reproducible readings
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Live interactive dashboard (TUI)
    Monitor {
        /// Sampling interval value used by 's'
        #[arg(long, default_value = "2")]
        interval: f64,

        /// Unit of --interval
        #[arg(long, default_value = "seconds", value_parser = ["seconds", "minutes"])]
        unit: String,
    },

    /// Query the durable log by date range and experiment numbers
    Query {
        /// First date, YYYY-MM-DD
        start: String,

        /// Last date (inclusive), YYYY-MM-DD
        end: String,

        /// Experiment numbers, e.g. "1,3,7"
        experiments: String,

        /// Print rows as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Write the matching rows as JSON to this path
        #[arg(long)]
        output: Option<String>,
    },

    /// Show today's experiment counter resolution
    Counter,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = commands::load_config(cli.config.as_deref(), cli.log_dir);

    match cli.command {
        Commands::Record {
            interval,
            unit,
            duration,
            scale,
            seed,
        } => commands::record::run(commands::record::RecordCommandConfig {
            config: &config,
            interval,
            unit: &unit,
            duration: duration.as_deref(),
            scale: scale.as_deref(),
            seed,
        }),
        Commands::Monitor { interval, unit } => commands::monitor::run(&config, interval, &unit),
        Commands::Query {
            start,
            end,
            experiments,
            json,
            output,
        } => commands::query::run(&config, &start, &end, &experiments, json, output.as_deref()),
        Commands::Counter => commands::counter::run(&config),
    }
}
