use std::{error::Error, path::PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use magpend::{config::SimConfig, output::write_outputs};
use magpend_diffeq::solvers::RungeKuttaMethods;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(version, about = "Magnetic pendulum simulator", long_about = None)]
struct Cli {
    /// Raise the log level, -v for debug and -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Simulate a pendulum, from a config file or the built-in defaults
    Run {
        config: Option<PathBuf>,
        /// Folder the csv results are written to
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
        /// Integration method, see `magpend methods`
        #[arg(short, long)]
        method: Option<RungeKuttaMethods>,
        #[arg(short, long)]
        steps: Option<usize>,
        #[arg(long)]
        step_size: Option<f64>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Write the default config to a file
    Init { path: PathBuf },
    /// List the available integration methods
    Methods,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            config,
            output,
            method,
            steps,
            step_size,
            no_progress,
        } => {
            let mut config = match config {
                Some(path) => SimConfig::load(&path)?,
                None => SimConfig::default(),
            };
            if let Some(method) = method {
                config.method = method;
            }
            if let Some(steps) = steps {
                config.steps = steps;
            }
            if let Some(step_size) = step_size {
                config.step_size = step_size;
            }

            let params = config.pendulum_params()?;
            let history = config.run(!no_progress)?;
            let written = write_outputs(&output, &history, &params)?;

            println!("{}", "Simulation complete".green().bold());
            println!("  method: {}", config.method);
            println!(
                "  steps:  {} x {} s",
                config.steps, config.step_size
            );
            if let Some(last) = history.last() {
                println!("  final:  {last}");
                if !last.is_finite() {
                    println!("{}", "  final state is not finite".yellow());
                }
            }
            for path in written {
                println!("  wrote {}", path.display());
            }
        }
        Commands::Init { path } => {
            SimConfig::default().save(&path)?;
            println!(
                "{}",
                format!("Default config written to {}", path.display()).green()
            );
        }
        Commands::Methods => {
            for method in RungeKuttaMethods::ALL {
                let tableau = method.tableau();
                let order = tableau
                    .order()
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<10} {:<28} stages: {}  order: {}",
                    method.key().bright_blue(),
                    tableau.name(),
                    tableau.stages(),
                    order
                );
            }
        }
    }
    Ok(())
}
