use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod generator;
mod input;
mod models;
mod runner;
mod stats;

/// Document store replay and workload tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a request script against a fresh balancer
    Run {
        /// Script file, or directory of script files replayed in name order
        #[arg(short, long, value_name = "PATH")]
        script: PathBuf,

        /// Place virtual nodes (two extra ring positions per server)
        #[arg(long)]
        vnodes: bool,

        /// Suppress per-response output; only the summary is printed
        #[arg(long)]
        quiet: bool,

        /// Export per-server statistics to a CSV file
        #[arg(long, value_name = "PATH")]
        output_csv: Option<PathBuf>,
    },

    /// Generate a synthetic workload script
    Generate {
        /// Servers added up front (ids 1..=N)
        #[arg(long, default_value = "4")]
        servers: u32,

        /// Unique documents in the population
        #[arg(long, default_value = "1000")]
        documents: u32,

        /// Total requests to emit
        #[arg(long, default_value = "10000")]
        requests: u32,

        /// Percentage of requests that are edits
        #[arg(long, default_value = "60")]
        edit_percent: u8,

        /// Percentage of requests followed by a topology change
        #[arg(long, default_value = "0")]
        churn_percent: u8,

        /// Cache capacity handed to every add_server
        #[arg(long, default_value = "100")]
        cache_capacity: usize,

        /// RNG seed; equal seeds produce identical scripts
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output script path
        #[arg(short, long, default_value = "workload.txt")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Run {
            script,
            vnodes,
            quiet,
            output_csv,
        } => {
            let config = models::RunConfig {
                script,
                enable_vnodes: vnodes,
                quiet,
            };
            let mut runner = runner::ScriptRunner::new(config);
            runner.run()?;
            stats::print_summary(runner.summary(), runner.balancer());
            if let Some(path) = output_csv {
                stats::export_csv(runner.balancer(), &path)?;
                println!("\nPer-server statistics exported to: {}", path.display());
            }
            Ok(())
        }

        Commands::Generate {
            servers,
            documents,
            requests,
            edit_percent,
            churn_percent,
            cache_capacity,
            seed,
            output,
        } => {
            let config = generator::WorkloadConfig {
                servers,
                documents,
                requests,
                edit_percent,
                churn_percent,
                cache_capacity: cache_capacity.max(1),
                seed,
                output,
            };
            let generator = generator::WorkloadGenerator::new(config);
            generator.generate()?;
            println!("Workload written");
            Ok(())
        }
    }
}
