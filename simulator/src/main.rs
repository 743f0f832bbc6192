use anyhow::Context;
use clap::{Parser, Subcommand};
use generator::profile::GeneratorConfig;
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver for the RF radiative-forcing pipeline")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a workflow and write the report
    Run {
        /// Workflow config in YAML
        #[arg(long)]
        workflow: PathBuf,
        /// Overrides the workflow's output directory
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        workers: Option<usize>,
        /// Fail on the first invalid record instead of skipping it
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Write a seeded synthetic dataset and a matching workflow
    Generate {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        #[arg(long, default_value_t = 12)]
        windows: usize,
        #[arg(long, default_value_t = 20)]
        bins: usize,
        #[arg(long, default_value_t = 0.01)]
        noise: f64,
        #[arg(long, default_value_t = 0.0)]
        diurnal: f64,
        /// Also emit a radiometer brightness-temperature product
        #[arg(long, default_value_t = false)]
        brightness: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Run {
            workflow,
            output,
            workers,
            strict,
        } => {
            let config = WorkflowConfig::load(&workflow)?.with_overrides(output, workers, strict);
            let result = Runner::new(config)
                .execute()
                .with_context(|| format!("running workflow {}", workflow.display()))?;
            let report = &result.report;
            println!(
                "{} estimates, verdict {}, pooled mean {:.6e} W/m2 ({:.4}% of CO2)",
                report.estimates.len(),
                report.verdict.classification,
                report.co2.forcing_w_m2,
                report.co2.ratio * 100.0
            );
            for file in &result.files {
                println!("wrote {}", file.display());
            }
        }
        Command::Generate {
            output,
            seed,
            windows,
            bins,
            noise,
            diurnal,
            brightness,
        } => {
            let config = GeneratorConfig {
                seed,
                windows,
                bins,
                noise,
                diurnal_amplitude: diurnal,
                brightness,
                ..Default::default()
            };
            let dataset = config
                .generate(&output)
                .with_context(|| format!("generating dataset in {}", output.display()))?;
            for file in &dataset.files {
                println!("wrote {}", file.display());
            }
            println!(
                "{} spectrum rows; run with: simulator run --workflow {}",
                dataset.spectra_rows,
                dataset.workflow_path.display()
            );
        }
    }

    Ok(())
}
