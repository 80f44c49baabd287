//! Scenario runner for trajopt-core.

mod report;
mod scenarios;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use trajopt_core::SolverConfig;

use crate::scenarios::{Scenario, Transcription};

#[derive(Parser, Debug)]
#[command(name = "trajopt-bench", about = "Solve and verify the canonical trajectory optimization scenarios")]
struct Cli {
    /// Scenario to run
    #[arg(value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Transcription used by the optimal control scenarios
    #[arg(long, value_enum, default_value_t = Transcription::DirectTranscription)]
    transcription: Transcription,

    #[arg(long)]
    max_iterations: Option<usize>,

    #[arg(long)]
    tolerance: Option<f64>,

    /// Print the per-iteration table
    #[arg(long)]
    diagnostics: bool,

    /// Write a JSON summary to this path
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SolverConfig {
        diagnostics: cli.diagnostics,
        ..Default::default()
    };
    if let Some(max_iterations) = cli.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
    }
    config.validate()?;

    println!("Trajopt Scenarios");
    println!("=================");

    let mut results = Vec::new();
    for scenario in cli.scenario.expand() {
        let res = scenarios::run(scenario, cli.transcription, &config)?;
        report::print_result(&res);
        if let Some(warning) = report::failure_warning(&res) {
            eprintln!("{}", warning);
        }
        results.push(res);
    }

    report::print_table(&results);

    if let Some(path) = &cli.json {
        report::write_json(path, &results)?;
        println!("Wrote {}", path.display());
    }

    let failed: Vec<&str> = results.iter().filter(|r| !r.success).map(|r| r.name.as_str()).collect();
    if !failed.is_empty() {
        anyhow::bail!("{} scenario(s) did not converge: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
