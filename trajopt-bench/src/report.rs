use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::scenarios::ScenarioResult;

/// Deviation from the RK4 replay above which a trajectory is flagged.
pub const RK4_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub total: usize,
    pub solved: usize,
    pub total_solve_ms: f64,
    pub scenarios: &'a [ScenarioResult],
}

impl<'a> Summary<'a> {
    pub fn new(scenarios: &'a [ScenarioResult]) -> Self {
        Self {
            total: scenarios.len(),
            solved: scenarios.iter().filter(|r| r.success).count(),
            total_solve_ms: scenarios.iter().map(|r| r.solve_ms).sum(),
            scenarios,
        }
    }
}

pub fn print_result(res: &ScenarioResult) {
    println!("\n{}", "=".repeat(60));
    println!("{}", res.name);
    println!("{}", "=".repeat(60));
    println!("Variables:        {}", res.num_variables);
    println!("Equalities:       {}", res.num_equality_constraints);
    println!("Inequalities:     {}", res.num_inequality_constraints);
    println!();
    println!("Status:           {}", res.exit_condition);
    println!("Iterations:       {}", res.iterations);
    println!("Cost:             {:.6e}", res.cost);
    println!("Factorizations:   {}", res.factorizations);
    println!("Restorations:     {}", res.restoration_phases);
    println!("Solve time:       {:.3} ms", res.solve_ms);
    if res.iterations > 0 {
        println!("Time/iteration:   {:.3} ms", res.solve_ms / res.iterations as f64);
    }
    if let Some(dev) = res.max_rk4_deviation {
        let flag = if dev > RK4_TOLERANCE { "  (!)" } else { "" };
        println!("RK4 deviation:    {:.3e}{}", dev, flag);
    }
}

/// Stderr line for a scenario that did not converge.
pub fn failure_warning(res: &ScenarioResult) -> Option<String> {
    if res.success {
        None
    } else {
        Some(format!("warning: {} finished with {}", res.name, res.exit_condition))
    }
}

pub fn print_table(results: &[ScenarioResult]) {
    println!("\n{}", "=".repeat(92));
    println!(
        "{:<40} {:>28} {:>6} {:>14}",
        "Scenario", "Status", "Iters", "Time (ms)"
    );
    println!("{}", "-".repeat(92));
    for res in results {
        println!(
            "{:<40} {:>28} {:>6} {:>14.3}",
            res.name, res.exit_condition, res.iterations, res.solve_ms
        );
    }
    println!("{}", "=".repeat(92));

    let summary = Summary::new(results);
    println!(
        "Solved {}/{} in {:.3} ms total",
        summary.solved, summary.total, summary.total_solve_ms
    );
}

pub fn write_json(path: &Path, results: &[ScenarioResult]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &Summary::new(results))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
