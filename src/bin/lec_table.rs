//! Loss exceedance table for a saved simulation run.
//!
//! Reads the per-trial NDJSON written by `riskmc --output <path>` (first
//! positional arg, default `trials.ndjson`) and prints the exceedance curve for
//! the portfolio, or for one risk with `--risk <id>`.

use std::{
    fs::File,
    io::{BufRead, BufReader},
};

use serde::Deserialize;

use riskmc::{lec, metrics};

#[derive(Deserialize)]
struct TrialRecord {
    portfolio: f64,
    by_risk: Vec<(String, f64)>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut trials_path = "trials.ndjson".to_string();
    let mut risk: Option<String> = None;
    let mut n_points = 20usize;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--risk" => {
                i += 1;
                risk = Some(args[i].clone());
            }
            "--points" => {
                i += 1;
                n_points = args[i].parse().expect("--points requires a positive integer");
            }
            other => trials_path = other.to_string(),
        }
        i += 1;
    }

    // ── Load trials ──────────────────────────────────────────────────────────
    let file = File::open(&trials_path).unwrap_or_else(|e| {
        eprintln!("error: cannot open {trials_path}: {e}");
        eprintln!("Run `riskmc --output {trials_path}` first to save a simulation.");
        std::process::exit(1);
    });

    let mut losses: Vec<f64> = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.unwrap_or_else(|e| {
            eprintln!("error reading line {}: {}", line_no + 1, e);
            std::process::exit(1);
        });
        if line.trim().is_empty() {
            continue;
        }
        let record: TrialRecord = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: failed to deserialize line {}: {}", line_no + 1, e);
                std::process::exit(1);
            }
        };
        let loss = match risk {
            None => record.portfolio,
            Some(ref id) => match record.by_risk.iter().find(|(rid, _)| rid == id) {
                Some((_, x)) => *x,
                None => {
                    eprintln!("error: risk {id} not found on line {}", line_no + 1);
                    std::process::exit(1);
                }
            },
        };
        losses.push(loss);
    }

    let label = risk.as_deref().unwrap_or("portfolio");
    if let Err(e) = print_table(label, &losses, n_points) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_table(label: &str, losses: &[f64], n_points: usize) -> riskmc::Result<()> {
    let s = metrics::summary(losses)?;
    println!("=== Loss exceedance: {label} ({} trials) ===", s.n);
    println!("Mean {:.0}  Median {:.0}  Max {:.0}", s.mean, s.median, s.max);

    println!("\n{:>10} | {:>14} | {:>12}", "ExceedP", "Loss", "ReturnPeriod");
    println!("{}", "-".repeat(10 + 3 + 14 + 3 + 12));
    for point in lec::lec_points(losses, None, n_points)?.iter() {
        let rp = lec::return_period(losses, point.loss)?;
        let rp = if rp.is_finite() { format!("{rp:.1}y") } else { "never".to_string() };
        println!("{:>9.2}% | {:>14.0} | {:>12}", point.probability * 100.0, point.loss, rp);
    }

    println!("\n--- Empirical curve (threshold grid) ---");
    for point in lec::lec_points_by_threshold(losses, n_points.max(2))?.iter() {
        println!("{:>9.2}% | {:>14.0}", point.probability * 100.0, point.loss);
    }
    Ok(())
}
