use std::fs::File;
use std::io::{BufWriter, Write};

use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use riskmc::config::SimulationConfig;
use riskmc::lec;
use riskmc::metrics::{self, TornadoMetric};
use riskmc::quantify::{self, ExposureMetric, QuantifiedRegister};
use riskmc::simulation::{PortfolioResult, simulate_portfolio, simulate_portfolio_par};

/// One line of the `--output` stream: every risk's loss for one trial.
#[derive(Serialize)]
struct TrialRecord<'a> {
    trial: usize,
    portfolio: f64,
    by_risk: Vec<(&'a str, f64)>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut seed_override: Option<u64> = None;
    let mut sims_override: Option<usize> = None;
    let mut register_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut quiet = false;
    let mut parallel = false;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                seed_override = Some(args[i].parse().expect("--seed requires a u64"));
            }
            "--sims" => {
                i += 1;
                sims_override = Some(args[i].parse().expect("--sims requires a positive integer"));
            }
            "--register" => {
                i += 1;
                register_path = Some(args[i].clone());
            }
            "--output" => {
                i += 1;
                output_path = Some(args[i].clone());
            }
            "--quiet" => quiet = true,
            "--parallel" => parallel = true,
            "--verbose" => verbose = true,
            _ => {}
        }
        i += 1;
    }

    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match register_path {
        Some(ref path) => SimulationConfig::from_json_path(path).unwrap_or_else(|e| {
            eprintln!("error: cannot load register {path}: {e}");
            std::process::exit(1);
        }),
        None => SimulationConfig::canonical(),
    };
    if seed_override.is_some() {
        config.seed = seed_override;
    }
    if let Some(n) = sims_override {
        config.n_sims = n;
    }

    let run = if parallel { simulate_portfolio_par } else { simulate_portfolio };
    let result = run(&config.register, config.n_sims, config.seed).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    if let Some(ref path) = output_path {
        let file = File::create(path).unwrap_or_else(|e| panic!("failed to create {path}: {e}"));
        let mut writer = BufWriter::new(file);
        for trial in 0..result.n_sims() {
            let record = TrialRecord {
                trial,
                portfolio: result.portfolio_loss()[trial],
                by_risk: result.by_risk().iter().map(|r| (r.risk_id.as_str(), r.losses[trial])).collect(),
            };
            serde_json::to_writer(&mut writer, &record).expect("failed to serialize trial");
            writeln!(writer).expect("failed to write newline");
        }
        writer.flush().expect("failed to flush output");
    }

    if quiet {
        return;
    }

    let quantified = quantify::quantify_result(&config.register, &result).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    println!("Trials: {}  Risks: {}  Seed: {}", result.n_sims(), result.by_risk().len(), result.seed());
    print_quantified(&quantified);
    if let Err(e) = print_attribution(&config, &result, &quantified) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    if !config.scenarios.is_empty() {
        match quantify::compare_scenarios(&config.register, &config.scenarios, config.n_sims, Some(result.seed())) {
            Ok(rows) => print_scenarios(&rows),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_quantified(q: &QuantifiedRegister) {
    println!("\n=== Quantified register ===");
    println!(
        "{:<16} | {:<12} | {:>12} | {:>12} | {:>12} | {:>12} | {:>12} | {:>12} | {:>12}",
        "RiskID", "Category", "SimMean", "SimMedian", "SimStd", "SimVaR95", "SimVaR99", "SimTVaR95", "SimTVaR99"
    );
    println!("{}", "-".repeat(16 + 3 + 12 + 7 * (3 + 12)));
    for row in &q.rows {
        let s = &row.stats;
        println!(
            "{:<16} | {:<12} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0}",
            row.risk_id.as_str(),
            row.category,
            s.mean,
            s.median,
            s.std,
            s.var_95,
            s.var_99,
            s.tvar_95,
            s.tvar_99,
        );
    }
}

fn print_attribution(
    config: &SimulationConfig,
    result: &PortfolioResult,
    q: &QuantifiedRegister,
) -> riskmc::Result<()> {
    // ── Exposure ranking ──────────────────────────────────────────────────────
    println!("\n=== Top exposures (SimMean) ===");
    for row in quantify::top_exposures(q, ExposureMetric::Mean, 5)? {
        println!(
            "  {:>2}. {:<16} {:<12} {:>12.0}  ({:>5.1}%)",
            row.rank,
            row.risk_id.as_str(),
            row.category,
            row.value,
            row.pct_of_total
        );
    }

    // ── Tornado: mean loss vs tail contribution ───────────────────────────────
    let tornado = metrics::tornado_data(
        &config.register,
        result.portfolio_loss(),
        result.by_risk(),
        0.95,
        10,
        TornadoMetric::DVaR,
    )?;
    println!("\n=== Tail attribution (dVaR @ 95%) ===");
    println!("{:>4} | {:<16} | {:>12} | {:>12}", "Rank", "RiskID", "MeanLoss", "dVaR95");
    for row in &tornado {
        println!("{:>4} | {:<16} | {:>12.0} | {:>12.0}", row.rank, row.risk_id.as_str(), row.mean_loss, row.dvar);
    }

    // ── Loss exceedance ───────────────────────────────────────────────────────
    let portfolio = result.portfolio_loss();
    println!("\n=== Portfolio loss exceedance ===");
    println!("{:>12} | {:>10} | {:>14}", "ReturnPeriod", "ExceedP", "Loss");
    for (period, loss) in lec::return_period_losses(portfolio, &[2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0])? {
        println!("{:>11}y | {:>9.2}% | {:>14.0}", period, 100.0 / period, loss);
    }

    let correlations = metrics::correlation_matrix(result);
    let max_abs = correlations
        .values
        .iter()
        .enumerate()
        .flat_map(|(i, row)| row.iter().enumerate().filter(move |(j, _)| *j != i).map(|(_, v)| v.abs()))
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    println!("\nMax |correlation| between risks: {max_abs:.4}");
    Ok(())
}

fn print_scenarios(rows: &[quantify::ScenarioResult]) {
    println!("\n=== Scenario comparison ===");
    println!(
        "{:<24} | {:>12} | {:>12} | {:>12} | {:>12} | {:>12}",
        "Scenario", "Mean", "VaR95", "VaR99", "TVaR95", "TVaR99"
    );
    for r in rows {
        println!(
            "{:<24} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0} | {:>12.0}",
            r.name, r.mean, r.var_95, r.var_99, r.tvar_95, r.tvar_99
        );
    }
}
