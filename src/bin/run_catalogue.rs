//! Run loan scenarios against a whole product catalogue
//!
//! Outputs one CSV row per scenario and offered product. With an expected
//! results directory, each scenario is also checked against
//! `<dir>/<scenario name>.json`.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use loan_rate_engine::fixtures::{compare_outcome, load_expected, load_products, load_scenarios};
use loan_rate_engine::{LoanShape, ScenarioRunner};

#[derive(Parser)]
#[command(about = "Price loan scenarios against a product catalogue")]
struct Args {
    /// Product catalogue (JSON array)
    products: PathBuf,

    /// Loan scenarios (CSV with header row)
    scenarios: PathBuf,

    /// Results file to write
    #[arg(short, long, default_value = "catalogue_results.csv")]
    output: PathBuf,

    /// Directory of recorded results named after each scenario
    #[arg(long)]
    expected: Option<PathBuf>,
}

/// One output row
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    scenario: &'a str,
    product: &'a str,
    shape: LoanShape,
    error: i32,
    effective_rate: Option<f64>,
    payback_period_count: Option<f64>,
    remainder: Option<f64>,
    rounds: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let products = load_products(&args.products).context("Failed to load products")?;
    let scenarios = load_scenarios(&args.scenarios).context("Failed to load scenarios")?;
    println!(
        "Loaded {} products and {} scenarios in {:?}",
        products.len(),
        scenarios.len(),
        start.elapsed()
    );

    let runner = ScenarioRunner::new(products);
    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let mut passed = 0;
    let mut failed = 0;

    for scenario in &scenarios {
        let results = runner.run(scenario);

        for (product, outcome) in &results {
            let ok = outcome.as_ref().ok();
            writer.serialize(ResultRow {
                scenario: &scenario.name,
                product,
                shape: scenario.shape,
                error: outcome.as_ref().err().map_or(0, |err| err.code()),
                effective_rate: ok.map(|o| o.effective_rate()),
                payback_period_count: ok.map(|o| o.payback_period_count()),
                remainder: ok.map(|o| o.remainder()),
                rounds: ok.map(|o| o.rounds()),
            })?;
        }

        let Some(dir) = &args.expected else {
            continue;
        };
        let path = dir.join(format!("{}.json", scenario.name));
        let expected = load_expected(&path)
            .with_context(|| format!("Failed to load expected results for {}", scenario.name))?;

        if expected.len() != results.len() {
            println!(
                "{}: expected {} results, got {}",
                scenario.name,
                expected.len(),
                results.len()
            );
            failed += results.len().max(expected.len());
            continue;
        }

        for ((product, outcome), want) in results.iter().zip(&expected) {
            let mismatches = compare_outcome(outcome, want, scenario.timing);
            if mismatches.is_empty() {
                passed += 1;
            } else {
                failed += 1;
                println!("{} / {}:", scenario.name, product);
                for mismatch in &mismatches {
                    println!("  {mismatch}");
                }
            }
        }
    }

    writer.flush()?;
    println!("Output written to {}", args.output.display());

    if args.expected.is_some() {
        println!("Passed: {passed}, failed: {failed}");
    }
    println!("Total time: {:?}", start.elapsed());

    Ok(())
}
