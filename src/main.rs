//! Loan rate engine CLI
//!
//! Prices one loan or card configuration read from a JSON file and prints
//! the effective rate with its payment schedule.
//!
//! ```bash
//! loan_rate_engine annuity mortgage.json
//! loan_rate_engine serial mortgage.json --json
//! loan_rate_engine card card.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use loan_rate_engine::card::{CardConfigBuilder, CardEngine};
use loan_rate_engine::common::ScheduleRow;
use loan_rate_engine::loan::{AnnuityLoanResult, LoanConfigBuilder, LoanEngine, SerialLoanResult};
use loan_rate_engine::CalcError;

#[derive(Parser)]
#[command(name = "loan_rate_engine")]
#[command(version, about = "Effective interest rates for loans and credit cards", long_about = None)]
struct Cli {
    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Annuity loan with level payments per rate segment
    Annuity { config: PathBuf },
    /// Serial loan with equal installments
    Serial { config: PathBuf },
    /// Credit card with regulatory and realistic rates
    Card { config: PathBuf },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_annuity(result: &AnnuityLoanResult) {
    println!("Effective rate:  {:.6}%", result.effective_rate);
    println!("Payback periods: {}", result.payback_period_count);
    println!("Residue:         {:.2}", result.residue);
    println!("Rounds:          {}", result.rounds);
    println!();
    println!(
        "{:>4} {:>8} {:>14} {:>10} {:>16} {:>16} {:>10}",
        "Row", "Terms", "Payment", "Fee", "Floor", "Ceiling", "Remainder"
    );
    for (i, row) in result.schedule.iter().filter_map(ScheduleRow::as_annuity).enumerate() {
        println!(
            "{:>4} {:>8.2} {:>14.2} {:>10.2} {:>16.2} {:>16.2} {:>10.4}",
            i + 1,
            row.term_count,
            row.payment,
            row.periodic_fee,
            row.principal_floor,
            row.principal_ceiling,
            row.remainder
        );
    }
    let summary = result.summary();
    println!();
    println!("Total paid: {:.2} (fees {:.2})", summary.total_paid, summary.total_fees);
}

fn print_serial(result: &SerialLoanResult) {
    println!("Effective rate:  {:.6}%", result.effective_rate);
    println!("Payback periods: {}", result.payback_period_count);
    println!("Remainder:       {:.2}", result.remainder);
    println!("Rounds:          {}", result.rounds);
    println!();
    println!("{:>6} {:>14} {:>14} {:>10}", "Period", "Payment", "Installment", "Fee");
    for (i, row) in result.schedule.iter().filter_map(ScheduleRow::as_serial).enumerate() {
        println!(
            "{:>6} {:>14.2} {:>14.2} {:>10.2}",
            i + 1,
            row.payment,
            row.installment,
            row.periodic_fee
        );
    }
    let summary = result.summary();
    println!();
    println!("Total paid: {:.2} (fees {:.2})", summary.total_paid, summary.total_fees);
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Annuity { config } => {
            let config = read_json::<LoanConfigBuilder>(config)?.build()?;
            let result = LoanEngine::new(config).annuity_loan()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_annuity(&result);
            }
        }
        Command::Serial { config } => {
            let config = read_json::<LoanConfigBuilder>(config)?.build()?;
            let result = LoanEngine::new(config).serial_loan()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_serial(&result);
            }
        }
        Command::Card { config } => {
            let config = read_json::<CardConfigBuilder>(config)?.build()?;
            let months = config.number_of_months;
            let result = CardEngine::new(config).calculate()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Regulatory rate: {:.6}% at {:.2} per month",
                    result.government_effective_rate, result.government_monthly_payment
                );
                println!(
                    "Realistic rate:  {:.6}% at {:.2} per month",
                    result.effective_rate, result.monthly_payment
                );
                println!("Remainder:       {:.2}", result.remainder);
                println!("Total paid:      {:.2}", result.total_paid(months));
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<CalcError>() {
                Some(calc) => eprintln!("error {}: {}", calc.code(), calc),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
