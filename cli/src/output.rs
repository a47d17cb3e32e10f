use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use migration::{BulkReport, MigrationError, MigrationReport, Stage};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the outcome of one single-object migration
pub fn print_report(report: &MigrationReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    let stage = report
        .final_stage()
        .map(|stage| stage.to_string())
        .unwrap_or_default();
    println!(
        "{} {} {}",
        report.kind.to_string().bold(),
        report.id.cyan(),
        stage.green()
    );
    if report.dry_run {
        println!("{}", "Dry run: nothing was created in the destination".yellow());
    }

    println!("\n{}", "References".bold());
    println!("{}", serde_json::to_string_pretty(&report.references)?);
    if let Some(circulation) = &report.circulation {
        println!("\n{}", "Circulation".bold());
        println!("{}", serde_json::to_string_pretty(circulation)?);
    }
    println!("\n{}", "Document".bold());
    println!("{}", serde_json::to_string_pretty(&report.document)?);
    Ok(())
}

/// Print the per-item results of a bulk run
pub fn print_bulk(label: &str, report: &BulkReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    for item in &report.items {
        let mark = if item.succeeded { "✓".green() } else { "✗".red() };
        println!("{} {} {}", mark, item.id, item.message);
    }
    let summary = format!(
        "{} {} processed, {} failed",
        report.processed(),
        label,
        report.failures()
    );
    if report.failures() == 0 {
        println!("\n{}", summary.green());
    } else {
        println!("\n{}", summary.yellow());
    }
    Ok(())
}

/// Print why a run stopped, with its terminal stage when known
pub fn print_error(err: &anyhow::Error) {
    match err.downcast_ref::<MigrationError>() {
        Some(migration_error) => {
            let stage = Stage::of_error(migration_error);
            eprintln!("{} {}", stage.to_string().red().bold(), migration_error);
            if matches!(migration_error, MigrationError::FirstTimeEntityCreation { .. }) {
                eprintln!("{}", "Run the same command again to complete the migration".yellow());
            }
        }
        None => eprintln!("{} {:#}", "Error:".red().bold(), err),
    }
}
