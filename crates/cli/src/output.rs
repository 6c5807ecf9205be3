//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use verifier_lib::{VerificationReport, Violation};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for violations table
#[derive(Tabled)]
struct ViolationRow {
    #[tabled(rename = "Experiment")]
    experiment: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Window")]
    window: String,
    #[tabled(rename = "Term")]
    term: String,
    #[tabled(rename = "Engine")]
    engine: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&Violation> for ViolationRow {
    fn from(v: &Violation) -> Self {
        let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        Self {
            experiment: field(&v.location.experiment),
            unit: field(&v.location.unit),
            window: field(&v.location.window),
            term: field(&v.location.term),
            engine: field(&v.location.engine),
            kind: color_kind(v.kind.label()),
            detail: v.kind.to_string(),
        }
    }
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a verification report
pub fn print_report(report: &VerificationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(report) {
                println!("{}", json);
            }
        }
        OutputFormat::Table => {
            if report.is_passed() {
                print_success(&format!(
                    "Recommendations consistent ({} units checked)",
                    report.units_checked
                ));
                return;
            }

            let rows: Vec<ViolationRow> = report.violations.iter().map(ViolationRow::from).collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
            print_error(&format!(
                "{} violation(s) across {} units checked",
                report.violations.len(),
                report.units_checked
            ));
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color violation kind
pub fn color_kind(kind: &str) -> String {
    match kind {
        "numeric" => kind.yellow().to_string(),
        "structural" => kind.red().to_string(),
        "notification" => kind.magenta().to_string(),
        "missing_data" => kind.blue().to_string(),
        _ => kind.to_string(),
    }
}
