//! Monitoring window lookup

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use verifier_lib::term::term_based_start_time;
use verifier_lib::{TermName, TermSpec};

use crate::output::{print_table, OutputFormat};

/// Row for windows table
#[derive(Tabled, Serialize)]
struct WindowRow {
    #[tabled(rename = "Term")]
    term: String,
    #[tabled(rename = "Days")]
    duration_in_days: f64,
    #[tabled(rename = "Monitoring Start")]
    monitoring_start_time: String,
    #[tabled(rename = "Monitoring End")]
    monitoring_end_time: String,
    #[tabled(rename = "Max Hours")]
    max_duration_in_hours: f64,
}

/// Print each term's monitoring window ending at `end_time`
pub fn run(end_time: &str, terms: &[String], format: OutputFormat) -> Result<()> {
    let specs = if terms.is_empty() {
        TermSpec::defaults()
    } else {
        terms
            .iter()
            .map(|name| {
                TermSpec::builtin(&TermName::from(name.as_str())).ok_or_else(|| {
                    anyhow::anyhow!("Unknown term {}; expected short_term, medium_term or long_term", name)
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let rows = specs
        .iter()
        .map(|spec| {
            Ok(WindowRow {
                term: spec.name.to_string(),
                duration_in_days: spec.duration_in_days,
                monitoring_start_time: term_based_start_time(end_time, spec)?,
                monitoring_end_time: end_time.to_string(),
                max_duration_in_hours: spec.max_duration_in_hours(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    print_table(&rows, format);
    Ok(())
}
