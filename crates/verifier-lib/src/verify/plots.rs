//! Box-plot block checks

use std::collections::BTreeMap;

use crate::error::ViolationKind;
use crate::models::{BoxStats, Plots};
use crate::term::TermSpec;

type PlotsData = BTreeMap<String, BTreeMap<String, BoxStats>>;

/// `datapoints` and `plots_data` must both be present
pub fn require_plot_keys(plots: &Plots) -> Result<(i64, &PlotsData), ViolationKind> {
    let datapoints = plots
        .datapoints
        .ok_or_else(|| ViolationKind::missing("plots.datapoints is missing"))?;
    let plots_data = plots
        .plots_data
        .as_ref()
        .ok_or_else(|| ViolationKind::missing("plots.plots_data is missing"))?;
    Ok((datapoints, plots_data))
}

/// Check a term's `plots` block
///
/// `datapoints` must match the term's bucket count (when known) and the number
/// of `plots_data` entries. Every resource's box statistics must be complete
/// and ordered.
pub fn validate_plots(plots: &Plots, term: &TermSpec) -> Result<(), ViolationKind> {
    let (datapoints, plots_data) = require_plot_keys(plots)?;

    if let Some(expected) = term.plots_datapoints {
        if datapoints != i64::from(expected) {
            return Err(ViolationKind::structural("plots.datapoints", expected, datapoints));
        }
    }
    if plots_data.len() as i64 != datapoints {
        return Err(ViolationKind::structural(
            "plots.plots_data entries",
            datapoints,
            plots_data.len(),
        ));
    }

    for (timestamp, resources) in plots_data {
        for (resource, stats) in resources {
            check_box(stats).map_err(|reason| {
                ViolationKind::structural(
                    format!("plots.plots_data.{}.{}", timestamp, resource),
                    "min <= q1 <= median <= q3 <= max with a format",
                    reason,
                )
            })?;
        }
    }

    Ok(())
}

fn check_box(stats: &BoxStats) -> Result<(), String> {
    let values = [
        ("min", stats.min),
        ("q1", stats.q1),
        ("median", stats.median),
        ("q3", stats.q3),
        ("max", stats.max),
    ];
    let mut previous: Option<(&str, f64)> = None;
    for (name, value) in values {
        let value = value.ok_or_else(|| format!("{} missing", name))?;
        if let Some((prev_name, prev)) = previous {
            if value < prev {
                return Err(format!("{} {} < {} {}", name, value, prev_name, prev));
            }
        }
        previous = Some((name, value));
    }
    if stats.format.is_none() {
        return Err("format missing".to_string());
    }
    Ok(())
}
