//! Recommendation terms and monitoring-window arithmetic
//!
//! A term is a named lookback horizon. The service reports, per term, the start
//! of the window it looked at and how many hours of data fell inside it. Both
//! are recomputed here from the posted measurement windows.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ViolationKind;

/// Timestamp layout used by the service (millisecond precision, UTC, `Z` suffix)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub const SHORT_TERM_DURATION_IN_DAYS: f64 = 1.0;
pub const MEDIUM_TERM_DURATION_IN_DAYS: f64 = 7.0;
pub const LONG_TERM_DURATION_IN_DAYS: f64 = 15.0;

pub const SHORT_TERM_DURATION_IN_HRS_MAX: f64 = SHORT_TERM_DURATION_IN_DAYS * 24.0;
pub const MEDIUM_TERM_DURATION_IN_HRS_MAX: f64 = MEDIUM_TERM_DURATION_IN_DAYS * 24.0;
pub const LONG_TERM_DURATION_IN_HRS_MAX: f64 = LONG_TERM_DURATION_IN_DAYS * 24.0;

/// Plot buckets the service emits per built-in term
pub const SHORT_TERM_PLOTS_DATAPOINTS: u32 = 4;
pub const MEDIUM_TERM_PLOTS_DATAPOINTS: u32 = 7;
pub const LONG_TERM_PLOTS_DATAPOINTS: u32 = 15;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Name of a recommendation term
///
/// The three built-in horizons are closed variants; anything else comes from
/// an experiment's `term_settings`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TermName {
    ShortTerm,
    MediumTerm,
    LongTerm,
    Custom(String),
}

impl TermName {
    pub const DEFAULTS: [TermName; 3] = [TermName::ShortTerm, TermName::MediumTerm, TermName::LongTerm];

    pub fn as_str(&self) -> &str {
        match self {
            TermName::ShortTerm => "short_term",
            TermName::MediumTerm => "medium_term",
            TermName::LongTerm => "long_term",
            TermName::Custom(name) => name,
        }
    }
}

impl From<&str> for TermName {
    fn from(value: &str) -> Self {
        match value {
            "short_term" | "short" => TermName::ShortTerm,
            "medium_term" | "medium" => TermName::MediumTerm,
            "long_term" | "long" => TermName::LongTerm,
            other => TermName::Custom(other.to_string()),
        }
    }
}

impl From<String> for TermName {
    fn from(value: String) -> Self {
        TermName::from(value.as_str())
    }
}

impl From<TermName> for String {
    fn from(value: TermName) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TermName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A term together with its lookback size
#[derive(Debug, Clone, PartialEq)]
pub struct TermSpec {
    pub name: TermName,
    pub duration_in_days: f64,
    /// Expected `plots.datapoints`; `None` skips the count check
    pub plots_datapoints: Option<u32>,
}

impl TermSpec {
    /// Spec for a built-in term, `None` for custom names
    pub fn builtin(name: &TermName) -> Option<Self> {
        let (days, datapoints) = match name {
            TermName::ShortTerm => (SHORT_TERM_DURATION_IN_DAYS, SHORT_TERM_PLOTS_DATAPOINTS),
            TermName::MediumTerm => (MEDIUM_TERM_DURATION_IN_DAYS, MEDIUM_TERM_PLOTS_DATAPOINTS),
            TermName::LongTerm => (LONG_TERM_DURATION_IN_DAYS, LONG_TERM_PLOTS_DATAPOINTS),
            TermName::Custom(_) => return None,
        };
        Some(Self {
            name: name.clone(),
            duration_in_days: days,
            plots_datapoints: Some(datapoints),
        })
    }

    pub fn defaults() -> Vec<Self> {
        TermName::DEFAULTS
            .iter()
            .filter_map(Self::builtin)
            .collect()
    }

    /// Cap on `duration_in_hours` for this term
    pub fn max_duration_in_hours(&self) -> f64 {
        self.duration_in_days * 24.0
    }
}

/// `recommendation_settings.term_settings` of a create-experiment document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSettings {
    pub terms: TermSelection,
}

/// Terms either listed by name or defined with their own durations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermSelection {
    Names(Vec<TermName>),
    Definitions(BTreeMap<TermName, TermDefinition>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_days: Option<f64>,
    #[serde(default, alias = "plots_datapoint", skip_serializing_if = "Option::is_none")]
    pub plots_datapoints: Option<u32>,
}

/// Resolve the terms an experiment is verified against
///
/// Without settings the three built-in terms apply. A custom term must carry
/// its own `duration_in_days`.
pub fn resolve_terms(settings: Option<&TermSettings>) -> Result<Vec<TermSpec>, ViolationKind> {
    let Some(settings) = settings else {
        return Ok(TermSpec::defaults());
    };

    match &settings.terms {
        TermSelection::Names(names) => names
            .iter()
            .map(|name| {
                TermSpec::builtin(name).ok_or_else(|| {
                    ViolationKind::missing(format!(
                        "term_settings names custom term {} without a duration_in_days",
                        name
                    ))
                })
            })
            .collect(),
        TermSelection::Definitions(definitions) => definitions
            .iter()
            .map(|(name, definition)| {
                let builtin = TermSpec::builtin(name);
                let days = definition
                    .duration_in_days
                    .or_else(|| builtin.as_ref().map(|b| b.duration_in_days))
                    .ok_or_else(|| {
                        ViolationKind::missing(format!(
                            "term_settings defines term {} without a duration_in_days",
                            name
                        ))
                    })?;
                if !days.is_finite() || days <= 0.0 {
                    return Err(ViolationKind::structural(
                        format!("term_settings.{}.duration_in_days", name),
                        "> 0",
                        days,
                    ));
                }
                let plots_datapoints = definition
                    .plots_datapoints
                    .or_else(|| builtin.and_then(|b| b.plots_datapoints));
                Ok(TermSpec {
                    name: name.clone(),
                    duration_in_days: days,
                    plots_datapoints,
                })
            })
            .collect(),
    }
}

/// Parse a service timestamp
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ViolationKind> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| ViolationKind::structural("timestamp", "ISO-8601 UTC timestamp", format!("{} ({})", value, e)))
}

/// Format a timestamp the way the service does
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Round to two decimal places, as the service does for `duration_in_hours`
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Monitoring window start for `term` ending at `end_time`
pub fn term_based_start_time(end_time: &str, term: &TermSpec) -> Result<String, ViolationKind> {
    let end = parse_timestamp(end_time)?;
    let millis = (term.duration_in_days * MILLIS_PER_DAY).round();
    let start = Some(millis)
        .filter(|m| m.is_finite())
        .and_then(|m| Duration::try_milliseconds(m as i64))
        .and_then(|lookback| end.checked_sub_signed(lookback))
        .ok_or_else(|| {
            ViolationKind::structural(
                "monitoring_start_time",
                "within the supported date range",
                format!("{} days before {}", term.duration_in_days, end_time),
            )
        })?;
    Ok(format_timestamp(&start))
}

/// Hours between two timestamps, rounded to two decimals
pub fn time_diff_in_hours(start: &str, end: &str) -> Result<f64, ViolationKind> {
    let start_ts = parse_timestamp(start)?;
    let end_ts = parse_timestamp(end)?;
    if end_ts <= start_ts {
        return Err(ViolationKind::structural(
            "interval_end_time",
            format!("after {}", start),
            end,
        ));
    }
    let millis = (end_ts - start_ts).num_milliseconds() as f64;
    Ok(round2(millis / MILLIS_PER_HOUR))
}

/// Add one window's hours to a running total, capped at the term's lookback
pub fn accumulate_duration(
    prior_hours: f64,
    term: &TermSpec,
    window_start: &str,
    window_end: &str,
) -> Result<f64, ViolationKind> {
    let delta = time_diff_in_hours(window_start, window_end)?;
    Ok(round2(prior_hours + delta).min(term.max_duration_in_hours()))
}

/// Per-term running totals for one verification pass
#[derive(Debug, Default)]
pub struct DurationTracker {
    override_hours: Option<f64>,
    totals: BTreeMap<TermName, f64>,
}

impl DurationTracker {
    /// `override_hours` replaces accumulation for every term when set
    pub fn new(override_hours: Option<f64>) -> Self {
        Self {
            override_hours,
            totals: BTreeMap::new(),
        }
    }

    /// Account for one posted window and return the expected duration
    pub fn record(
        &mut self,
        term: &TermSpec,
        window_start: &str,
        window_end: &str,
    ) -> Result<f64, ViolationKind> {
        if let Some(hours) = self.override_hours {
            return Ok(hours);
        }
        let prior = self.totals.get(&term.name).copied().unwrap_or(0.0);
        let total = accumulate_duration(prior, term, window_start, window_end)?;
        self.totals.insert(term.name.clone(), total);
        Ok(total)
    }

    pub fn expected(&self, term: &TermName) -> f64 {
        self.override_hours
            .unwrap_or_else(|| self.totals.get(term).copied().unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short() -> TermSpec {
        TermSpec::builtin(&TermName::ShortTerm).unwrap()
    }

    /// Consecutive 15 minute windows starting at `base`
    fn windows(base: &str, count: usize) -> Vec<(String, String)> {
        let start = parse_timestamp(base).unwrap();
        (0..count)
            .map(|i| {
                let s = start + Duration::minutes(15 * i as i64);
                let e = s + Duration::minutes(15);
                (format_timestamp(&s), format_timestamp(&e))
            })
            .collect()
    }

    #[test]
    fn test_term_names_round_trip_through_strings() {
        assert_eq!(TermName::from("short_term"), TermName::ShortTerm);
        assert_eq!(TermName::from("medium"), TermName::MediumTerm);
        assert_eq!(TermName::from("weekly"), TermName::Custom("weekly".to_string()));
        assert_eq!(String::from(TermName::LongTerm), "long_term");
    }

    #[test]
    fn test_start_time_subtracts_whole_days() {
        let end = "2022-01-23T18:40:43.511Z";
        assert_eq!(term_based_start_time(end, &short()).unwrap(), "2022-01-22T18:40:43.511Z");
        let medium = TermSpec::builtin(&TermName::MediumTerm).unwrap();
        assert_eq!(term_based_start_time(end, &medium).unwrap(), "2022-01-16T18:40:43.511Z");
        let long = TermSpec::builtin(&TermName::LongTerm).unwrap();
        assert_eq!(term_based_start_time(end, &long).unwrap(), "2022-01-08T18:40:43.511Z");
    }

    #[test]
    fn test_start_time_has_no_time_of_day_drift() {
        let end = "2023-03-12T09:15:00.000Z";
        for term in TermSpec::defaults() {
            let start = parse_timestamp(&term_based_start_time(end, &term).unwrap()).unwrap();
            let end_ts = parse_timestamp(end).unwrap();
            assert_eq!(
                (end_ts - start).num_milliseconds(),
                (term.duration_in_days * MILLIS_PER_DAY) as i64
            );
            assert_eq!(start.time(), end_ts.time());
        }
    }

    #[test]
    fn test_start_time_out_of_range_is_a_violation() {
        let epoch = TermSpec {
            name: TermName::Custom("epoch".to_string()),
            duration_in_days: 1.0e9,
            plots_datapoints: None,
        };
        let err = term_based_start_time("2022-01-23T18:40:43.511Z", &epoch).unwrap_err();
        assert_eq!(err.label(), "structural");
        assert!(err.to_string().contains("monitoring_start_time"));

        let unbounded = TermSpec {
            duration_in_days: f64::INFINITY,
            ..epoch
        };
        assert!(term_based_start_time("2022-01-23T18:40:43.511Z", &unbounded).is_err());
    }

    #[test]
    fn test_start_time_rejects_malformed_timestamp() {
        assert!(term_based_start_time("yesterday", &short()).is_err());
    }

    #[test]
    fn test_single_fifteen_minute_window() {
        let hours = accumulate_duration(
            0.0,
            &short(),
            "2022-01-23T18:25:43.511Z",
            "2022-01-23T18:40:43.511Z",
        )
        .unwrap();
        assert_eq!(hours, 0.25);
    }

    #[test]
    fn test_duration_clamped_at_short_term_cap() {
        let mut tracker = DurationTracker::new(None);
        let term = short();
        let mut last = 0.0;
        for (start, end) in windows("2022-01-23T18:25:43.511Z", 100) {
            last = tracker.record(&term, &start, &end).unwrap();
        }
        assert_eq!(last, SHORT_TERM_DURATION_IN_HRS_MAX);
    }

    #[test]
    fn test_duration_is_monotone_and_capped_for_every_term() {
        for term in TermSpec::defaults() {
            let mut tracker = DurationTracker::new(None);
            let mut previous = 0.0;
            for (start, end) in windows("2022-01-01T00:00:00.000Z", 1500) {
                let hours = tracker.record(&term, &start, &end).unwrap();
                assert!(hours >= previous, "{} decreased", term.name);
                assert!(hours <= term.max_duration_in_hours());
                previous = hours;
            }
            assert_eq!(previous, term.max_duration_in_hours());
        }
    }

    #[test]
    fn test_override_bypasses_accumulation() {
        let mut tracker = DurationTracker::new(Some(24.0));
        let hours = tracker
            .record(&short(), "2022-01-23T18:25:43.511Z", "2022-01-23T18:40:43.511Z")
            .unwrap();
        assert_eq!(hours, 24.0);
        assert_eq!(tracker.expected(&TermName::LongTerm), 24.0);
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let err = time_diff_in_hours("2022-01-23T18:40:43.511Z", "2022-01-23T18:25:43.511Z").unwrap_err();
        assert_eq!(err.label(), "structural");
    }

    #[test]
    fn test_resolve_terms_defaults_and_names() {
        assert_eq!(resolve_terms(None).unwrap().len(), 3);

        let settings: TermSettings =
            serde_json::from_value(serde_json::json!({"terms": ["short", "long_term"]})).unwrap();
        let specs = resolve_terms(Some(&settings)).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].name, TermName::LongTerm);
        assert_eq!(specs[1].max_duration_in_hours(), LONG_TERM_DURATION_IN_HRS_MAX);
    }

    #[test]
    fn test_resolve_terms_custom_definitions() {
        let settings: TermSettings = serde_json::from_value(serde_json::json!({
            "terms": {"weekly": {"duration_in_days": 3, "plots_datapoint": 3}}
        }))
        .unwrap();
        let specs = resolve_terms(Some(&settings)).unwrap();
        assert_eq!(specs[0].name, TermName::Custom("weekly".to_string()));
        assert_eq!(specs[0].max_duration_in_hours(), 72.0);
        assert_eq!(specs[0].plots_datapoints, Some(3));
    }

    #[test]
    fn test_custom_term_without_duration_is_rejected() {
        let settings: TermSettings =
            serde_json::from_value(serde_json::json!({"terms": ["fortnight"]})).unwrap();
        assert!(resolve_terms(Some(&settings)).is_err());
    }
}
