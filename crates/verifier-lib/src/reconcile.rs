//! Recommended configuration and variation reconciliation
//!
//! A recommendation must be expressed in the unit family the telemetry was
//! collected in, and its variation must be exactly `recommended - current`.

use std::collections::BTreeMap;

use crate::error::ViolationKind;
use crate::metrics::{usage_format, usage_metric_name};
use crate::models::{ExperimentType, Metric, Quantity, ResourceConfig, Resource, Usage};

/// Check amounts and formats of a recommended config against posted metrics
///
/// Container experiments must recommend both `requests` and `limits` for both
/// `cpu` and `memory`; namespace experiments are checked on what they carry.
pub fn validate_config(
    recommended: &ResourceConfig,
    metrics: &[Metric],
    experiment_type: ExperimentType,
) -> Result<(), ViolationKind> {
    let complete = experiment_type == ExperimentType::Container;

    for usage in Usage::ALL {
        let Some(set) = recommended.usage(usage) else {
            if complete {
                return Err(ViolationKind::missing(format!("config.{} is missing", usage.as_str())));
            }
            continue;
        };

        for resource in Resource::ALL {
            let path = format!("{}.{}", usage.as_str(), resource.as_str());
            let Some(quantity) = set.resource(resource) else {
                if complete {
                    return Err(ViolationKind::missing(format!("config.{} is missing", path)));
                }
                continue;
            };

            let amount = quantity
                .amount
                .ok_or_else(|| ViolationKind::missing(format!("config.{}.amount is missing", path)))?;
            if amount <= 0.0 || amount.is_nan() {
                return Err(ViolationKind::structural(format!("{}.amount", path), "> 0", amount));
            }

            let expected_format = usage_format(metrics, resource, experiment_type).ok_or_else(|| {
                ViolationKind::missing(format!(
                    "no {} metric with a format was posted to compare config.{}.format against",
                    usage_metric_name(resource, experiment_type),
                    path
                ))
            })?;
            let format = quantity
                .format
                .as_deref()
                .ok_or_else(|| ViolationKind::missing(format!("config.{}.format is missing", path)))?;
            if format != expected_format {
                return Err(ViolationKind::structural(
                    format!("{}.format", path),
                    expected_format,
                    format,
                ));
            }
        }
    }

    Ok(())
}

/// Variation the service should report for `recommended` over `current`
///
/// A missing `current` (or a missing amount in it) counts as zero.
pub fn expected_variation(current: Option<&ResourceConfig>, recommended: &ResourceConfig) -> ResourceConfig {
    let mut variation = ResourceConfig::default();

    for usage in Usage::ALL {
        let Some(set) = recommended.usage(usage) else {
            continue;
        };
        let target = variation.usage_mut(usage).get_or_insert_with(Default::default);
        for resource in Resource::ALL {
            let Some(quantity) = set.resource(resource) else {
                continue;
            };
            let baseline = current
                .and_then(|c| c.quantity(usage, resource))
                .and_then(|q| q.amount)
                .unwrap_or(0.0);
            *target.resource_mut(resource) = Some(Quantity {
                amount: quantity.amount.map(|amount| amount - baseline),
                format: quantity.format.clone(),
                extra: BTreeMap::new(),
            });
        }
    }

    variation
}

/// Check a reported variation against `recommended - current`
pub fn validate_variation(
    current: Option<&ResourceConfig>,
    recommended: &ResourceConfig,
    variation: &ResourceConfig,
) -> Result<(), ViolationKind> {
    let expected_keys = recommended.key_paths();
    let actual_keys = variation.key_paths();
    if expected_keys != actual_keys {
        let missing: Vec<&str> = expected_keys.difference(&actual_keys).map(String::as_str).collect();
        let extra: Vec<&str> = actual_keys.difference(&expected_keys).map(String::as_str).collect();
        return Err(ViolationKind::structural(
            "variation keys",
            format!("same keys as config (missing: [{}])", missing.join(", ")),
            format!("extra: [{}]", extra.join(", ")),
        ));
    }

    let expected = expected_variation(current, recommended);
    for usage in Usage::ALL {
        for resource in Resource::ALL {
            let Some(want) = expected.quantity(usage, resource) else {
                continue;
            };
            let path = format!("{}.{}", usage.as_str(), resource.as_str());
            let got = variation
                .quantity(usage, resource)
                .ok_or_else(|| ViolationKind::missing(format!("variation.{} is missing", path)))?;

            if let (Some(want_amount), Some(got_amount)) = (want.amount, got.amount) {
                if want_amount != got_amount {
                    return Err(ViolationKind::numeric(
                        format!("{}.amount", path),
                        want_amount,
                        got_amount,
                    ));
                }
            }
            if want.format != got.format {
                return Err(ViolationKind::structural(
                    format!("{}.format", path),
                    want.format.as_deref().unwrap_or("<none>"),
                    got.format.as_deref().unwrap_or("<none>"),
                ));
            }
        }
    }

    Ok(())
}
