//! Raw measurement lookup in posted result windows

use crate::models::{ExperimentType, MeasurementWindow, Metric, Resource};

pub const CPU_REQUEST: &str = "cpuRequest";
pub const CPU_LIMIT: &str = "cpuLimit";
pub const CPU_USAGE: &str = "cpuUsage";
pub const CPU_THROTTLE: &str = "cpuThrottle";
pub const MEMORY_REQUEST: &str = "memoryRequest";
pub const MEMORY_LIMIT: &str = "memoryLimit";
pub const MEMORY_USAGE: &str = "memoryUsage";
pub const MEMORY_RSS: &str = "memoryRSS";

pub const NAMESPACE_CPU_USAGE: &str = "namespaceCpuUsage";
pub const NAMESPACE_MEMORY_USAGE: &str = "namespaceMemoryUsage";

/// Metrics posted for the container running `container_image_name`
///
/// Returns an empty slice when no container in the window matches. Callers
/// that need a usage metric report that as missing data.
pub fn extract_metrics<'a>(window: &'a MeasurementWindow, container_image_name: &str) -> &'a [Metric] {
    let found = window
        .kubernetes_objects
        .iter()
        .flat_map(|obj| obj.containers.iter())
        .find(|c| c.container_image_name.as_deref() == Some(container_image_name));

    match found {
        Some(container) => &container.metrics,
        None => {
            tracing::debug!(
                interval_end_time = %window.interval_end_time,
                container_image_name = %container_image_name,
                "No posted metrics for container"
            );
            &[]
        }
    }
}

/// Metrics posted for a namespace experiment's `namespace`
pub fn extract_namespace_metrics<'a>(window: &'a MeasurementWindow, namespace: &str) -> &'a [Metric] {
    let found = window
        .kubernetes_objects
        .iter()
        .filter_map(|obj| obj.namespaces.as_ref())
        .find(|ns| ns.namespace.as_deref() == Some(namespace));

    match found {
        Some(entry) => &entry.metrics,
        None => {
            tracing::debug!(
                interval_end_time = %window.interval_end_time,
                namespace = %namespace,
                "No posted metrics for namespace"
            );
            &[]
        }
    }
}

pub fn find_metric<'a>(metrics: &'a [Metric], name: &str) -> Option<&'a Metric> {
    metrics.iter().find(|m| m.name == name)
}

/// Usage metric whose unit a recommendation for `resource` must be expressed in
pub fn usage_metric_name(resource: Resource, experiment_type: ExperimentType) -> &'static str {
    match (experiment_type, resource) {
        (ExperimentType::Container, Resource::Cpu) => CPU_USAGE,
        (ExperimentType::Container, Resource::Memory) => MEMORY_USAGE,
        (ExperimentType::Namespace, Resource::Cpu) => NAMESPACE_CPU_USAGE,
        (ExperimentType::Namespace, Resource::Memory) => NAMESPACE_MEMORY_USAGE,
    }
}

/// `format` recorded on the usage metric for `resource`
pub fn usage_format(
    metrics: &[Metric],
    resource: Resource,
    experiment_type: ExperimentType,
) -> Option<&str> {
    find_metric(metrics, usage_metric_name(resource, experiment_type))
        .and_then(|m| m.results.aggregation_info.as_ref())
        .and_then(|info| info.format.as_deref())
}
