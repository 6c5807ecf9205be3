//! Data model of the documents exchanged with the recommendation service
//!
//! The same [`KubernetesObject`] shape appears in all three documents: created
//! experiments carry identities only, posted results add `metrics`, and the
//! list-recommendations response adds `recommendations`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::notifications::{NotificationBlock, Notifications};
use crate::term::{TermName, TermSettings};

/// Whether an experiment monitors containers or a whole namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentType {
    #[default]
    #[serde(alias = "CONTAINER")]
    Container,
    #[serde(alias = "NAMESPACE")]
    Namespace,
}

impl fmt::Display for ExperimentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentType::Container => f.write_str("container"),
            ExperimentType::Namespace => f.write_str("namespace"),
        }
    }
}

/// Name of a recommendation engine
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EngineName {
    Cost,
    Performance,
    Custom(String),
}

impl EngineName {
    pub const DEFAULTS: [EngineName; 2] = [EngineName::Cost, EngineName::Performance];

    pub fn as_str(&self) -> &str {
        match self {
            EngineName::Cost => "cost",
            EngineName::Performance => "performance",
            EngineName::Custom(name) => name,
        }
    }
}

impl From<&str> for EngineName {
    fn from(value: &str) -> Self {
        match value {
            "cost" => EngineName::Cost,
            "performance" => EngineName::Performance,
            other => EngineName::Custom(other.to_string()),
        }
    }
}

impl From<String> for EngineName {
    fn from(value: String) -> Self {
        EngineName::from(value.as_str())
    }
}

impl From<EngineName> for String {
    fn from(value: EngineName) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EngineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a create-experiment document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    #[serde(default)]
    pub version: Option<String>,
    pub experiment_name: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub experiment_type: ExperimentType,
    #[serde(default)]
    pub kubernetes_objects: Vec<KubernetesObject>,
    #[serde(default)]
    pub recommendation_settings: Option<RecommendationSettings>,
}

impl ExperimentDefinition {
    pub fn term_settings(&self) -> Option<&TermSettings> {
        self.recommendation_settings
            .as_ref()
            .and_then(|s| s.term_settings.as_ref())
    }

    /// Engines the service is expected to report on
    pub fn engines(&self) -> Vec<EngineName> {
        self.recommendation_settings
            .as_ref()
            .and_then(|s| s.model_settings.as_ref())
            .filter(|m| !m.models.is_empty())
            .map(|m| m.models.clone())
            .unwrap_or_else(|| EngineName::DEFAULTS.to_vec())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_settings: Option<TermSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_settings: Option<ModelSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub models: Vec<EngineName>,
}

/// Workload or namespace entry shared by all three documents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesObject {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub containers: Vec<ContainerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<NamespaceEntry>,
}

impl KubernetesObject {
    /// `type/namespace/name`, for locations and messages
    pub fn describe(&self) -> String {
        match &self.namespaces {
            Some(ns) if self.kind.is_none() => format!("namespace/{}", ns.namespace.as_deref().unwrap_or("?")),
            _ => format!(
                "{}/{}/{}",
                self.kind.as_deref().unwrap_or("?"),
                self.namespace.as_deref().unwrap_or("?"),
                self.name.as_deref().unwrap_or("?")
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<RecommendationSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceEntry {
    #[serde(default, alias = "namespace_name", skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<RecommendationSet>,
}

/// One entry of an update-results document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub experiment_name: String,
    pub interval_start_time: String,
    pub interval_end_time: String,
    #[serde(default)]
    pub kubernetes_objects: Vec<KubernetesObject>,
}

/// A named raw measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(default)]
    pub results: MetricResults,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_info: Option<AggregationInfo>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// One entry of a list-recommendations response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRecommendations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub experiment_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_type: Option<ExperimentType>,
    #[serde(default)]
    pub kubernetes_objects: Vec<KubernetesObject>,
}

/// Recommendations for one monitored unit, keyed by monitoring end time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub notifications: Notifications,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: BTreeMap<String, RecommendationEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationEntry {
    #[serde(default)]
    pub notifications: Notifications,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<ResourceConfig>,
    #[serde(default)]
    pub recommendation_terms: BTreeMap<TermName, Term>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Term {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_start_time: Option<String>,
    #[serde(default)]
    pub notifications: Notifications,
    /// Term-level config, as emitted by services that predate engines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ResourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<ResourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_engines: Option<BTreeMap<EngineName, EngineRecommendation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plots: Option<Plots>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineRecommendation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ResourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<ResourceConfig>,
    #[serde(default)]
    pub notifications: Notifications,
}

/// Box-plot block attached to a term
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datapoints: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plots_data: Option<BTreeMap<String, BTreeMap<String, BoxStats>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q3: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// `requests` or `limits`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Requests,
    Limits,
}

impl Usage {
    pub const ALL: [Usage; 2] = [Usage::Requests, Usage::Limits];

    pub fn as_str(&self) -> &'static str {
        match self {
            Usage::Requests => "requests",
            Usage::Limits => "limits",
        }
    }
}

/// `cpu` or `memory`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Cpu,
    Memory,
}

impl Resource {
    pub const ALL: [Resource; 2] = [Resource::Cpu, Resource::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Cpu => "cpu",
            Resource::Memory => "memory",
        }
    }
}

/// `requests|limits -> cpu|memory -> {amount, format}`
///
/// Every level keeps unknown keys so shape comparison sees fields the typed
/// model does not name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceSet>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Quantity>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Quantity {
    pub fn new(amount: f64, format: impl Into<String>) -> Self {
        Self {
            amount: Some(amount),
            format: Some(format.into()),
            extra: BTreeMap::new(),
        }
    }
}

impl ResourceConfig {
    pub fn usage(&self, usage: Usage) -> Option<&ResourceSet> {
        match usage {
            Usage::Requests => self.requests.as_ref(),
            Usage::Limits => self.limits.as_ref(),
        }
    }

    pub fn usage_mut(&mut self, usage: Usage) -> &mut Option<ResourceSet> {
        match usage {
            Usage::Requests => &mut self.requests,
            Usage::Limits => &mut self.limits,
        }
    }

    pub fn quantity(&self, usage: Usage, resource: Resource) -> Option<&Quantity> {
        self.usage(usage).and_then(|set| set.resource(resource))
    }

    /// Dotted paths of every key present, e.g. `requests.cpu.amount`
    pub fn key_paths(&self) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        for usage in Usage::ALL {
            if let Some(set) = self.usage(usage) {
                set.collect_paths(usage.as_str(), &mut paths);
            }
        }
        collect_value_paths("", &self.extra, &mut paths);
        paths
    }
}

impl ResourceSet {
    pub fn resource(&self, resource: Resource) -> Option<&Quantity> {
        match resource {
            Resource::Cpu => self.cpu.as_ref(),
            Resource::Memory => self.memory.as_ref(),
        }
    }

    pub fn resource_mut(&mut self, resource: Resource) -> &mut Option<Quantity> {
        match resource {
            Resource::Cpu => &mut self.cpu,
            Resource::Memory => &mut self.memory,
        }
    }

    fn collect_paths(&self, prefix: &str, paths: &mut BTreeSet<String>) {
        paths.insert(prefix.to_string());
        for resource in Resource::ALL {
            if let Some(quantity) = self.resource(resource) {
                let base = format!("{}.{}", prefix, resource.as_str());
                paths.insert(base.clone());
                if quantity.amount.is_some() {
                    paths.insert(format!("{}.amount", base));
                }
                if quantity.format.is_some() {
                    paths.insert(format!("{}.format", base));
                }
                collect_value_paths(&base, &quantity.extra, paths);
            }
        }
        collect_value_paths(prefix, &self.extra, paths);
    }
}

fn collect_value_paths<'a>(
    prefix: &str,
    entries: impl IntoIterator<Item = (&'a String, &'a Value)>,
    paths: &mut BTreeSet<String>,
) {
    for (key, value) in entries {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        if let Value::Object(inner) = value {
            collect_value_paths(&path, inner.iter(), paths);
        }
        paths.insert(path);
    }
}

impl NotificationBlock for RecommendationSet {
    fn notifications(&self) -> &Notifications {
        &self.notifications
    }
}

impl NotificationBlock for RecommendationEntry {
    fn notifications(&self) -> &Notifications {
        &self.notifications
    }
}

impl NotificationBlock for Term {
    fn notifications(&self) -> &Notifications {
        &self.notifications
    }
}

impl NotificationBlock for EngineRecommendation {
    fn notifications(&self) -> &Notifications {
        &self.notifications
    }
}

/// Treat an explicit JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_engine_names_parse_closed_set_and_extension() {
        assert_eq!(EngineName::from("cost"), EngineName::Cost);
        assert_eq!(EngineName::from("gpu"), EngineName::Custom("gpu".to_string()));
    }

    #[test]
    fn test_experiment_engines_default_and_configured() {
        let exp: ExperimentDefinition = serde_json::from_value(json!({
            "experiment_name": "exp",
        }))
        .unwrap();
        assert_eq!(exp.engines(), vec![EngineName::Cost, EngineName::Performance]);

        let exp: ExperimentDefinition = serde_json::from_value(json!({
            "experiment_name": "exp",
            "recommendation_settings": {"threshold": "0.1", "model_settings": {"models": ["performance"]}}
        }))
        .unwrap();
        assert_eq!(exp.engines(), vec![EngineName::Performance]);
    }

    #[test]
    fn test_resource_config_key_paths_include_unknown_fields() {
        let config: ResourceConfig = serde_json::from_value(json!({
            "requests": {"cpu": {"amount": 1.0, "format": "cores"}, "nvidia.com/gpu": {"amount": 1}},
            "limits": {"memory": {"amount": 10.0}}
        }))
        .unwrap();
        let paths = config.key_paths();
        assert!(paths.contains("requests.cpu.amount"));
        assert!(paths.contains("requests.cpu.format"));
        assert!(paths.contains("requests.nvidia.com/gpu.amount"));
        assert!(paths.contains("limits.memory.amount"));
        assert!(!paths.contains("limits.memory.format"));
    }

    #[test]
    fn test_null_containers_and_data_decode_as_empty() {
        let obj: KubernetesObject = serde_json::from_value(json!({
            "containers": null,
            "namespaces": {"namespace_name": "ns1", "recommendations": {"notifications": {}, "data": null}}
        }))
        .unwrap();
        assert!(obj.containers.is_empty());
        let ns = obj.namespaces.unwrap();
        assert_eq!(ns.namespace.as_deref(), Some("ns1"));
        assert!(ns.recommendations.unwrap().data.is_empty());
    }
}
