//! Walk over experiment -> kubernetes object -> monitored unit -> window -> term -> engine

use std::collections::BTreeMap;

use super::plots::{require_plot_keys, validate_plots};
use super::{VerificationReport, VerifyOptions};
use crate::config::VerifierConfig;
use crate::error::{Location, Violation, ViolationKind};
use crate::metrics::{extract_metrics, extract_namespace_metrics};
use crate::models::{
    ContainerEntry, EngineName, EngineRecommendation, ExperimentDefinition, ExperimentRecommendations,
    ExperimentType, KubernetesObject, MeasurementWindow, Metric, RecommendationEntry, RecommendationSet,
    Term,
};
use crate::notifications::{
    assert_canonical_notification, describe, recommendations_present, reject_error_notifications,
    NotificationCode,
};
use crate::reconcile::{validate_config, validate_variation};
use crate::term::{parse_timestamp, resolve_terms, round2, term_based_start_time, DurationTracker, TermSpec};

fn at(location: &Location) -> impl Fn(ViolationKind) -> Violation + '_ {
    move |kind| location.violation(kind)
}

/// A monitored unit as returned by the service
enum Unit<'a> {
    Container {
        image: &'a str,
        recommendations: Option<&'a RecommendationSet>,
    },
    Namespace {
        namespace: &'a str,
        recommendations: Option<&'a RecommendationSet>,
    },
}

impl<'a> Unit<'a> {
    fn recommendations(&self) -> Option<&'a RecommendationSet> {
        match self {
            Unit::Container { recommendations, .. } | Unit::Namespace { recommendations, .. } => *recommendations,
        }
    }

    fn metrics_in(&self, window: &'a MeasurementWindow) -> &'a [Metric] {
        match self {
            Unit::Container { image, .. } => extract_metrics(window, image),
            Unit::Namespace { namespace, .. } => extract_namespace_metrics(window, namespace),
        }
    }

    /// Whether `window` carries a result for this unit
    fn posted_in(&self, window: &MeasurementWindow) -> bool {
        window.kubernetes_objects.iter().any(|object| match self {
            Unit::Container { image, .. } => object
                .containers
                .iter()
                .any(|c| c.container_image_name.as_deref() == Some(*image)),
            Unit::Namespace { namespace, .. } => object
                .namespaces
                .as_ref()
                .and_then(|ns| ns.namespace.as_deref())
                == Some(*namespace),
        })
    }
}

/// Order windows by `interval_end_time`, oldest first. Two windows ending at
/// the same instant are a structural violation.
fn chronological<'w>(
    windows: &[&'w MeasurementWindow],
    location: &Location,
) -> Result<Vec<&'w MeasurementWindow>, Violation> {
    let mut keyed = Vec::with_capacity(windows.len());
    for window in windows.iter().copied() {
        let end = parse_timestamp(&window.interval_end_time)
            .map_err(|kind| location.with_window(window.interval_end_time.as_str()).violation(kind))?;
        keyed.push((end, window));
    }
    keyed.sort_by_key(|(end, _)| *end);

    for pair in keyed.windows(2) {
        if pair[0].0 == pair[1].0 {
            let end = pair[1].1.interval_end_time.as_str();
            return Err(location.with_window(end).violation(ViolationKind::structural(
                "interval_end_time",
                "unique within the experiment",
                end,
            )));
        }
    }
    Ok(keyed.into_iter().map(|(_, window)| window).collect())
}

/// Verification of one created experiment
pub(super) struct ExperimentWalk<'a> {
    experiment: &'a ExperimentDefinition,
    windows: Vec<&'a MeasurementWindow>,
    options: &'a VerifyOptions,
    config: &'a VerifierConfig,
    terms: Vec<TermSpec>,
    engines: Vec<EngineName>,
    location: Location,
}

impl<'a> ExperimentWalk<'a> {
    pub(super) fn new(
        experiment: &'a ExperimentDefinition,
        windows: &[&'a MeasurementWindow],
        options: &'a VerifyOptions,
        config: &'a VerifierConfig,
    ) -> Result<Self, Violation> {
        let location = Location::experiment(&experiment.experiment_name);
        let terms = resolve_terms(experiment.term_settings()).map_err(at(&location))?;
        let windows = chronological(windows, &location)?;
        Ok(Self {
            experiment,
            windows,
            options,
            config,
            terms,
            engines: experiment.engines(),
            location,
        })
    }

    pub(super) fn run(&self, documents: &'a [ExperimentRecommendations], report: &mut VerificationReport) {
        let Some(returned) = documents
            .iter()
            .find(|d| d.experiment_name == self.experiment.experiment_name)
        else {
            report.violations.push(self.location.violation(ViolationKind::missing(
                "experiment is absent from the list-recommendations response",
            )));
            return;
        };

        if let Err(kind) = self.check_experiment_identity(returned) {
            report.violations.push(self.location.violation(kind));
            return;
        }

        for (index, created) in self.experiment.kubernetes_objects.iter().enumerate() {
            let location = self.location.with_object(created.describe());
            let Some(returned_object) = returned.kubernetes_objects.get(index) else {
                report.violations.push(location.violation(ViolationKind::missing(format!(
                    "kubernetes_objects[{}] is absent from the response",
                    index
                ))));
                continue;
            };
            let posted = self
                .windows
                .first()
                .copied()
                .and_then(|w| w.kubernetes_objects.get(index));

            match self.experiment.experiment_type {
                ExperimentType::Container => {
                    self.walk_container_object(created, posted, returned_object, &location, report)
                }
                ExperimentType::Namespace => {
                    self.walk_namespace_object(created, posted, returned_object, &location, report)
                }
            }
        }
    }

    fn check_experiment_identity(&self, returned: &ExperimentRecommendations) -> Result<(), ViolationKind> {
        let created = self.experiment;
        if let Some(version) = &created.version {
            if returned.version.as_ref() != Some(version) {
                return Err(ViolationKind::structural(
                    "version",
                    version,
                    returned.version.as_deref().unwrap_or("<none>"),
                ));
            }
        }
        if let Some(cluster) = &created.cluster_name {
            if returned.cluster_name.as_ref() != Some(cluster) {
                return Err(ViolationKind::structural(
                    "cluster_name",
                    cluster,
                    returned.cluster_name.as_deref().unwrap_or("<none>"),
                ));
            }
        }
        if let Some(kind) = returned.experiment_type {
            if kind != created.experiment_type {
                return Err(ViolationKind::structural("experiment_type", created.experiment_type, kind));
            }
        }
        if returned.kubernetes_objects.len() != created.kubernetes_objects.len() {
            return Err(ViolationKind::structural(
                "kubernetes_objects count",
                created.kubernetes_objects.len(),
                returned.kubernetes_objects.len(),
            ));
        }
        Ok(())
    }

    fn walk_container_object(
        &self,
        created: &'a KubernetesObject,
        posted: Option<&'a KubernetesObject>,
        returned: &'a KubernetesObject,
        location: &Location,
        report: &mut VerificationReport,
    ) {
        if let Err(kind) = check_object_identity(posted.unwrap_or(created), returned) {
            report.violations.push(location.violation(kind));
            return;
        }
        if let Some(namespaces) = &returned.namespaces {
            if namespaces.namespace.is_some() || namespaces.recommendations.is_some() {
                report.violations.push(location.violation(ViolationKind::structural(
                    "namespaces",
                    "absent for a container experiment",
                    namespaces.namespace.as_deref().unwrap_or("<recommendations>"),
                )));
                return;
            }
        }
        if created.containers.len() != returned.containers.len() {
            report.violations.push(location.violation(ViolationKind::structural(
                "container count",
                created.containers.len(),
                returned.containers.len(),
            )));
            return;
        }

        for created_container in &created.containers {
            let name = created_container.container_name.as_deref().unwrap_or("<unnamed>");
            let unit_location = location.with_unit(name);
            let Some(returned_container) = returned
                .containers
                .iter()
                .find(|c| c.container_name == created_container.container_name)
            else {
                report.violations.push(unit_location.violation(ViolationKind::missing(format!(
                    "container {} is absent from the response",
                    name
                ))));
                continue;
            };

            report.units_checked += 1;
            if let Err(violation) = self.walk_container(created_container, returned_container, &unit_location) {
                report.violations.push(violation);
            }
        }
    }

    fn walk_container(
        &self,
        created: &'a ContainerEntry,
        returned: &'a ContainerEntry,
        location: &Location,
    ) -> Result<(), Violation> {
        if returned.container_image_name != created.container_image_name {
            return Err(location.violation(ViolationKind::structural(
                "container_image_name",
                created.container_image_name.as_deref().unwrap_or("<none>"),
                returned.container_image_name.as_deref().unwrap_or("<none>"),
            )));
        }
        let unit = Unit::Container {
            image: created.container_image_name.as_deref().unwrap_or_default(),
            recommendations: returned.recommendations.as_ref(),
        };
        self.walk_unit(&unit, location)
    }

    fn walk_namespace_object(
        &self,
        created: &'a KubernetesObject,
        posted: Option<&'a KubernetesObject>,
        returned: &'a KubernetesObject,
        location: &Location,
        report: &mut VerificationReport,
    ) {
        let expected = posted
            .and_then(|p| p.namespaces.as_ref())
            .or(created.namespaces.as_ref())
            .and_then(|ns| ns.namespace.as_deref());
        let Some(expected) = expected else {
            report.violations.push(location.violation(ViolationKind::missing(
                "namespace experiment does not name its namespace",
            )));
            return;
        };
        let unit_location = location.with_unit(expected);

        let Some(returned_namespace) = &returned.namespaces else {
            report.violations.push(unit_location.violation(ViolationKind::missing(
                "namespaces entry is absent from the response",
            )));
            return;
        };
        if returned_namespace.namespace.as_deref() != Some(expected) {
            report.violations.push(unit_location.violation(ViolationKind::structural(
                "namespaces.namespace",
                expected,
                returned_namespace.namespace.as_deref().unwrap_or("<none>"),
            )));
            return;
        }
        if !returned.containers.is_empty() {
            report.violations.push(unit_location.violation(ViolationKind::structural(
                "containers",
                "empty or absent for a namespace experiment",
                format!("{} entries", returned.containers.len()),
            )));
            return;
        }

        report.units_checked += 1;
        let unit = Unit::Namespace {
            namespace: expected,
            recommendations: returned_namespace.recommendations.as_ref(),
        };
        if let Err(violation) = self.walk_unit(&unit, &unit_location) {
            report.violations.push(violation);
        }
    }

    fn walk_unit(&self, unit: &Unit<'a>, location: &Location) -> Result<(), Violation> {
        let set = unit
            .recommendations()
            .ok_or_else(|| location.violation(ViolationKind::missing("recommendations block is missing")))?;

        let windows: Vec<&'a MeasurementWindow> =
            self.windows.iter().copied().filter(|w| unit.posted_in(w)).collect();
        if windows.is_empty() && recommendations_present(set) {
            return Err(location.violation(ViolationKind::Notification {
                code: NotificationCode::NotEnoughData.to_string(),
                reason: "no results were posted but the unit does not report not enough data".to_string(),
                notifications: describe(&set.notifications),
            }));
        }

        if !recommendations_present(set) {
            assert_canonical_notification(&set.notifications, &NotificationCode::NotEnoughData)
                .map_err(at(location))?;
            if !set.data.is_empty() {
                return Err(location.violation(ViolationKind::structural(
                    "data entries",
                    0,
                    set.data.len(),
                )));
            }
            return Ok(());
        }

        assert_canonical_notification(&set.notifications, &NotificationCode::RecommendationsAvailable)
            .map_err(at(location))?;
        if self.config.reject_error_notifications {
            reject_error_notifications(&set.notifications).map_err(at(location))?;
        }

        let mut durations = DurationTracker::new(self.options.expected_duration_in_hours);
        for window in windows {
            let end = window.interval_end_time.as_str();
            let window_location = location.with_window(end);

            let mut expected_hours = BTreeMap::new();
            for term in &self.terms {
                let hours = durations
                    .record(term, &window.interval_start_time, end)
                    .map_err(at(&window_location))?;
                expected_hours.insert(term.name.clone(), hours);
            }

            let entry = set.data.get(end).ok_or_else(|| {
                window_location.violation(ViolationKind::missing(format!(
                    "no recommendation entry keyed by interval_end_time {}",
                    end
                )))
            })?;
            if let Some(monitoring_end_time) = &entry.monitoring_end_time {
                if monitoring_end_time != end {
                    return Err(window_location.violation(ViolationKind::structural(
                        "monitoring_end_time",
                        end,
                        monitoring_end_time,
                    )));
                }
            }

            self.check_term_names(entry).map_err(at(&window_location))?;
            let entry_present = recommendations_present(entry);
            let metrics = unit.metrics_in(window);

            for term in &self.terms {
                let term_location = window_location.with_term(term.name.as_str());
                let term_obj = entry.recommendation_terms.get(&term.name).ok_or_else(|| {
                    term_location.violation(ViolationKind::missing(format!(
                        "recommendation_terms.{} is missing",
                        term.name
                    )))
                })?;

                if entry_present && recommendations_present(term_obj) {
                    let hours = expected_hours.get(&term.name).copied().unwrap_or_default();
                    self.check_term(term, term_obj, entry, metrics, end, hours, &term_location)?;
                } else {
                    check_term_without_data(term_obj, &term_location)?;
                }
            }
        }

        Ok(())
    }

    fn check_term_names(&self, entry: &RecommendationEntry) -> Result<(), ViolationKind> {
        for name in entry.recommendation_terms.keys() {
            if !self.terms.iter().any(|t| &t.name == name) {
                let configured: Vec<&str> = self.terms.iter().map(|t| t.name.as_str()).collect();
                return Err(ViolationKind::structural(
                    "recommendation_terms",
                    format!("one of [{}]", configured.join(", ")),
                    name,
                ));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_term(
        &self,
        term: &TermSpec,
        term_obj: &Term,
        entry: &RecommendationEntry,
        metrics: &[Metric],
        end: &str,
        expected_hours: f64,
        location: &Location,
    ) -> Result<(), Violation> {
        let expected_start = term_based_start_time(end, term).map_err(at(location))?;
        let reported_start = term_obj
            .monitoring_start_time
            .as_deref()
            .ok_or_else(|| location.violation(ViolationKind::missing("monitoring_start_time is missing")))?;
        if reported_start != expected_start {
            return Err(location.violation(ViolationKind::structural(
                "monitoring_start_time",
                expected_start,
                reported_start,
            )));
        }

        if self.options.checks_duration(&term.name) {
            let reported = term_obj
                .duration_in_hours
                .ok_or_else(|| location.violation(ViolationKind::missing("duration_in_hours is missing")))?;
            if round2(reported) != expected_hours {
                return Err(location.violation(ViolationKind::numeric(
                    "duration_in_hours",
                    expected_hours,
                    reported,
                )));
            }
        }

        if self.config.reject_error_notifications {
            reject_error_notifications(&term_obj.notifications).map_err(at(location))?;
        }

        match (&term_obj.recommendation_engines, &term_obj.config) {
            (Some(engines), _) => self.check_engines(engines, entry, metrics, location)?,
            (None, Some(config)) => {
                validate_config(config, metrics, self.experiment.experiment_type).map_err(at(location))?;
                let variation = term_obj
                    .variation
                    .as_ref()
                    .ok_or_else(|| location.violation(ViolationKind::missing("variation is missing")))?;
                validate_variation(entry.current.as_ref(), config, variation).map_err(at(location))?;
            }
            (None, None) => {
                return Err(location.violation(ViolationKind::missing(
                    "term reports recommendations but carries neither recommendation_engines nor config",
                )))
            }
        }

        if let Some(plots) = &term_obj.plots {
            if self.config.check_plots {
                validate_plots(plots, term).map_err(at(location))?;
            } else {
                require_plot_keys(plots).map_err(at(location))?;
            }
        }

        Ok(())
    }

    fn check_engines(
        &self,
        engines: &BTreeMap<EngineName, EngineRecommendation>,
        entry: &RecommendationEntry,
        metrics: &[Metric],
        location: &Location,
    ) -> Result<(), Violation> {
        let configured: Vec<&str> = self.engines.iter().map(EngineName::as_str).collect();
        for name in engines.keys() {
            if !self.engines.contains(name) {
                return Err(location.violation(ViolationKind::structural(
                    "recommendation_engines",
                    format!("one of [{}]", configured.join(", ")),
                    name,
                )));
            }
        }

        for engine in &self.engines {
            let engine_location = location.with_engine(engine.as_str());
            let engine_obj = engines.get(engine).ok_or_else(|| {
                engine_location.violation(ViolationKind::missing(format!(
                    "recommendation_engines.{} is missing",
                    engine
                )))
            })?;

            if !recommendations_present(engine_obj) {
                check_engine_without_data(engine_obj).map_err(at(&engine_location))?;
                continue;
            }

            let config = engine_obj
                .config
                .as_ref()
                .ok_or_else(|| engine_location.violation(ViolationKind::missing("config is missing")))?;
            validate_config(config, metrics, self.experiment.experiment_type).map_err(at(&engine_location))?;

            let variation = engine_obj
                .variation
                .as_ref()
                .ok_or_else(|| engine_location.violation(ViolationKind::missing("variation is missing")))?;
            validate_variation(entry.current.as_ref(), config, variation).map_err(at(&engine_location))?;

            if self.config.reject_error_notifications {
                reject_error_notifications(&engine_obj.notifications).map_err(at(&engine_location))?;
            }
            if self.options.expect_runtime_recommendations {
                assert_canonical_notification(
                    &engine_obj.notifications,
                    &NotificationCode::RuntimesRecommendationsAvailable,
                )
                .map_err(at(&engine_location))?;
            }
        }

        Ok(())
    }
}

fn check_object_identity(expected: &KubernetesObject, returned: &KubernetesObject) -> Result<(), ViolationKind> {
    let fields = [
        ("type", &expected.kind, &returned.kind),
        ("name", &expected.name, &returned.name),
        ("namespace", &expected.namespace, &returned.namespace),
    ];
    for (field, want, got) in fields {
        if want != got {
            return Err(ViolationKind::structural(
                field,
                want.as_deref().unwrap_or("<none>"),
                got.as_deref().unwrap_or("<none>"),
            ));
        }
    }
    Ok(())
}

/// A term without data must not carry plots, config or variation anywhere
fn check_term_without_data(term_obj: &Term, location: &Location) -> Result<(), Violation> {
    if term_obj.plots.is_some() {
        return Err(location.violation(ViolationKind::missing(
            "plots present on a term without recommendations",
        )));
    }
    if term_obj.config.is_some() || term_obj.variation.is_some() {
        return Err(location.violation(ViolationKind::missing(format!(
            "config/variation present although notifications report no recommendation ({})",
            describe(&term_obj.notifications)
        ))));
    }
    if let Some(engines) = &term_obj.recommendation_engines {
        for (name, engine_obj) in engines {
            check_engine_without_data(engine_obj).map_err(at(&location.with_engine(name.as_str())))?;
        }
    }
    Ok(())
}

fn check_engine_without_data(engine_obj: &EngineRecommendation) -> Result<(), ViolationKind> {
    if engine_obj.config.is_some() || engine_obj.variation.is_some() {
        return Err(ViolationKind::missing(format!(
            "config/variation present although notifications report no recommendation ({})",
            describe(&engine_obj.notifications)
        )));
    }
    Ok(())
}
