//! CLI integration tests

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const EXPERIMENT: &str = "quarkus-resteasy-kruize-min-http-response-time-db";
const START: &str = "2022-01-23T18:25:43.511Z";
const END: &str = "2022-01-23T18:40:43.511Z";

/// Run the `rv` binary with an isolated home directory
fn rv(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rv"))
        .args(args)
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn resources(req_cpu: f64, req_mem: f64, lim_cpu: f64, lim_mem: f64) -> Value {
    json!({
        "requests": {"cpu": {"amount": req_cpu, "format": "cores"}, "memory": {"amount": req_mem, "format": "MiB"}},
        "limits": {"cpu": {"amount": lim_cpu, "format": "cores"}, "memory": {"amount": lim_mem, "format": "MiB"}}
    })
}

fn engine(code: &str, message: &str) -> Value {
    json!({
        "pods_count": 1,
        "confidence_level": 0.0,
        "config": resources(2.5, 512.0, 3.0, 640.0),
        "variation": resources(1.5, 112.0, 1.0, -160.0),
        "notifications": {code: {"type": "info", "message": message}}
    })
}

fn not_enough_data() -> Value {
    json!({"120001": {"type": "info", "message": "There is not enough data available to generate a recommendation."}})
}

fn experiments() -> Value {
    json!([{
        "version": "v2.0",
        "experiment_name": EXPERIMENT,
        "cluster_name": "cluster-one-division-bell",
        "kubernetes_objects": [{
            "type": "deployment",
            "name": "tfb-qrh-sample",
            "namespace": "default",
            "containers": [{"container_image_name": "kruize/tfb-db:1.15", "container_name": "tfb-server-0"}]
        }]
    }])
}

fn results() -> Value {
    json!([{
        "version": "v2.0",
        "experiment_name": EXPERIMENT,
        "interval_start_time": START,
        "interval_end_time": END,
        "kubernetes_objects": [{
            "type": "deployment",
            "name": "tfb-qrh-sample",
            "namespace": "default",
            "containers": [{
                "container_image_name": "kruize/tfb-db:1.15",
                "container_name": "tfb-server-0",
                "metrics": [
                    {"name": "cpuUsage", "results": {"aggregation_info": {"avg": 0.8, "format": "cores"}}},
                    {"name": "memoryUsage", "results": {"aggregation_info": {"avg": 310.0, "format": "MiB"}}}
                ]
            }]
        }]
    }])
}

fn recommendations(duration_in_hours: f64) -> Value {
    let available = json!({"111000": {"type": "info", "message": "Recommendations Are Available"}});
    json!([{
        "version": "v2.0",
        "experiment_name": EXPERIMENT,
        "cluster_name": "cluster-one-division-bell",
        "kubernetes_objects": [{
            "type": "deployment",
            "name": "tfb-qrh-sample",
            "namespace": "default",
            "containers": [{
                "container_image_name": "kruize/tfb-db:1.15",
                "container_name": "tfb-server-0",
                "recommendations": {
                    "version": "v2.0",
                    "notifications": available,
                    "data": {
                        END: {
                            "notifications": available,
                            "monitoring_end_time": END,
                            "current": resources(1.0, 400.0, 2.0, 800.0),
                            "recommendation_terms": {
                                "short_term": {
                                    "duration_in_hours": duration_in_hours,
                                    "monitoring_start_time": "2022-01-22T18:40:43.511Z",
                                    "notifications": {"111101": {"type": "info", "message": "Short Term Recommendations Available"}},
                                    "recommendation_engines": {
                                        "cost": engine("112101", "Cost Recommendations Available"),
                                        "performance": engine("112102", "Performance Recommendations Available")
                                    }
                                },
                                "medium_term": {"notifications": not_enough_data()},
                                "long_term": {"notifications": not_enough_data()}
                            }
                        }
                    }
                }
            }]
        }]
    }])
}

fn write(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, value.to_string()).unwrap();
    path
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = rv(home.path(), &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("verify"), "Should show verify command");
    assert!(stdout.contains("fetch"), "Should show fetch command");
    assert!(stdout.contains("window"), "Should show window command");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("RV_API_URL"), "Should show env var");
    assert!(stdout.contains("--metrics-file"), "Should show metrics-file option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = rv(home.path(), &["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("rv"), "Should show binary name");
}

/// Test verify subcommand help
#[test]
fn test_verify_help() {
    let home = TempDir::new().unwrap();
    let output = rv(home.path(), &["verify", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Verify help should succeed");
    assert!(stdout.contains("--expected-duration-hours"));
    assert!(stdout.contains("--duration-term"));
    assert!(stdout.contains("--runtime-recommendations"));
}

#[test]
fn test_window_prints_term_start_times() {
    let home = TempDir::new().unwrap();
    let output = rv(home.path(), &["--format", "json", "window", "--end-time", END]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let rows: Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["term"], "short_term");
    assert_eq!(rows[0]["monitoring_start_time"], "2022-01-22T18:40:43.511Z");
    assert_eq!(rows[1]["monitoring_start_time"], "2022-01-16T18:40:43.511Z");
    assert_eq!(rows[2]["max_duration_in_hours"], 360.0);
}

#[test]
fn test_window_rejects_unknown_term() {
    let home = TempDir::new().unwrap();
    let output = rv(home.path(), &["window", "--end-time", END, "--term", "fortnight"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("fortnight"));
}

#[test]
fn test_verify_consistent_documents() {
    let dir = TempDir::new().unwrap();
    let experiment = write(&dir, "experiment.json", &experiments());
    let results = write(&dir, "results.json", &results());
    let recs = write(&dir, "recommendations.json", &recommendations(0.25));

    let output = rv(
        dir.path(),
        &[
            "--format",
            "json",
            "verify",
            "--experiment",
            experiment.to_str().unwrap(),
            "--results",
            results.to_str().unwrap(),
            "--recommendations",
            recs.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["units_checked"], 1);
    assert_eq!(report["violations"], json!([]));
}

#[test]
fn test_verify_reports_violations_and_fails() {
    let dir = TempDir::new().unwrap();
    let experiment = write(&dir, "experiment.json", &experiments());
    let results = write(&dir, "results.json", &results());
    let recs = write(&dir, "recommendations.json", &recommendations(24.0));
    let metrics = dir.path().join("metrics.prom");

    let output = rv(
        dir.path(),
        &[
            "--format",
            "json",
            "--metrics-file",
            metrics.to_str().unwrap(),
            "verify",
            "--experiment",
            experiment.to_str().unwrap(),
            "--results",
            results.to_str().unwrap(),
            "--recommendations",
            recs.to_str().unwrap(),
        ],
    );
    assert!(!output.status.success(), "Inconsistent duration should fail");

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    let violation = &report["violations"][0];
    assert_eq!(violation["kind"]["kind"], "numeric");
    assert_eq!(violation["kind"]["expected"], 0.25);
    assert_eq!(violation["location"]["term"], "short_term");

    let exposition = std::fs::read_to_string(&metrics).unwrap();
    assert!(exposition.contains("recommendation_verifier_violations_total"));
}

#[test]
fn test_verify_override_duration() {
    let dir = TempDir::new().unwrap();
    let experiment = write(&dir, "experiment.json", &experiments());
    let results = write(&dir, "results.json", &results());
    let recs = write(&dir, "recommendations.json", &recommendations(24.0));

    let output = rv(
        dir.path(),
        &[
            "verify",
            "--experiment",
            experiment.to_str().unwrap(),
            "--results",
            results.to_str().unwrap(),
            "--recommendations",
            recs.to_str().unwrap(),
            "--expected-duration-hours",
            "24",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_verify_missing_file() {
    let dir = TempDir::new().unwrap();
    let output = rv(
        dir.path(),
        &[
            "verify",
            "--experiment",
            "does-not-exist.json",
            "--results",
            "does-not-exist.json",
            "--recommendations",
            "does-not-exist.json",
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read"));
}

#[test]
fn test_fetch_verifies_service_response() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/listRecommendations")
        .match_query(mockito::Matcher::UrlEncoded(
            "experiment_name".into(),
            EXPERIMENT.into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(recommendations(0.25).to_string())
        .create();

    let dir = TempDir::new().unwrap();
    let experiment = write(&dir, "experiment.json", &experiments());
    let results = write(&dir, "results.json", &results());
    let url = server.url();

    let output = rv(
        dir.path(),
        &[
            "--api-url",
            &url,
            "fetch",
            "--experiment",
            experiment.to_str().unwrap(),
            "--results",
            results.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    mock.assert();
}

#[test]
fn test_fetch_surfaces_api_errors() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/listRecommendations")
        .match_query(mockito::Matcher::Any)
        .with_status(400)
        .with_body("Experiment not found")
        .create();

    let dir = TempDir::new().unwrap();
    let experiment = write(&dir, "experiment.json", &experiments());
    let results = write(&dir, "results.json", &results());
    let url = server.url();

    let output = rv(
        dir.path(),
        &[
            "--api-url",
            &url,
            "fetch",
            "--experiment",
            experiment.to_str().unwrap(),
            "--results",
            results.to_str().unwrap(),
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("400"), "{}", stderr);
}

#[test]
fn test_config_file_disables_error_notification_check() {
    let dir = TempDir::new().unwrap();
    let experiment = write(&dir, "experiment.json", &experiments());
    let results = write(&dir, "results.json", &results());
    let mut recs = recommendations(0.25);
    recs[0]["kubernetes_objects"][0]["containers"][0]["recommendations"]["data"][END]["recommendation_terms"]
        ["short_term"]["notifications"]["221001"] =
        json!({"type": "error", "message": "Number of pods cannot be zero"});
    let recs = write(&dir, "recommendations.json", &recs);

    let args = |config: Option<&str>| {
        let mut args = Vec::new();
        if let Some(config) = config {
            args.extend(["--config".to_string(), config.to_string()]);
        }
        args.extend([
            "verify".to_string(),
            "--experiment".to_string(),
            experiment.to_str().unwrap().to_string(),
            "--results".to_string(),
            results.to_str().unwrap().to_string(),
            "--recommendations".to_string(),
            recs.to_str().unwrap().to_string(),
        ]);
        args
    };

    let strict = args(None);
    let strict: Vec<&str> = strict.iter().map(String::as_str).collect();
    assert!(!rv(dir.path(), &strict).status.success());

    let config = dir.path().join("rv.toml");
    std::fs::write(&config, "reject_error_notifications = false\n").unwrap();
    let lenient = args(config.to_str());
    let lenient: Vec<&str> = lenient.iter().map(String::as_str).collect();
    let output = rv(dir.path(), &lenient);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
}
