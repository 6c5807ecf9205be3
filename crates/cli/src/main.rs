//! Recommendation Verifier CLI
//!
//! A command-line tool for checking a recommendation service's
//! list-recommendations output against the experiments and results posted to it.

mod client;
mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use prometheus::{Encoder, TextEncoder};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use verifier_lib::{LogFormat, TermName, Verifier, VerifyOptions};

use commands::{fetch, verify, window};

/// Recommendation Verifier CLI
#[derive(Parser)]
#[command(name = "rv")]
#[command(author, version, about = "CLI for verifying recommendation service output", long_about = None)]
pub struct Cli {
    /// Recommendation service URL (can also be set via RV_API_URL env var)
    #[arg(long, env = "RV_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Verifier config file (defaults to ~/.config/rv/config.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write Prometheus metrics in text format to this file on exit
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify a saved list-recommendations response
    Verify {
        /// create-experiment JSON array
        #[arg(long)]
        experiment: PathBuf,

        /// update-results JSON array, in posting order
        #[arg(long)]
        results: PathBuf,

        /// list-recommendations JSON array
        #[arg(long)]
        recommendations: PathBuf,

        #[command(flatten)]
        expect: ExpectArgs,
    },

    /// Fetch recommendations from the service and verify them
    Fetch {
        /// create-experiment JSON array
        #[arg(long)]
        experiment: PathBuf,

        /// update-results JSON array, in posting order
        #[arg(long)]
        results: PathBuf,

        #[command(flatten)]
        expect: ExpectArgs,
    },

    /// Show monitoring windows for a given end time
    Window {
        /// Monitoring end time (e.g. 2022-01-23T18:40:43.511Z)
        #[arg(long)]
        end_time: String,

        /// Term to show (repeatable; defaults to short, medium and long term)
        #[arg(long = "term")]
        terms: Vec<String>,
    },
}

#[derive(Args)]
pub struct ExpectArgs {
    /// Expect this duration_in_hours on every term instead of accumulating windows
    #[arg(long)]
    pub expected_duration_hours: Option<f64>,

    /// Only compare duration_in_hours on this term (repeatable)
    #[arg(long = "duration-term")]
    pub duration_terms: Vec<String>,

    /// Require the runtimes-recommendations notification on every engine
    #[arg(long)]
    pub runtime_recommendations: bool,
}

impl ExpectArgs {
    fn options(&self) -> VerifyOptions {
        let mut options = VerifyOptions::default();
        if let Some(hours) = self.expected_duration_hours {
            options = options.with_expected_duration(hours);
        }
        if !self.duration_terms.is_empty() {
            options = options.with_duration_terms(
                self.duration_terms.iter().map(|t| TermName::from(t.as_str())).collect(),
            );
        }
        if self.runtime_recommendations {
            options = options.expecting_runtime_recommendations();
        }
        options
    }
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the report; logs go to stderr
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

fn write_metrics(path: &Path) -> Result<()> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    std::fs::write(path, buffer)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verifier_config = config::load(cli.config.as_deref())?;
    init_tracing(verifier_config.log_format, cli.verbose);
    let verifier = Verifier::with_config(verifier_config);

    // Execute command
    let outcome = match &cli.command {
        Commands::Verify {
            experiment,
            results,
            recommendations,
            expect,
        } => verify::run(
            &verifier,
            experiment,
            results,
            recommendations,
            &expect.options(),
            cli.format,
        ),
        Commands::Fetch {
            experiment,
            results,
            expect,
        } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            fetch::run(&client, &verifier, experiment, results, &expect.options(), cli.format).await
        }
        Commands::Window { end_time, terms } => window::run(end_time, terms, cli.format),
    };

    if let Some(path) = &cli.metrics_file {
        write_metrics(path)?;
    }

    outcome
}
