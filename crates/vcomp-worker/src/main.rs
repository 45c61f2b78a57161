//! Clip composition worker binary.
//!
//! Usage: `vcomp-worker <job.json>` or `vcomp-worker --print-schema`.

use anyhow::{bail, Context};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vcomp_media::{check_ffmpeg, check_ffprobe};
use vcomp_models::CompositionJob;
use vcomp_worker::{metrics, Composer, ComposerConfig};

/// Single-line summary printed to stdout once a job finishes.
#[derive(Debug, Serialize)]
struct JobReport {
    job_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {e:#}");
        std::process::exit(2);
    }

    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vcomp_worker=info".parse()?)
        .add_directive("vcomp_media=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()?;
    }
    Ok(())
}

/// Returns whether the job succeeded.
async fn run() -> anyhow::Result<bool> {
    let arg = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => bail!("usage: vcomp-worker <job.json> | --print-schema"),
    };

    if arg == "--print-schema" {
        let schema = schemars::schema_for!(CompositionJob);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(true);
    }

    info!("Starting vcomp-worker");

    let config = ComposerConfig::from_env();
    info!("Composer config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics::install_prometheus(addr)
            .with_context(|| format!("failed to start metrics exporter on {addr}"))?;
        info!(%addr, "Prometheus exporter listening");
    }

    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;

    let raw = tokio::fs::read_to_string(&arg)
        .await
        .with_context(|| format!("failed to read job file {arg}"))?;
    let job: CompositionJob =
        serde_json::from_str(&raw).with_context(|| format!("invalid job file {arg}"))?;
    let job_id = job.id.to_string();
    let job_timeout = config.job_timeout;

    let composer = Composer::with_ffmpeg(config);

    let result = tokio::select! {
        result = tokio::time::timeout(job_timeout, composer.compose(job)) => match result {
            Ok(result) => result,
            Err(_) => bail!("job {job_id} exceeded {}s", job_timeout.as_secs()),
        },
        _ = tokio::signal::ctrl_c() => {
            bail!("job {job_id} interrupted");
        }
    };

    let (ok, report) = match result {
        Ok(output) => (
            true,
            JobReport {
                job_id,
                status: "completed",
                output: Some(output),
                stage: None,
                sequence_index: None,
                error: None,
            },
        ),
        Err(e) => (
            false,
            JobReport {
                job_id,
                status: "failed",
                output: None,
                stage: Some(e.stage().as_str()),
                sequence_index: e.sequence_index(),
                error: Some(e.to_string()),
            },
        ),
    };

    println!("{}", serde_json::to_string(&report)?);
    info!("Worker shutdown complete");
    Ok(ok)
}
