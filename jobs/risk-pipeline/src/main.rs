//! Risk Pipeline
//!
//! Defines the septic shock risk pipeline (ingest from the warehouse,
//! train, register, deploy), compiles it to a YAML descriptor and prepares
//! a run request as a dry run. Nothing is submitted.

mod compiler;
mod components;
mod graph;
mod job;
mod label;
mod pipeline;

use std::path::Path;

use chrono::Utc;
use tracing::{error, info, warn};
use vitals_core::{GcpTokenSource, PipelineConfig, Result};
use vitals_telemetry::Progress;

use compiler::{compile, write_descriptor, PipelineSpec, DESCRIPTOR_FILE};
use components::all_components;
use job::{build_request, prepare};
use pipeline::{septic_risk_graph, PipelineParameters};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    let _telemetry = vitals_telemetry::init("risk-pipeline", &config)?;

    info!(location = %config.vertex_location, "Starting risk pipeline definition");

    let progress = Progress::new();
    let params = PipelineParameters::from_config(&config);

    let spec = match compile_pipeline(&config, &params, &progress) {
        Ok(spec) => spec,
        Err(e) => {
            error!(code = e.error_code(), "{}", e);
            return Err(e.into());
        }
    };

    match dry_run(&spec, &params, &config, &progress).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_skippable() => {
            warn!("Skipped PipelineJob creation - no GCP credentials: {}", e);
            if let Some(hint) = e.hint() {
                warn!("Hint: {}", hint);
            }
            Ok(())
        }
        Err(e) => {
            error!(code = e.error_code(), "{}", e);
            Err(e.into())
        }
    }
}

fn compile_pipeline(
    config: &PipelineConfig,
    params: &PipelineParameters,
    progress: &Progress,
) -> Result<PipelineSpec> {
    progress.step("Compiling pipeline ...");

    let graph = septic_risk_graph()?;
    let spec = compile(
        &graph,
        &all_components(&config.trainer_image),
        params,
        &config.pipeline_root,
    )?;
    write_descriptor(&spec, Path::new(DESCRIPTOR_FILE))?;

    progress.detail(format!(
        "Pipeline compiled ==> {} ({} tasks)",
        DESCRIPTOR_FILE,
        graph.len()
    ));
    Ok(spec)
}

async fn dry_run(
    spec: &PipelineSpec,
    params: &PipelineParameters,
    config: &PipelineConfig,
    progress: &Progress,
) -> Result<()> {
    progress.step("Creating PipelineJob (dry run - not submitted) ...");

    let request = build_request(spec, params, config, Utc::now())?;
    let tokens = GcpTokenSource::discover().await?;
    let prepared = prepare(&tokens, request).await?;

    progress.detail(format!(
        "PipelineJob ready: {} ({} bytes)",
        prepared.request.body.display_name, prepared.body_bytes
    ));
    progress.detail(format!("To submit: POST {}", prepared.request.url));
    Ok(())
}
