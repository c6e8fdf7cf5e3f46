//! The septic shock risk pipeline: ingest, train, register, deploy

use std::collections::BTreeMap;

use vitals_core::{PipelineConfig, Result};

use crate::components::{DEPLOY, INGEST, OUTPUT, REGISTER, SERVING_IMAGE, TRAIN};
use crate::graph::{InputBinding, PipelineGraph, TaskNode};

pub const PIPELINE_NAME: &str = "septic-shock-risk-pipeline";
pub const PIPELINE_DESCRIPTION: &str = "Ingest from BQ ==> Train ==> Register ==> Deploy";

/// Pipeline-level parameters and their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineParameters {
    pub project_id: String,
    pub location: String,
    pub bq_dataset: String,
    pub bq_table: String,
    pub model_display_name: String,
    pub endpoint_display_name: String,
    pub serving_container_image_uri: String,
}

impl PipelineParameters {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            project_id: config.project_id.clone(),
            location: config.vertex_location.clone(),
            bq_dataset: config.bq_dataset.clone(),
            bq_table: config.bq_table.clone(),
            model_display_name: "septic-risk-model".to_string(),
            endpoint_display_name: "septic-risk-endpoint".to_string(),
            serving_container_image_uri: SERVING_IMAGE.to_string(),
        }
    }

    /// Every parameter with its default value.
    pub fn defaults(&self) -> BTreeMap<&'static str, &str> {
        BTreeMap::from([
            ("project_id", self.project_id.as_str()),
            ("location", self.location.as_str()),
            ("bq_dataset", self.bq_dataset.as_str()),
            ("bq_table", self.bq_table.as_str()),
            ("model_display_name", self.model_display_name.as_str()),
            ("endpoint_display_name", self.endpoint_display_name.as_str()),
            (
                "serving_container_image_uri",
                self.serving_container_image_uri.as_str(),
            ),
        ])
    }

    /// Values passed explicitly when a run is created.
    pub fn run_values(&self) -> BTreeMap<&'static str, &str> {
        BTreeMap::from([
            ("project_id", self.project_id.as_str()),
            ("location", self.location.as_str()),
            ("bq_dataset", self.bq_dataset.as_str()),
            ("bq_table", self.bq_table.as_str()),
        ])
    }
}

/// Wire the four tasks. Each task is named after its component.
pub fn septic_risk_graph() -> Result<PipelineGraph> {
    let mut graph = PipelineGraph::new();

    graph.add_task(
        TaskNode::new(INGEST, INGEST)
            .input("project_id", InputBinding::pipeline("project_id"))
            .input("bq_dataset", InputBinding::pipeline("bq_dataset"))
            .input("bq_table", InputBinding::pipeline("bq_table")),
    )?;

    graph.add_task(
        TaskNode::new(TRAIN, TRAIN)
            .input("input_dataset", InputBinding::artifact_of(INGEST, "output_dataset")),
    )?;

    graph.add_task(
        TaskNode::new(REGISTER, REGISTER)
            .input("input_model", InputBinding::artifact_of(TRAIN, "output_model"))
            .input("project_id", InputBinding::pipeline("project_id"))
            .input("location", InputBinding::pipeline("location"))
            .input("model_display_name", InputBinding::pipeline("model_display_name"))
            .input(
                "serving_container_image_uri",
                InputBinding::pipeline("serving_container_image_uri"),
            ),
    )?;

    graph.add_task(
        TaskNode::new(DEPLOY, DEPLOY)
            .input("model_resource_name", InputBinding::parameter_of(REGISTER, OUTPUT))
            .input("project_id", InputBinding::pipeline("project_id"))
            .input("location", InputBinding::pipeline("location"))
            .input("endpoint_display_name", InputBinding::pipeline("endpoint_display_name")),
    )?;

    Ok(graph)
}
