//! Pipeline descriptor in the managed service's pipeline IR shape

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vitals_core::{Result, VitalsError};

use crate::components::{ArtifactKind, ComponentDef, ContainerExecutor};
use crate::graph::{InputBinding, PipelineGraph};
use crate::pipeline::{PipelineParameters, PIPELINE_DESCRIPTION, PIPELINE_NAME};

pub const SCHEMA_VERSION: &str = "2.1.0";
pub const DESCRIPTOR_FILE: &str = "septic_risk_pipeline.yaml";

const PARAMETER_TYPE_STRING: &str = "STRING";
const ARTIFACT_SCHEMA_VERSION: &str = "0.0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    pub pipeline_info: PipelineInfo,
    pub schema_version: String,
    pub sdk_version: String,
    pub root: RootSpec,
    pub components: BTreeMap<String, ComponentSpec>,
    pub deployment_spec: DeploymentSpec,
    pub default_pipeline_root: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootSpec {
    pub input_definitions: IoDefinitions,
    pub dag: Dag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dag {
    pub tasks: BTreeMap<String, TaskSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub task_info: TaskInfo,
    pub component_ref: ComponentRef,
    pub inputs: TaskInputs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependent_tasks: Vec<String>,
    pub caching_options: CachingOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachingOptions {
    pub enable_cache: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInputs {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterBinding>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, ArtifactBinding>,
}

/// Exactly one field is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_input_parameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_output_parameter: Option<TaskOutputParameter>,
}

impl ParameterBinding {
    pub fn pipeline(name: &str) -> Self {
        Self {
            component_input_parameter: Some(name.to_string()),
            task_output_parameter: None,
        }
    }

    pub fn task_output(producer_task: &str, output_parameter_key: &str) -> Self {
        Self {
            component_input_parameter: None,
            task_output_parameter: Some(TaskOutputParameter {
                producer_task: producer_task.to_string(),
                output_parameter_key: output_parameter_key.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutputParameter {
    pub producer_task: String,
    pub output_parameter_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBinding {
    pub task_output_artifact: TaskOutputArtifact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutputArtifact {
    pub producer_task: String,
    pub output_artifact_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoDefinitions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, ArtifactSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub parameter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_optional: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSpec {
    pub artifact_type: ArtifactType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactType {
    pub schema_title: String,
    pub schema_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub executor_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_definitions: Option<IoDefinitions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_definitions: Option<IoDefinitions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub executors: BTreeMap<String, ExecutorSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSpec {
    pub container: ContainerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
}

impl From<&ContainerExecutor> for ContainerSpec {
    fn from(executor: &ContainerExecutor) -> Self {
        Self {
            image: executor.image.clone(),
            command: executor.command.clone(),
            args: executor.args.clone(),
        }
    }
}

fn component_key(name: &str) -> String {
    format!("comp-{}", name)
}

fn executor_key(name: &str) -> String {
    format!("exec-{}", name)
}

fn string_parameter() -> ParameterSpec {
    ParameterSpec {
        parameter_type: PARAMETER_TYPE_STRING.to_string(),
        default_value: None,
        is_optional: None,
    }
}

fn artifact_spec(kind: ArtifactKind) -> ArtifactSpec {
    ArtifactSpec {
        artifact_type: ArtifactType {
            schema_title: kind.schema_title().to_string(),
            schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
        },
    }
}

fn io_definitions(
    parameters: &[&str],
    artifacts: &[(&str, ArtifactKind)],
) -> Option<IoDefinitions> {
    if parameters.is_empty() && artifacts.is_empty() {
        return None;
    }
    Some(IoDefinitions {
        parameters: parameters
            .iter()
            .map(|p| (p.to_string(), string_parameter()))
            .collect(),
        artifacts: artifacts
            .iter()
            .map(|(name, kind)| (name.to_string(), artifact_spec(*kind)))
            .collect(),
    })
}

fn unknown_output(task: &str, from: &str, key: &str) -> VitalsError {
    VitalsError::Pipeline(format!(
        "task '{}' reads output '{}' that task '{}' does not produce",
        task, key, from
    ))
}

/// Check a task's bindings against the component it instantiates and
/// translate them into IR inputs.
fn task_inputs<'c>(
    task: &str,
    component: &ComponentDef,
    bindings: &BTreeMap<String, InputBinding>,
    params: &PipelineParameters,
    producer: &dyn Fn(&str) -> Option<&'c ComponentDef>,
) -> Result<TaskInputs> {
    let pipeline_params = params.defaults();
    let mut inputs = TaskInputs::default();

    for (name, binding) in bindings {
        let declared = if binding.is_artifact() {
            component.input_artifacts.iter().any(|(a, _)| a == name)
        } else {
            component.input_parameters.iter().any(|p| *p == name.as_str())
        };
        if !declared {
            return Err(VitalsError::Pipeline(format!(
                "task '{}' binds '{}', which component '{}' does not declare",
                task, name, component.name
            )));
        }

        match binding {
            InputBinding::PipelineParameter(p) => {
                if !pipeline_params.contains_key(p.as_str()) {
                    return Err(VitalsError::Pipeline(format!(
                        "task '{}' reads unknown pipeline parameter '{}'",
                        task, p
                    )));
                }
                inputs
                    .parameters
                    .insert(name.clone(), ParameterBinding::pipeline(p));
            }
            InputBinding::TaskParameter { task: from, key } => {
                let produced = producer(from)
                    .map_or(false, |c| c.output_parameters.iter().any(|p| *p == key.as_str()));
                if !produced {
                    return Err(unknown_output(task, from, key));
                }
                inputs
                    .parameters
                    .insert(name.clone(), ParameterBinding::task_output(from, key));
            }
            InputBinding::TaskArtifact { task: from, key } => {
                let produced = producer(from)
                    .map_or(false, |c| c.output_artifacts.iter().any(|(a, _)| *a == key.as_str()));
                if !produced {
                    return Err(unknown_output(task, from, key));
                }
                inputs.artifacts.insert(
                    name.clone(),
                    ArtifactBinding {
                        task_output_artifact: TaskOutputArtifact {
                            producer_task: from.clone(),
                            output_artifact_key: key.clone(),
                        },
                    },
                );
            }
        }
    }

    let missing: Vec<&str> = component
        .input_parameters
        .iter()
        .copied()
        .chain(component.input_artifacts.iter().map(|(a, _)| *a))
        .filter(|input| !bindings.contains_key(*input))
        .collect();
    if !missing.is_empty() {
        return Err(VitalsError::Pipeline(format!(
            "task '{}' leaves inputs unbound: {}",
            task,
            missing.join(", ")
        )));
    }

    Ok(inputs)
}

/// Build the descriptor. Tasks are validated against the graph and their components.
pub fn compile(
    graph: &PipelineGraph,
    components: &[ComponentDef],
    params: &PipelineParameters,
    pipeline_root: &str,
) -> Result<PipelineSpec> {
    let by_name: BTreeMap<&str, &ComponentDef> = components.iter().map(|c| (c.name, c)).collect();
    let producer = |name: &str| {
        graph
            .task(name)
            .and_then(|t| by_name.get(t.component.as_str()).copied())
    };

    let mut tasks = BTreeMap::new();
    let mut component_specs = BTreeMap::new();
    let mut executors = BTreeMap::new();

    for task in graph.topological_order()? {
        let component = by_name.get(task.component.as_str()).ok_or_else(|| {
            VitalsError::Pipeline(format!(
                "task '{}' uses unknown component '{}'",
                task.name, task.component
            ))
        })?;

        tasks.insert(
            task.name.clone(),
            TaskSpec {
                task_info: TaskInfo {
                    name: task.name.clone(),
                },
                component_ref: ComponentRef {
                    name: component_key(component.name),
                },
                inputs: task_inputs(&task.name, component, &task.inputs, params, &producer)?,
                dependent_tasks: task.dependencies().into_iter().map(String::from).collect(),
                caching_options: CachingOptions { enable_cache: true },
            },
        );

        component_specs.insert(
            component_key(component.name),
            ComponentSpec {
                executor_label: executor_key(component.name),
                input_definitions: io_definitions(
                    &component.input_parameters,
                    &component.input_artifacts,
                ),
                output_definitions: io_definitions(
                    &component.output_parameters,
                    &component.output_artifacts,
                ),
            },
        );

        executors.insert(
            executor_key(component.name),
            ExecutorSpec {
                container: ContainerSpec::from(&component.executor),
            },
        );
    }

    let root_parameters = params
        .defaults()
        .into_iter()
        .map(|(name, default)| {
            (
                name.to_string(),
                ParameterSpec {
                    parameter_type: PARAMETER_TYPE_STRING.to_string(),
                    default_value: Some(default.to_string()),
                    is_optional: Some(true),
                },
            )
        })
        .collect();

    Ok(PipelineSpec {
        pipeline_info: PipelineInfo {
            name: PIPELINE_NAME.to_string(),
            description: PIPELINE_DESCRIPTION.to_string(),
        },
        schema_version: SCHEMA_VERSION.to_string(),
        sdk_version: format!("vitals-risk-pipeline-{}", env!("CARGO_PKG_VERSION")),
        root: RootSpec {
            input_definitions: IoDefinitions {
                parameters: root_parameters,
                artifacts: BTreeMap::new(),
            },
            dag: Dag { tasks },
        },
        components: component_specs,
        deployment_spec: DeploymentSpec { executors },
        default_pipeline_root: pipeline_root.to_string(),
    })
}

pub fn to_yaml(spec: &PipelineSpec) -> Result<String> {
    serde_yaml::to_string(spec)
        .map_err(|e| VitalsError::Pipeline(format!("failed to serialize descriptor: {}", e)))
}

/// Serialize `spec` as YAML to `path`, replacing any existing file.
pub fn write_descriptor(spec: &PipelineSpec, path: &Path) -> Result<()> {
    std::fs::write(path, to_yaml(spec)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{all_components, DEPLOY, INGEST, OUTPUT, REGISTER, TRAIN};
    use crate::graph::TaskNode;
    use crate::pipeline::septic_risk_graph;
    use vitals_core::PipelineConfig;

    fn params() -> PipelineParameters {
        PipelineParameters::from_config(&PipelineConfig::from_lookup(|_| None).unwrap())
    }

    fn compiled() -> PipelineSpec {
        compile(
            &septic_risk_graph().unwrap(),
            &all_components("trainer:latest"),
            &params(),
            "gs://patient-monitoring-dev-pipeline-artifacts",
        )
        .unwrap()
    }

    #[test]
    fn test_descriptor_round_trips_through_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DESCRIPTOR_FILE);
        let spec = compiled();

        write_descriptor(&spec, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("pipelineInfo:"));
        assert!(text.contains("deploymentSpec:"));

        let back: PipelineSpec = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_dag_wiring() {
        let spec = compiled();
        let tasks = &spec.root.dag.tasks;
        assert_eq!(tasks.len(), 4);

        assert!(tasks[INGEST].dependent_tasks.is_empty());
        assert_eq!(
            tasks[INGEST].inputs.parameters["bq_table"],
            ParameterBinding::pipeline("bq_table")
        );

        let train = &tasks[TRAIN];
        assert_eq!(train.dependent_tasks, vec![INGEST]);
        assert_eq!(
            train.inputs.artifacts["input_dataset"].task_output_artifact,
            TaskOutputArtifact {
                producer_task: INGEST.into(),
                output_artifact_key: "output_dataset".into(),
            }
        );

        assert_eq!(tasks[REGISTER].dependent_tasks, vec![TRAIN]);

        let deploy = &tasks[DEPLOY];
        assert_eq!(deploy.dependent_tasks, vec![REGISTER]);
        assert_eq!(
            deploy.inputs.parameters["model_resource_name"],
            ParameterBinding::task_output(REGISTER, OUTPUT)
        );
        assert_eq!(deploy.component_ref.name, "comp-deploy-model");
    }

    #[test]
    fn test_components_and_executors() {
        let spec = compiled();
        let train = &spec.components["comp-train-model"];
        assert_eq!(train.executor_label, "exec-train-model");
        let outputs = train.output_definitions.as_ref().unwrap();
        assert_eq!(
            outputs.artifacts["output_model"].artifact_type.schema_title,
            "system.Model"
        );

        let executor = &spec.deployment_spec.executors["exec-train-model"];
        assert_eq!(executor.container.image, "trainer:latest");
        assert_eq!(spec.deployment_spec.executors.len(), 4);
    }

    #[test]
    fn test_root_parameters_and_defaults() {
        let spec = compiled();
        let project = &spec.root.input_definitions.parameters["project_id"];
        assert_eq!(project.default_value.as_deref(), Some("patient-monitoring-dev"));
        assert_eq!(project.parameter_type, "STRING");
        assert_eq!(spec.default_pipeline_root, "gs://patient-monitoring-dev-pipeline-artifacts");
        assert_eq!(spec.pipeline_info.name, "septic-shock-risk-pipeline");
    }

    #[test]
    fn test_parameter_binding_yaml_shape() {
        let yaml = serde_yaml::to_string(&ParameterBinding::pipeline("location")).unwrap();
        assert_eq!(yaml.trim(), "componentInputParameter: location");

        let yaml = serde_yaml::to_string(&ParameterBinding::task_output(REGISTER, OUTPUT)).unwrap();
        assert!(yaml.contains("taskOutputParameter:"));
        assert!(yaml.contains("producerTask: register-model"));
        assert!(!yaml.contains('!'));
    }

    #[test]
    fn test_unbound_component_input_rejected() {
        let mut graph = PipelineGraph::new();
        graph
            .add_task(TaskNode::new(INGEST, INGEST).input("project_id", InputBinding::pipeline("project_id")))
            .unwrap();

        let err = compile(&graph, &all_components("t"), &params(), "gs://root").unwrap_err();
        assert!(err.to_string().contains("unbound"));
    }

    #[test]
    fn test_binding_to_missing_output_rejected() {
        let mut graph = septic_risk_graph().unwrap();
        graph
            .add_task(
                TaskNode::new("train-again", TRAIN)
                    .input("input_dataset", InputBinding::artifact_of(INGEST, "output_model")),
            )
            .unwrap();

        let err = compile(&graph, &all_components("t"), &params(), "gs://root").unwrap_err();
        assert!(err.to_string().contains("does not produce"));
    }

    #[test]
    fn test_unknown_component_rejected() {
        let mut graph = PipelineGraph::new();
        graph.add_task(TaskNode::new("x", "no-such-component")).unwrap();

        let err = compile(&graph, &all_components("t"), &params(), "gs://root").unwrap_err();
        assert!(matches!(err, VitalsError::Pipeline(_)));
    }
}
