//! Containerized pipeline components
//!
//! Each component declares its inputs and outputs and the container the
//! managed service runs for it. Container arguments use the platform's
//! runtime placeholders, resolved when a task executes.

use crate::label::{extract_query, LABEL_COLUMN};

pub const CLOUD_SDK_IMAGE: &str = "gcr.io/google.com/cloudsdktool/google-cloud-cli:slim";
pub const SERVING_IMAGE: &str = "us-docker.pkg.dev/vertex-ai/prediction/sklearn-cpu.1-3:latest";

pub const TEST_SIZE: f64 = 0.2;
pub const RANDOM_STATE: u32 = 42;
pub const MAX_ITER: u32 = 1000;

pub const MACHINE_TYPE: &str = "n1-standard-4";
pub const MIN_REPLICAS: u32 = 1;
pub const MAX_REPLICAS: u32 = 1;

pub const INGEST: &str = "ingest-from-bigquery";
pub const TRAIN: &str = "train-model";
pub const REGISTER: &str = "register-model";
pub const DEPLOY: &str = "deploy-model";

/// Key of a component's single string result.
pub const OUTPUT: &str = "Output";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Dataset,
    Model,
}

impl ArtifactKind {
    pub fn schema_title(self) -> &'static str {
        match self {
            Self::Dataset => "system.Dataset",
            Self::Model => "system.Model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerExecutor {
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ComponentDef {
    pub name: &'static str,
    pub input_parameters: Vec<&'static str>,
    pub input_artifacts: Vec<(&'static str, ArtifactKind)>,
    pub output_parameters: Vec<&'static str>,
    pub output_artifacts: Vec<(&'static str, ArtifactKind)>,
    pub executor: ContainerExecutor,
}

fn input_parameter(name: &str) -> String {
    format!("{{{{$.inputs.parameters['{}']}}}}", name)
}

fn input_artifact_path(name: &str) -> String {
    format!("{{{{$.inputs.artifacts['{}'].path}}}}", name)
}

fn output_artifact_path(name: &str) -> String {
    format!("{{{{$.outputs.artifacts['{}'].path}}}}", name)
}

fn output_parameter_file(name: &str) -> String {
    format!("{{{{$.outputs.parameters['{}'].output_file}}}}", name)
}

/// `sh -ec <script> <name> <args...>`: the script sees its arguments as `$1`, `$2`, ...
fn shell(image: &str, name: &str, script: String, args: Vec<String>) -> ContainerExecutor {
    ContainerExecutor {
        image: image.to_string(),
        command: vec!["sh".into(), "-ec".into(), script, name.into()],
        args,
    }
}

/// Extract features and label from the warehouse into a CSV dataset.
pub fn ingest_component() -> ComponentDef {
    // Backticks must survive the double-quoted shell string.
    let query = extract_query("$1.$2.$3").replace('`', "\\`");
    let script = format!(
        r#"mkdir -p "$(dirname "$4")"
bq query --project_id="$1" --nouse_legacy_sql --format=csv --max_rows=100000000 "{}" > "$4"
"#,
        query
    );

    ComponentDef {
        name: INGEST,
        input_parameters: vec!["project_id", "bq_dataset", "bq_table"],
        input_artifacts: vec![],
        output_parameters: vec![],
        output_artifacts: vec![("output_dataset", ArtifactKind::Dataset)],
        executor: shell(
            CLOUD_SDK_IMAGE,
            INGEST,
            script,
            vec![
                input_parameter("project_id"),
                input_parameter("bq_dataset"),
                input_parameter("bq_table"),
                output_artifact_path("output_dataset"),
            ],
        ),
    }
}

/// Fit a logistic-regression classifier on the extracted dataset.
pub fn train_component(trainer_image: &str) -> ComponentDef {
    let script = format!(
        r#"import os, sys
import joblib
import pandas as pd
from sklearn.linear_model import LogisticRegression
from sklearn.model_selection import train_test_split

df = pd.read_csv(sys.argv[1])
X = df.drop(columns=['{label}'])
y = df['{label}']
X_train, X_test, y_train, y_test = train_test_split(X, y, test_size={test_size}, random_state={seed})
model = LogisticRegression(max_iter={max_iter}, random_state={seed})
model.fit(X_train, y_train)
print('Test accuracy: %.4f' % model.score(X_test, y_test))
os.makedirs(os.path.dirname(sys.argv[2]), exist_ok=True)
joblib.dump(model, sys.argv[2])
"#,
        label = LABEL_COLUMN,
        test_size = TEST_SIZE,
        seed = RANDOM_STATE,
        max_iter = MAX_ITER,
    );

    ComponentDef {
        name: TRAIN,
        input_parameters: vec![],
        input_artifacts: vec![("input_dataset", ArtifactKind::Dataset)],
        output_parameters: vec![],
        output_artifacts: vec![("output_model", ArtifactKind::Model)],
        executor: ContainerExecutor {
            image: trainer_image.to_string(),
            command: vec!["python3".into(), "-c".into(), script],
            args: vec![
                input_artifact_path("input_dataset"),
                output_artifact_path("output_model"),
            ],
        },
    }
}

/// Copy the model to Cloud Storage and upload it to the model registry.
/// Outputs the model resource name.
pub fn register_component() -> ComponentDef {
    let script = r#"ARTIFACT_DIR="gs://$2-model-artifacts/$4"
gsutil cp "$1" "$ARTIFACT_DIR/model.joblib"
gcloud ai models upload --project="$2" --region="$3" --display-name="$4" --artifact-uri="$ARTIFACT_DIR" --container-image-uri="$5"
MODEL=$(gcloud ai models list --project="$2" --region="$3" --filter="display_name=$4" --sort-by=~createTime --limit=1 --format="value(name)")
mkdir -p "$(dirname "$6")"
printf '%s' "$MODEL" > "$6"
echo "Registered model: $MODEL"
"#
    .to_string();

    ComponentDef {
        name: REGISTER,
        input_parameters: vec![
            "project_id",
            "location",
            "model_display_name",
            "serving_container_image_uri",
        ],
        input_artifacts: vec![("input_model", ArtifactKind::Model)],
        output_parameters: vec![OUTPUT],
        output_artifacts: vec![],
        executor: shell(
            CLOUD_SDK_IMAGE,
            REGISTER,
            script,
            vec![
                input_artifact_path("input_model"),
                input_parameter("project_id"),
                input_parameter("location"),
                input_parameter("model_display_name"),
                input_parameter("serving_container_image_uri"),
                output_parameter_file(OUTPUT),
            ],
        ),
    }
}

/// Deploy the registered model, reusing an endpoint with the same display
/// name when one exists. Outputs the endpoint resource name.
pub fn deploy_component() -> ComponentDef {
    let script = format!(
        r#"ENDPOINT=$(gcloud ai endpoints list --project="$2" --region="$3" --filter="display_name=$4" --limit=1 --format="value(name)")
if [ -z "$ENDPOINT" ]; then
  gcloud ai endpoints create --project="$2" --region="$3" --display-name="$4"
  ENDPOINT=$(gcloud ai endpoints list --project="$2" --region="$3" --filter="display_name=$4" --limit=1 --format="value(name)")
fi
gcloud ai endpoints deploy-model "$ENDPOINT" --project="$2" --region="$3" --model="$1" --display-name="$4" --machine-type={} --min-replica-count={} --max-replica-count={}
mkdir -p "$(dirname "$5")"
printf '%s' "$ENDPOINT" > "$5"
echo "Deployed to endpoint: $ENDPOINT"
"#,
        MACHINE_TYPE, MIN_REPLICAS, MAX_REPLICAS
    );

    ComponentDef {
        name: DEPLOY,
        input_parameters: vec![
            "model_resource_name",
            "project_id",
            "location",
            "endpoint_display_name",
        ],
        input_artifacts: vec![],
        output_parameters: vec![OUTPUT],
        output_artifacts: vec![],
        executor: shell(
            CLOUD_SDK_IMAGE,
            DEPLOY,
            script,
            vec![
                input_parameter("model_resource_name"),
                input_parameter("project_id"),
                input_parameter("location"),
                input_parameter("endpoint_display_name"),
                output_parameter_file(OUTPUT),
            ],
        ),
    }
}

pub fn all_components(trainer_image: &str) -> Vec<ComponentDef> {
    vec![
        ingest_component(),
        train_component(trainer_image),
        register_component(),
        deploy_component(),
    ]
}
