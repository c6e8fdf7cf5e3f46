//! BigQuery resource types (REST v2 JSON shapes)

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetRef {
    pub fn new(project_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
        }
    }

    pub fn table(&self, table_id: impl Into<String>) -> TableRef {
        TableRef {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            table_id: table_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Timestamp,
    String,
    Float64,
    Int64,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    Required,
    Nullable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mode: FieldMode,
}

impl SchemaField {
    pub fn required(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            mode: FieldMode::Required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionType {
    Hour,
    Day,
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePartitioning {
    #[serde(rename = "type")]
    pub partition_type: PartitionType,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clustering {
    pub fields: Vec<String>,
}

/// Everything needed to create a table besides its reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub schema: TableSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_partitioning: Option<TimePartitioning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clustering: Option<Clustering>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    NewlineDelimitedJson,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    WriteTruncate,
    WriteAppend,
    WriteEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobConfig {
    pub schema: TableSchema,
    pub source_format: SourceFormat,
    pub write_disposition: WriteDisposition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRef {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done(Option<ErrorProto>),
}

// ============== Wire payloads ==============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatasetResource<'a> {
    pub dataset_reference: &'a DatasetRef,
    pub location: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableResource<'a> {
    pub table_reference: &'a TableRef,
    #[serde(flatten)]
    pub definition: &'a TableDefinition,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoadJobResource<'a> {
    pub job_reference: &'a JobRef,
    pub configuration: LoadConfiguration<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoadConfiguration<'a> {
    pub load: LoadSpec<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoadSpec<'a> {
    pub destination_table: &'a TableRef,
    pub schema: &'a TableSchema,
    pub source_format: SourceFormat,
    pub write_disposition: WriteDisposition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobResponse {
    pub job_reference: JobRef,
    #[serde(default)]
    pub status: Option<JobStatusResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStatusResponse {
    pub state: String,
    #[serde(default)]
    pub error_result: Option<ErrorProto>,
}

impl JobStatusResponse {
    pub fn into_state(self) -> JobState {
        match self.state.as_str() {
            "DONE" => JobState::Done(self.error_result),
            "RUNNING" => JobState::Running,
            _ => JobState::Pending,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableResponse {
    /// int64 values are JSON strings in the REST API.
    #[serde(default)]
    pub num_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleErrorResponse {
    pub error: GoogleError,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Fields used for deserialization
pub(crate) struct GoogleError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> TableDefinition {
        TableDefinition {
            schema: TableSchema {
                fields: vec![
                    SchemaField::required("event_timestamp", FieldType::Timestamp),
                    SchemaField::required("spO2", FieldType::Int64),
                ],
            },
            time_partitioning: Some(TimePartitioning {
                partition_type: PartitionType::Day,
                field: "event_timestamp".into(),
            }),
            clustering: Some(Clustering {
                fields: vec!["sensor_id".into()],
            }),
        }
    }

    #[test]
    fn test_table_resource_shape() {
        let table = DatasetRef::new("p", "d").table("t");
        let def = definition();
        let body = serde_json::to_value(TableResource {
            table_reference: &table,
            definition: &def,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "tableReference": {"projectId": "p", "datasetId": "d", "tableId": "t"},
                "schema": {"fields": [
                    {"name": "event_timestamp", "type": "TIMESTAMP", "mode": "REQUIRED"},
                    {"name": "spO2", "type": "INT64", "mode": "REQUIRED"}
                ]},
                "timePartitioning": {"type": "DAY", "field": "event_timestamp"},
                "clustering": {"fields": ["sensor_id"]}
            })
        );
    }

    #[test]
    fn test_load_spec_enums_use_api_names() {
        let table = DatasetRef::new("p", "d").table("t");
        let schema = definition().schema;
        let spec = serde_json::to_value(LoadSpec {
            destination_table: &table,
            schema: &schema,
            source_format: SourceFormat::NewlineDelimitedJson,
            write_disposition: WriteDisposition::WriteTruncate,
        })
        .unwrap();

        assert_eq!(spec["sourceFormat"], "NEWLINE_DELIMITED_JSON");
        assert_eq!(spec["writeDisposition"], "WRITE_TRUNCATE");
        assert_eq!(spec["destinationTable"]["tableId"], "t");
    }

    #[test]
    fn test_job_status_mapping() {
        let done: JobStatusResponse = serde_json::from_value(json!({
            "state": "DONE",
            "errorResult": {"reason": "invalid", "message": "bad row"}
        }))
        .unwrap();
        match done.into_state() {
            JobState::Done(Some(err)) => assert_eq!(err.reason, "invalid"),
            other => panic!("unexpected state {:?}", other),
        }

        let running: JobStatusResponse =
            serde_json::from_value(json!({"state": "RUNNING"})).unwrap();
        assert_eq!(running.into_state(), JobState::Running);
    }

    #[test]
    fn test_table_ref_display() {
        let table = DatasetRef::new("proj", "ds").table("tbl");
        assert_eq!(table.to_string(), "proj.ds.tbl");
    }
}
