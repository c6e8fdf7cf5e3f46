//! Warehouse table layout

use vitals_bigquery_sdk::{
    Clustering, FieldType, LoadJobConfig, PartitionType, SchemaField, SourceFormat, TableDefinition,
    TableSchema, TimePartitioning, WriteDisposition,
};
use vitals_core::fields;

/// The seven cleaned columns, all REQUIRED.
pub fn vitals_schema() -> TableSchema {
    TableSchema {
        fields: vec![
            SchemaField::required(fields::EVENT_TIMESTAMP, FieldType::Timestamp),
            SchemaField::required(fields::SENSOR_ID, FieldType::String),
            SchemaField::required(fields::HEART_RATE, FieldType::Float64),
            SchemaField::required(fields::BODY_TEMPERATURE, FieldType::Float64),
            SchemaField::required(fields::SPO2, FieldType::Int64),
            SchemaField::required(fields::BATTERY_LEVEL, FieldType::Int64),
            SchemaField::required(fields::HEART_RATE_IMPUTED, FieldType::Bool),
        ],
    }
}

/// Partitioned by day on the event time, clustered by sensor.
pub fn table_definition() -> TableDefinition {
    TableDefinition {
        schema: vitals_schema(),
        time_partitioning: Some(TimePartitioning {
            partition_type: PartitionType::Day,
            field: fields::EVENT_TIMESTAMP.to_string(),
        }),
        clustering: Some(Clustering {
            fields: vec![fields::SENSOR_ID.to_string()],
        }),
    }
}

pub fn load_config() -> LoadJobConfig {
    LoadJobConfig {
        schema: vitals_schema(),
        source_format: SourceFormat::NewlineDelimitedJson,
        write_disposition: WriteDisposition::WriteTruncate,
    }
}
