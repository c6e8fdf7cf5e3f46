//! Bigtable REST client
//!
//! Table administration goes through `bigtableadmin.googleapis.com`, data
//! reads and writes through `bigtable.googleapis.com`. Streaming RPCs are
//! returned by the REST gateway as a JSON array of response messages.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use vitals_core::AccessTokenSource;

use crate::api::WideColumnStore;
use crate::chunks::{ReadRowsResponse, RowAssembler};
use crate::types::{ColumnFamilySpec, GcRule, Row, RowFilter, RowMutation, TablePath};
use crate::{BigtableError, Result};

const ADMIN_BASE: &str = "https://bigtableadmin.googleapis.com/v2";
const DATA_BASE: &str = "https://bigtable.googleapis.com/v2";
const ADMIN_SCOPES: &[&str] = &["https://www.googleapis.com/auth/bigtable.admin.table"];
const DATA_SCOPES: &[&str] = &["https://www.googleapis.com/auth/bigtable.data"];

/// Bigtable client bound to one table
pub struct BigtableClient {
    http: Client,
    tokens: Arc<dyn AccessTokenSource>,
    table: TablePath,
    admin_base: String,
    data_base: String,
}

impl std::fmt::Debug for BigtableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigtableClient")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl BigtableClient {
    pub fn new(tokens: Arc<dyn AccessTokenSource>, table: TablePath, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            tokens,
            table,
            admin_base: ADMIN_BASE.to_string(),
            data_base: DATA_BASE.to_string(),
        })
    }

    fn admin_table_url(&self) -> String {
        format!("{}/{}", self.admin_base, self.table.table_name())
    }

    fn data_url(&self, method: &str) -> String {
        format!("{}/{}:{}", self.data_base, self.table.table_name(), method)
    }
}

#[async_trait]
impl WideColumnStore for BigtableClient {
    async fn table_exists(&self) -> Result<bool> {
        let token = self.tokens.access_token(ADMIN_SCOPES).await?;
        let response = self
            .http
            .get(format!("{}?view=NAME_ONLY", self.admin_table_url()))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn delete_table(&self) -> Result<()> {
        let token = self.tokens.access_token(ADMIN_SCOPES).await?;
        let response = self
            .http
            .delete(self.admin_table_url())
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BigtableError::TableNotFound(self.table.table_name()));
        }
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, families), fields(table = %self.table))]
    async fn create_table(&self, families: &[ColumnFamilySpec]) -> Result<()> {
        let token = self.tokens.access_token(ADMIN_SCOPES).await?;
        let url = format!("{}/{}/tables", self.admin_base, self.table.instance_name());
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&create_table_body(&self.table.table_id, families))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn mutate_rows(&self, rows: &[RowMutation]) -> Result<()> {
        let token = self.tokens.access_token(DATA_SCOPES).await?;
        let response = self
            .http
            .post(self.data_url("mutateRows"))
            .bearer_auth(token)
            .json(&mutate_rows_body(rows))
            .send()
            .await?;

        let body: Value = check(response).await?.json().await?;
        let responses: Vec<MutateRowsResponse> = stream_messages(body)?;
        for entry in responses.into_iter().flat_map(|r| r.entries) {
            if entry.status.code != 0 {
                let index: usize = entry.index.parse().unwrap_or(0);
                return Err(BigtableError::Mutation {
                    row_key: rows
                        .get(index)
                        .map(|r| r.row_key.clone())
                        .unwrap_or_default(),
                    code: entry.status.code,
                    message: entry.status.message,
                });
            }
        }
        debug!("Rows mutated");
        Ok(())
    }

    async fn read_row(&self, row_key: &str, filter: Option<&RowFilter>) -> Result<Option<Row>> {
        let token = self.tokens.access_token(DATA_SCOPES).await?;
        let response = self
            .http
            .post(self.data_url("readRows"))
            .bearer_auth(token)
            .json(&read_row_body(row_key, filter))
            .send()
            .await?;

        let body: Value = check(response).await?.json().await?;
        let mut assembler = RowAssembler::default();
        for message in stream_messages::<ReadRowsResponse>(body)? {
            for chunk in message.chunks {
                assembler.push(chunk)?;
            }
        }
        Ok(assembler.finish()?.into_iter().find(|r| r.key == row_key))
    }
}

#[derive(Debug, Default, Deserialize)]
struct MutateRowsResponse {
    #[serde(default)]
    entries: Vec<MutateRowsEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct MutateRowsEntry {
    /// int64 as a JSON string; omitted when zero
    #[serde(default = "zero")]
    index: String,
    #[serde(default)]
    status: RpcStatus,
}

fn zero() -> String {
    "0".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcRuleJson {
    max_age: String,
}

impl From<GcRule> for GcRuleJson {
    fn from(rule: GcRule) -> Self {
        match rule {
            GcRule::MaxAge(age) => Self {
                max_age: format!("{}s", age.as_secs()),
            },
        }
    }
}

fn create_table_body(table_id: &str, families: &[ColumnFamilySpec]) -> Value {
    let column_families: BTreeMap<&str, Value> = families
        .iter()
        .map(|f| {
            let family = match f.gc_rule {
                Some(rule) => json!({ "gcRule": GcRuleJson::from(rule) }),
                None => json!({}),
            };
            (f.name.as_str(), family)
        })
        .collect();

    json!({
        "tableId": table_id,
        "table": {
            "columnFamilies": column_families,
            "granularity": "MILLIS",
        }
    })
}

fn mutate_rows_body(rows: &[RowMutation]) -> Value {
    let entries: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mutations: Vec<Value> = row
                .mutations
                .iter()
                .map(|m| {
                    json!({
                        "setCell": {
                            "familyName": m.family,
                            "columnQualifier": BASE64.encode(&m.qualifier),
                            "timestampMicros": m.timestamp_micros.to_string(),
                            "value": BASE64.encode(&m.value),
                        }
                    })
                })
                .collect();
            json!({
                "rowKey": BASE64.encode(&row.row_key),
                "mutations": mutations,
            })
        })
        .collect();

    json!({ "entries": entries })
}

fn read_row_body(row_key: &str, filter: Option<&RowFilter>) -> Value {
    let mut body = json!({
        "rows": { "rowKeys": [BASE64.encode(row_key)] },
        "rowsLimit": "1",
    });

    if let Some(RowFilter::TimestampRange {
        start_micros,
        end_micros,
    }) = filter
    {
        let mut range = serde_json::Map::new();
        if let Some(start) = start_micros {
            range.insert("startTimestampMicros".into(), Value::String(start.to_string()));
        }
        if let Some(end) = end_micros {
            range.insert("endTimestampMicros".into(), Value::String(end.to_string()));
        }
        body["filter"] = json!({ "timestampRangeFilter": range });
    }
    body
}

/// Streaming responses arrive as a JSON array; tolerate a single message too.
fn stream_messages<T: for<'de> Deserialize<'de>>(body: Value) -> Result<Vec<T>> {
    let messages = match body {
        Value::Array(items) => items,
        other => vec![other],
    };
    messages
        .into_iter()
        .map(|m| serde_json::from_value(m).map_err(|e| BigtableError::Protocol(e.to_string())))
        .collect()
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    let message = serde_json::from_str::<GoogleErrorResponse>(&body)
        .map(|r| r.error.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED => BigtableError::Unauthorized(message),
        StatusCode::FORBIDDEN => BigtableError::PermissionDenied(message),
        StatusCode::NOT_FOUND => BigtableError::TableNotFound(message),
        _ => BigtableError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_body_carries_gc_rules() {
        let seven_days = GcRule::MaxAge(Duration::from_secs(7 * 86_400));
        let body = create_table_body(
            "patient_vitals",
            &[
                ColumnFamilySpec::new("vitals", seven_days),
                ColumnFamilySpec::new("meta", seven_days),
            ],
        );

        assert_eq!(body["tableId"], "patient_vitals");
        assert_eq!(body["table"]["columnFamilies"]["vitals"]["gcRule"]["maxAge"], "604800s");
        assert_eq!(body["table"]["columnFamilies"]["meta"]["gcRule"]["maxAge"], "604800s");
        assert_eq!(body["table"]["columnFamilies"]["meta"]["gcRule"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_mutate_rows_body_encodes_bytes() {
        let mut row = RowMutation::new("s1#2024-01-01T10");
        row.set_cell("vitals", "heart_rate", 1_704_103_200_000_000, "72.5");
        let body = mutate_rows_body(&[row]);

        let entry = &body["entries"][0];
        assert_eq!(entry["rowKey"], BASE64.encode("s1#2024-01-01T10"));
        let set_cell = &entry["mutations"][0]["setCell"];
        assert_eq!(set_cell["familyName"], "vitals");
        assert_eq!(set_cell["columnQualifier"], BASE64.encode("heart_rate"));
        assert_eq!(set_cell["timestampMicros"], "1704103200000000");
        assert_eq!(set_cell["value"], BASE64.encode("72.5"));
    }

    #[test]
    fn test_read_row_body_with_range_filter() {
        let filter = RowFilter::TimestampRange {
            start_micros: Some(1_000),
            end_micros: Some(2_000),
        };
        let body = read_row_body("k", Some(&filter));
        assert_eq!(body["rows"]["rowKeys"][0], BASE64.encode("k"));
        assert_eq!(body["filter"]["timestampRangeFilter"]["startTimestampMicros"], "1000");
        assert_eq!(body["filter"]["timestampRangeFilter"]["endTimestampMicros"], "2000");

        let body = read_row_body("k", None);
        assert!(body.get("filter").is_none());
    }

    #[test]
    fn test_mutate_rows_response_defaults() {
        let responses: Vec<MutateRowsResponse> = stream_messages(json!([
            {"entries": [{"status": {}}, {"index": "1", "status": {"code": 3, "message": "bad family"}}]}
        ]))
        .unwrap();
        let entries = &responses[0].entries;
        assert_eq!(entries[0].index, "0");
        assert_eq!(entries[0].status.code, 0);
        assert_eq!(entries[1].status.code, 3);
    }
}
