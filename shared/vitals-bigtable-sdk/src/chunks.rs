//! ReadRows response assembly
//!
//! A ReadRows stream delivers rows as a sequence of cell chunks. The row
//! key, family and qualifier are only sent when they change; a cell value
//! may be split over several chunks (`valueSize` > 0 on all but the last);
//! `resetRow` discards the row in progress and `commitRow` completes it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::types::{Cell, Row};
use crate::{BigtableError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadRowsResponse {
    #[serde(default)]
    pub chunks: Vec<CellChunk>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CellChunk {
    #[serde(default)]
    pub row_key: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub qualifier: Option<String>,
    /// int64 as a JSON string
    #[serde(default)]
    pub timestamp_micros: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub value_size: i64,
    #[serde(default)]
    pub reset_row: bool,
    #[serde(default)]
    pub commit_row: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RowAssembler {
    rows: Vec<Row>,
    current: Option<Row>,
    family: Option<String>,
    qualifier: Option<String>,
    timestamp_micros: i64,
    value: Vec<u8>,
}

impl RowAssembler {
    pub fn push(&mut self, chunk: CellChunk) -> Result<()> {
        if chunk.reset_row {
            self.current = None;
            self.family = None;
            self.qualifier = None;
            self.value.clear();
            return Ok(());
        }

        if let Some(key) = &chunk.row_key {
            let key = decode_utf8(key)?;
            if self.current.as_ref().is_some_and(|row| row.key != key) {
                return Err(BigtableError::Protocol(format!(
                    "new row key {} before previous row committed",
                    key
                )));
            }
            if self.current.is_none() {
                self.current = Some(Row::new(key));
            }
        }
        if self.current.is_none() {
            return Err(BigtableError::Protocol("cell chunk without a row key".into()));
        }

        if let Some(family) = chunk.family_name {
            self.family = Some(family);
            // A new family always carries its qualifier.
            self.qualifier = None;
        }
        if let Some(qualifier) = &chunk.qualifier {
            self.qualifier = Some(decode_utf8(qualifier)?);
        }
        if let Some(ts) = &chunk.timestamp_micros {
            self.timestamp_micros = ts
                .parse()
                .map_err(|_| BigtableError::Protocol(format!("bad timestamp {}", ts)))?;
        }
        if let Some(value) = &chunk.value {
            self.value.extend(decode(value)?);
        }

        // A value split across chunks is complete once valueSize drops to zero.
        if chunk.value_size == 0 && (chunk.qualifier.is_some() || chunk.value.is_some() || chunk.timestamp_micros.is_some()) {
            self.finish_cell()?;
        }

        if chunk.commit_row {
            let row = self.current.take().ok_or_else(|| {
                BigtableError::Protocol("commit without an open row".into())
            })?;
            self.rows.push(row);
            self.family = None;
            self.qualifier = None;
        }
        Ok(())
    }

    fn finish_cell(&mut self) -> Result<()> {
        let (Some(family), Some(qualifier), Some(row)) =
            (&self.family, &self.qualifier, self.current.as_mut())
        else {
            return Err(BigtableError::Protocol("cell without family or qualifier".into()));
        };
        row.put(
            family,
            qualifier,
            Cell {
                timestamp_micros: self.timestamp_micros,
                value: std::mem::take(&mut self.value),
            },
        );
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<Row>> {
        if self.current.is_some() {
            return Err(BigtableError::Protocol("stream ended mid-row".into()));
        }
        Ok(self.rows)
    }
}

fn decode(b64: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(b64)
        .map_err(|e| BigtableError::Protocol(format!("invalid base64: {}", e)))
}

fn decode_utf8(b64: &str) -> Result<String> {
    String::from_utf8(decode(b64)?)
        .map_err(|e| BigtableError::Protocol(format!("non UTF-8 key: {}", e)))
}
