//! Wide-column store operations

use async_trait::async_trait;

use crate::types::{ColumnFamilySpec, Row, RowFilter, RowMutation};
use crate::Result;

/// Operations on a single wide-column table.
#[async_trait]
pub trait WideColumnStore: Send + Sync {
    async fn table_exists(&self) -> Result<bool>;

    async fn delete_table(&self) -> Result<()>;

    async fn create_table(&self, families: &[ColumnFamilySpec]) -> Result<()>;

    /// Apply every row mutation in one request.
    async fn mutate_rows(&self, rows: &[RowMutation]) -> Result<()>;

    /// Read one row; `None` if no cell survives the filter.
    async fn read_row(&self, row_key: &str, filter: Option<&RowFilter>) -> Result<Option<Row>>;
}
