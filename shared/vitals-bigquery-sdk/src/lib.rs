//! BigQuery SDK for the vitals platform
//!
//! Thin REST v2 client covering dataset/table management and
//! newline-delimited JSON load jobs, behind the [`WarehouseApi`] trait.

mod api;
mod client;
mod error;
mod types;

pub use api::{wait_for_job, WarehouseApi};
pub use client::BigQueryClient;
pub use error::{BigQueryError, Result};
pub use types::*;

