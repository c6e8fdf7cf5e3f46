//! Bigtable SDK for the vitals platform
//!
//! Provides the [`WideColumnStore`] trait with two implementations: a
//! REST client for Cloud Bigtable and an in-process [`MemoryStore`].

mod api;
mod chunks;
mod client;
mod error;
mod memory;
mod types;

pub use api::WideColumnStore;
pub use client::BigtableClient;
pub use error::{BigtableError, Result};
pub use memory::MemoryStore;
pub use types::*;

