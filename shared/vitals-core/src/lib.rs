//! Vitals Core - Shared domain types and job infrastructure
//!
//! This crate provides:
//! - The cleaned `Reading` record shared by every job
//! - Configuration resolved once from the environment
//! - Error taxonomy used by job entry points
//! - Newline-delimited JSON helpers and credential discovery

pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod jsonl;

pub use config::{BigtableBackend, LeadingGapPolicy, PipelineConfig};
pub use credentials::{AccessTokenSource, CredentialsError, GcpTokenSource, StaticTokenSource};
pub use domain::*;
pub use error::{Result, VitalsError, AUTH_HINT};
