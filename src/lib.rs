// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod http;
pub mod ingest;
pub mod media;
pub mod metrics;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::{ImportError, MediaError, StoreError};
pub use crate::ingest::orchestrator::{Orchestrator, SourceRunReport};
pub use crate::ingest::runner::{BatchReport, BatchRunner};
pub use crate::ingest::types::{Item, SourceConfig, SourceKind};
