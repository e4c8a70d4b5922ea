//! Use cases: the orchestration layer between HTTP/MCP entry points (built
//! in `oak-ci-server`) and the domain ports.
//!
//! - [`indexing_service`]: full/incremental index runs (spec.md §4.6).
//! - [`retrieval_service`]: unified code/memory/plan search (spec.md §4.8).
//! - [`hook_ingestion_service`]: agent lifecycle hooks and context
//!   injection (spec.md §4.9).
//! - [`background_processor_service`]: the job bodies run by the tiered
//!   scheduler (spec.md §4.10).

pub mod background_processor_service;
pub mod hook_ingestion_service;
pub mod indexing_service;
pub mod retrieval_service;

pub use background_processor_service::{BackgroundProcessorConfig, BackgroundProcessorService};
pub use hook_ingestion_service::{HookIngestionService, InjectedContext, InjectionConfig};
pub use indexing_service::{IndexReport, IndexingService};
pub use retrieval_service::{RetrievalService, RetrievedItem, SearchType};
