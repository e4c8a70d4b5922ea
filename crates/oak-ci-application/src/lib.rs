//! Application layer: the use cases that orchestrate `oak-ci-domain`'s
//! port traits into the daemon's actual behavior (spec.md §4.6-§4.10).
//!
//! This crate depends only on `oak-ci-domain` (plus pure libraries for
//! file enumeration and hashing). It never depends on a concrete adapter
//! crate; every use case is constructed from `Arc<dyn Port>` handed to it
//! by the binary's composition root.

pub mod exclusion;
pub mod metadata;
pub mod use_cases;

pub use use_cases::*;
