//! Small typed wrappers shared across entities and ports.

mod confidence;
mod ids;

pub use confidence::ConfidenceTier;
pub use ids::{ActivityId, BatchId, ChunkId, ObservationId, SessionId};
