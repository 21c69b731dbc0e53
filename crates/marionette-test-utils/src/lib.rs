//! Shared test fixtures and utilities for Marionette crates.
//!
//! Provides an in-memory skeleton implementing the host capability traits,
//! a recording debug sink, and deterministic RNG setup with random chain
//! generators.

pub mod mock;
pub mod recording;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use mock::MockSkeleton;
pub use recording::{RecordedLine, RecordedSphere, RecordingSink};
pub use rng::{random_bent_chain, random_point_at, random_unit_vector, seeded_rng};
