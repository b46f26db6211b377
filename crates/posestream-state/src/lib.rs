//! POSESTREAM State - The server-side pose store
//!
//! This crate implements the only state mutated by more than one thread on
//! the server:
//! - Merge of partial updates (last write wins per joint)
//! - Validation against the configured joint set
//! - Atomic full snapshots for the send loops

pub mod store;

pub use store::*;
