//! POSESTREAM Wire Protocol - Length-delimited pose frames
//!
//! This crate implements the server → client wire format:
//! - 4-byte length prefix (LE)
//! - Fixed body header (magic, versions, sequence, stream time)
//! - Self-describing joint entries (name + three f64)
//! - Stream reassembly for partial transport reads

pub mod decoder;
pub mod frame;

pub use decoder::*;
pub use frame::*;
