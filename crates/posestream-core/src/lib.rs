//! POSESTREAM Core - Fundamental types shared by server and client
//!
//! This crate defines the types that cross the process boundary:
//! - Joint identifiers (closed, versioned set)
//! - Rotations and pose snapshots
//! - SMPL body-pose mapping for the renderer side
//! - Error types

pub mod error;
pub mod joint;
pub mod pose;
pub mod smpl;

pub use error::*;
pub use joint::*;
pub use pose::*;
pub use smpl::*;
