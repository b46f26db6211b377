//! POSESTREAM Transport Layer - TCP pose streaming
//!
//! This crate provides:
//! - Streaming server (one task per client, fixed send interval)
//! - Stream client (receive loop + latest-pose cell)
//! - Link status for renderers (idle / live / stale / disconnected)

pub mod client;
pub mod latest;
pub mod server;

pub use client::*;
pub use latest::*;
pub use server::*;
