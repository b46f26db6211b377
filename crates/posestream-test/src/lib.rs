//! POSESTREAM Test Harness - End-to-end validation over real sockets
//!
//! This crate provides:
//! - A loopback server fixture on an ephemeral port
//! - Polling helpers for asserting on eventually-visible state
//! - Scenario tests covering producer, server and client together

pub mod harness;

#[cfg(test)]
mod scenarios;

pub use harness::*;
