//! POSESTREAM Runtime - Everything the binaries need around the library crates
//!
//! - JSON configuration with humantime durations
//! - tracing subscriber setup
//! - Synthetic dance producer for manual checks
//! - Command-line parsing shared by `posestream-server` and `posestream-viewer`
//! - The headless viewer loop

pub mod cli;
pub mod config;
pub mod demo;
pub mod logging;
pub mod viewer;

pub use cli::*;
pub use config::*;
pub use demo::*;
pub use logging::*;
pub use viewer::*;
