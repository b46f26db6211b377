//! Command-line flags for the two binaries

use std::path::PathBuf;

use posestream_core::{PoseError, PoseResult};

pub const USAGE: &str = "\
usage: posestream-server [--config FILE] [--listen ADDR] [--demo]
       posestream-viewer [--config FILE] [--connect ADDR] [--retry]";

/// Parsed flags; each binary ignores the ones that do not apply to it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    /// Overrides `server.listen_addr` or `client.server_addr`
    pub addr: Option<String>,
    pub demo: bool,
    /// Viewer: connect again after a lost or refused stream
    pub retry: bool,
    pub help: bool,
}

impl CliArgs {
    /// Parse everything after the program name
    pub fn parse<I, S>(args: I) -> PoseResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter().map(Into::<String>::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    parsed.config = Some(PathBuf::from(value_for(&arg, args.next())?));
                }
                "--listen" | "--connect" => parsed.addr = Some(value_for(&arg, args.next())?),
                "--demo" => parsed.demo = true,
                "--retry" => parsed.retry = true,
                "--help" | "-h" => parsed.help = true,
                other => {
                    return Err(PoseError::Config(format!("unknown argument {:?}", other)));
                }
            }
        }
        Ok(parsed)
    }

    pub fn from_env() -> PoseResult<Self> {
        Self::parse(std::env::args().skip(1))
    }
}

fn value_for(flag: &str, value: Option<String>) -> PoseResult<String> {
    match value {
        Some(v) if !v.starts_with("--") => Ok(v),
        _ => Err(PoseError::Config(format!("{} needs a value", flag))),
    }
}
