//! posestream-viewer - headless consumer that maps the stream onto SMPL body_pose
//!
//! Logs the mapped axis-angle rows instead of drawing a mesh.

use std::process::ExitCode;

use tracing::info;

use posestream_core::PoseResult;
use posestream_runtime::{init_logging, run_viewer, CliArgs, FileConfig, ViewerOptions, USAGE};
use posestream_transport::StreamClient;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::from_env() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };
    if args.help {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("posestream-viewer: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> PoseResult<()> {
    let file = FileConfig::load_or_default(args.config.as_deref())?;
    init_logging(&file.logging)?;

    let mut config = file.client_config();
    if let Some(addr) = args.addr {
        config.server_addr = addr;
    }
    let client = StreamClient::new(config);
    let options = ViewerOptions {
        retry: args.retry,
        ..Default::default()
    };

    let outcome = tokio::select! {
        result = run_viewer(&client, &options) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, closing connection");
            Ok(())
        }
    };
    client.shutdown().await;
    outcome
}
