//! posestream-server - serve the pose stream, optionally with the demo dance

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{info, warn};

use posestream_core::{PoseError, PoseResult};
use posestream_runtime::{demo, init_logging, CliArgs, FileConfig, USAGE};
use posestream_transport::StreamingServer;

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
            eprintln!("posestream-server: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> PoseResult<()> {
    let file = FileConfig::load_or_default(args.config.as_deref())?;
    init_logging(&file.logging)?;

    let mut config = file.server_config()?;
    if let Some(addr) = args.addr {
        config.listen_addr = addr;
    }

    if args.demo {
        return demo(config).await;
    }

    let addr = config.listen_addr.clone();
    let server = Arc::new(StreamingServer::new(config)?);
    let (local_addr, serving) = server.start(&addr).await?;
    info!(
        "Serving {} joints on {}, waiting for a producer",
        server.config().joints.len(),
        local_addr
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for ctrl-c: {}", e);
    }
    server.stop();

    let stats = server.stats();
    info!(
        accepted = stats.accepted,
        frames_sent = stats.frames_sent,
        "Server stopped"
    );
    match serving.await {
        Ok(result) => result,
        Err(e) => Err(PoseError::TransportError(e.to_string())),
    }
}
