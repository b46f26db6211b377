//! Loopback fixtures

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use posestream_core::{JointSet, PoseError, PoseResult};
use posestream_transport::{ClientConfig, ServerConfig, StreamClient, StreamingServer};

/// Address that lets the OS pick a free port
pub const LOOPBACK_ANY: &str = "127.0.0.1:0";

/// A started server on an ephemeral port
pub struct TestServer {
    pub server: Arc<StreamingServer>,
    pub addr: SocketAddr,
    serving: Option<JoinHandle<PoseResult<()>>>,
}

impl TestServer {
    /// Serve every joint at `send_interval`
    pub async fn start(send_interval: Duration) -> PoseResult<Self> {
        Self::start_with(ServerConfig {
            listen_addr: LOOPBACK_ANY.to_string(),
            send_interval,
            joints: JointSet::all(),
            ..Default::default()
        })
        .await
    }

    pub async fn start_with(config: ServerConfig) -> PoseResult<Self> {
        let addr = config.listen_addr.clone();
        let server = Arc::new(StreamingServer::new(config)?);
        let (addr, serving) = server.start(&addr).await?;
        Ok(TestServer {
            server,
            addr,
            serving: Some(serving),
        })
    }

    /// Client config pointing at this server
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_addr: self.addr.to_string(),
            ..Default::default()
        }
    }

    /// New client, already connected
    pub async fn connect_client(&self) -> PoseResult<StreamClient> {
        let client = StreamClient::new(self.client_config());
        client.connect().await?;
        Ok(client)
    }

    /// Stop the server and wait for the accept loop to finish
    pub async fn shutdown(mut self) -> PoseResult<()> {
        self.server.stop();
        match self.serving.take() {
            Some(handle) => match time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(PoseError::TransportError(e.to_string())),
                Err(_) => Err(PoseError::TransportError("server did not stop".into())),
            },
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.serving.is_some() {
            self.server.stop();
        }
    }
}

/// Poll `cond` until it holds or `limit` passes; returns the final answer
pub async fn wait_until<F>(limit: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + limit;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        time::sleep(Duration::from_millis(5)).await;
    }
}

/// Run `fut` with a deadline, mapping expiry to a transport error
pub async fn within<T, F>(limit: Duration, fut: F) -> PoseResult<T>
where
    F: Future<Output = PoseResult<T>>,
{
    match time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(PoseError::TransportError(format!(
            "no result within {:?}",
            limit
        ))),
    }
}
