//! Stream client - keeps the newest pose sent by a streaming server
//!
//! The receive loop runs on its own tokio task and only ever writes the
//! [`LatestPose`] cell. Reconnection is never automatic: after a lost stream
//! the status stays `Disconnected` until the caller connects again.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use posestream_core::{PoseError, PoseResult, PoseSnapshot};
use posestream_wire::FrameDecoder;

use crate::latest::{LatestPose, LinkStatus};
use crate::server::{stopped, DEFAULT_LISTEN_ADDR};

/// Stream client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_addr: String,
    pub connect_timeout: Duration,
    /// Silence after which a connected stream reports `Stale`
    pub stale_after: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_addr: DEFAULT_LISTEN_ADDR.to_string(),
            connect_timeout: Duration::from_secs(2),
            stale_after: Duration::from_millis(500),
        }
    }
}

struct Link {
    session: u64,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Client side of the pose stream
pub struct StreamClient {
    config: ClientConfig,
    latest: Arc<LatestPose>,
    link: Mutex<Option<Link>>,
}

impl StreamClient {
    pub fn new(config: ClientConfig) -> Self {
        StreamClient {
            config,
            latest: Arc::new(LatestPose::new()),
            link: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect to the configured server and start the receive loop
    ///
    /// Connecting while a link is up is a no-op. On failure the client is
    /// left disconnected and `connect` may be called again.
    pub async fn connect(&self) -> PoseResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let addr = self.config.server_addr.as_str();
        let stream = match time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.connect_failed(format!("{}: {}", addr, e))),
            Err(_) => {
                return Err(self.connect_failed(format!(
                    "{}: no answer within {:?}",
                    addr, self.config.connect_timeout
                )))
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }

        let session = self.latest.begin_session();
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(receive_loop(stream, Arc::clone(&self.latest), session, stop_rx));

        info!("Connected to pose stream at {}", addr);
        if let Some(old) = self.link.lock().replace(Link {
            session,
            stop,
            task,
        }) {
            old.stop.send_replace(true);
        }
        Ok(())
    }

    fn connect_failed(&self, reason: String) -> PoseError {
        warn!("Pose stream connect failed: {}", reason);
        self.latest.connect_failed(reason.clone());
        PoseError::ConnectionFailed(reason)
    }

    /// Newest received pose; empty until the first frame arrives
    pub fn latest_pose(&self) -> PoseSnapshot {
        self.latest.pose()
    }

    pub fn status(&self) -> LinkStatus {
        self.latest.status(self.config.stale_after)
    }

    pub fn is_connected(&self) -> bool {
        self.latest.is_connected()
    }

    pub fn frames_received(&self) -> u64 {
        self.latest.frames_received()
    }

    /// Why the last link ended or the last connect failed
    pub fn last_error(&self) -> Option<String> {
        self.latest.last_error()
    }

    /// Shared cell for a render thread that does not own the client
    pub fn latest(&self) -> Arc<LatestPose> {
        Arc::clone(&self.latest)
    }

    /// Close the socket and end the receive loop
    pub fn stop(&self) {
        if let Some(link) = self.link.lock().take() {
            link.stop.send_replace(true);
            self.latest
                .end_session(link.session, Some("stopped by caller".to_string()));
            info!("Pose stream client stopped");
        }
    }

    /// Stop and wait for the receive loop to finish
    pub async fn shutdown(&self) {
        let link = self.link.lock().take();
        if let Some(link) = link {
            link.stop.send_replace(true);
            self.latest
                .end_session(link.session, Some("stopped by caller".to_string()));
            let _ = link.task.await;
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.stop.send_replace(true);
        }
    }
}

async fn receive_loop(
    mut stream: TcpStream,
    latest: Arc<LatestPose>,
    session: u64,
    mut stop: watch::Receiver<bool>,
) {
    let mut decoder = FrameDecoder::new();

    let reason = loop {
        let read = tokio::select! {
            _ = stopped(&mut stop) => break None,
            read = stream.read_buf(decoder.buffer_mut()) => read,
        };

        match read {
            Ok(0) => break Some("server closed the stream".to_string()),
            Ok(_) => {}
            Err(e) => break Some(PoseError::TransportError(e.to_string()).to_string()),
        }

        // Only the newest complete frame matters; older ones in the same read are skipped
        match decoder.latest_frame() {
            Ok(Some(frame)) => {
                latest.publish(session, frame);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Dropping pose stream on malformed frame: {}", e);
                break Some(e.to_string());
            }
        }
    };

    match &reason {
        Some(r) => info!("Pose stream lost: {}", r),
        None => debug!("Receive loop stopped"),
    }
    latest.end_session(session, reason);
}
