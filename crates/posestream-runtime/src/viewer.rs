//! Headless viewer loop: map the stream onto SMPL body_pose and log it
//!
//! The link is opened once. When it is lost the loop ends, unless
//! `retry` is set, in which case it connects again after `retry_delay`.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use posestream_core::{PoseApplier, PoseResult, SmplBodyPose};
use posestream_transport::{LinkStatus, StreamClient};

#[derive(Clone, Debug)]
pub struct ViewerOptions {
    /// Connect again after a refused or lost stream
    pub retry: bool,
    pub render_period: Duration,
    pub retry_delay: Duration,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        ViewerOptions {
            retry: false,
            render_period: Duration::from_millis(100),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Apply each new pose to a [`SmplBodyPose`] until the stream ends
///
/// Returns `Ok` when the stream is lost without `retry`, and the connect
/// error when the first attempt fails without `retry`. With `retry` it only
/// returns if the caller drops the future.
pub async fn run_viewer(client: &StreamClient, options: &ViewerOptions) -> PoseResult<()> {
    if let Err(e) = client.connect().await {
        if !options.retry {
            return Err(e);
        }
        reconnect(client, options).await;
    }

    let mut body_pose = SmplBodyPose::default();
    let mut applied = 0u64;
    let mut ticker = time::interval(options.render_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match client.status() {
            LinkStatus::Idle => continue,
            LinkStatus::Stale => {
                debug!("No frame within the staleness window, holding last pose");
                continue;
            }
            LinkStatus::Disconnected => {
                let reason = client.last_error().unwrap_or_default();
                if !options.retry {
                    info!("Disconnected from server: {}", reason);
                    return Ok(());
                }
                warn!("Stream lost ({}), reconnecting", reason);
                reconnect(client, options).await;
                continue;
            }
            LinkStatus::Live => {}
        }

        let frames = client.frames_received();
        if frames == applied {
            continue;
        }
        applied = frames;

        let pose = client.latest_pose();
        body_pose.apply(&pose);
        for (joint, rotation) in pose.iter() {
            debug!(
                joint = joint.as_str(),
                deg = ?rotation.to_array(),
                axis_angle = ?body_pose.row(joint),
                "body_pose row {}",
                joint.body_pose_index()
            );
        }
        info!(frames, joints = pose.len(), "Applied pose");
    }
}

async fn reconnect(client: &StreamClient, options: &ViewerOptions) {
    loop {
        time::sleep(options.retry_delay).await;
        match client.connect().await {
            Ok(()) => return,
            Err(e) => debug!("Retrying in {:?}: {}", options.retry_delay, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posestream_core::PoseError;
    use posestream_transport::ClientConfig;
    use tokio::net::TcpListener;

    fn fast(retry: bool) -> ViewerOptions {
        ViewerOptions {
            retry,
            render_period: Duration::from_millis(10),
            retry_delay: Duration::from_millis(20),
        }
    }

    fn client_for(addr: std::net::SocketAddr) -> StreamClient {
        StreamClient::new(ClientConfig {
            server_addr: addr.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_lost_stream_ends_without_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = client_for(listener.local_addr().unwrap());

        let server_side = async {
            let (peer, _) = listener.accept().await.unwrap();
            drop(peer);
            // The server is still up; a second connection must not arrive
            time::timeout(Duration::from_millis(300), listener.accept()).await.is_err()
        };
        let settings = fast(false);
        let viewing = time::timeout(Duration::from_secs(2), run_viewer(&client, &settings));

        let (no_second_connect, viewed) = tokio::join!(server_side, viewing);
        assert!(no_second_connect);
        assert!(viewed.expect("viewer did not stop").is_ok());
        assert_eq!(client.status(), LinkStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_refused_first_connect_is_an_error_without_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(addr);
        let err = run_viewer(&client, &fast(false)).await.unwrap_err();
        assert!(matches!(err, PoseError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_retry_reconnects_after_loss() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = client_for(listener.local_addr().unwrap());

        let server_side = async {
            let (first, _) = listener.accept().await.unwrap();
            drop(first);
            let second = time::timeout(Duration::from_secs(2), listener.accept()).await;
            second.map(|accepted| accepted.is_ok()).unwrap_or(false)
        };

        let settings = fast(true);
        tokio::select! {
            reconnected = server_side => assert!(reconnected),
            _ = run_viewer(&client, &settings) => panic!("viewer with retry returned"),
        }
    }
}
