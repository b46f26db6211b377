//! End-to-end scenarios: producer, server and clients over loopback TCP

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use posestream_core::{JointId, JointSet, PoseError, PoseSnapshot, Rotation3, JOINT_COUNT};
use posestream_transport::{ClientConfig, LinkStatus, ServerConfig, StreamClient, StreamingServer};
use posestream_wire::{decode_frame, encode_frame, FrameDecoder, StreamFrame};

use crate::harness::{wait_until, within, TestServer, LOOPBACK_ANY};

const INTERVAL: Duration = Duration::from_millis(50);

fn elbow(x: f64) -> PoseSnapshot {
    PoseSnapshot::new().with(JointId::LeftElbow, [x, 0.0, 0.0])
}

fn elbow_x(client: &StreamClient) -> Option<f64> {
    client.latest_pose().get(JointId::LeftElbow).map(|r| r.x)
}

#[tokio::test]
async fn test_client_sees_update_within_200ms() {
    let fixture = TestServer::start(INTERVAL).await.unwrap();
    fixture
        .server
        .update_joint_angles_named(&[("left_elbow", [0.0, 0.0, 0.0])])
        .unwrap();

    let client = fixture.connect_client().await.unwrap();
    assert!(
        wait_until(Duration::from_millis(200), || client.latest_pose().contains(JointId::LeftElbow)).await
    );
    assert_eq!(
        client.latest_pose().get(JointId::LeftElbow),
        Some(Rotation3::ZERO)
    );
    assert_eq!(client.status(), LinkStatus::Live);

    client.shutdown().await;
    fixture.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_snapshots_are_full() {
    let fixture = TestServer::start(INTERVAL).await.unwrap();
    fixture.server.update_joint_angles(&elbow(15.0)).unwrap();

    let client = fixture.connect_client().await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || client.frames_received() > 0).await);

    let pose = client.latest_pose();
    assert_eq!(pose.len(), JOINT_COUNT);
    assert_eq!(pose.joint_set(), JointSet::all());
    assert_eq!(pose.get(JointId::Head), Some(Rotation3::ZERO));

    client.shutdown().await;
    fixture.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_last_write_wins_before_first_client() {
    let fixture = TestServer::start(Duration::from_millis(10)).await.unwrap();
    fixture
        .server
        .update_joint_angles_named(&[("left_elbow", [0.0, 0.0, 0.0])])
        .unwrap();
    fixture
        .server
        .update_joint_angles_named(&[("left_elbow", [90.0, 0.0, 0.0])])
        .unwrap();

    // Read the raw stream so every frame on the connection is checked
    let mut stream = TcpStream::connect(fixture.addr).await.unwrap();
    let mut decoder = FrameDecoder::new();
    let mut seen = 0;
    while seen < 5 {
        let n = within(Duration::from_secs(1), async {
            stream
                .read_buf(decoder.buffer_mut())
                .await
                .map_err(|e| PoseError::TransportError(e.to_string()))
        })
        .await
        .unwrap();
        assert_ne!(n, 0, "server closed the stream");

        while let Some(frame) = decoder.next_frame().unwrap() {
            assert_eq!(
                frame.pose.get(JointId::LeftElbow),
                Some(Rotation3::new(90.0, 0.0, 0.0)),
                "frame {} carried an older value",
                frame.seq
            );
            seen += 1;
        }
    }

    drop(stream);
    fixture.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_partial_updates_merge() {
    let fixture = TestServer::start(INTERVAL).await.unwrap();
    fixture.server.update_joint_angles(&elbow(30.0)).unwrap();
    fixture
        .server
        .update_joint_angles(&PoseSnapshot::new().with(JointId::Neck, [5.0, 0.0, 0.0]))
        .unwrap();

    let client = fixture.connect_client().await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || client.frames_received() > 0).await);
    let pose = client.latest_pose();
    assert_eq!(pose.get(JointId::LeftElbow).map(|r| r.x), Some(30.0));
    assert_eq!(pose.get(JointId::Neck).map(|r| r.x), Some(5.0));

    client.shutdown().await;
    fixture.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_killed_client_does_not_disturb_others() {
    let fixture = TestServer::start(Duration::from_millis(10)).await.unwrap();
    let doomed = TcpStream::connect(fixture.addr).await.unwrap();
    let survivor = fixture.connect_client().await.unwrap();

    assert!(wait_until(Duration::from_secs(1), || fixture.server.active_connections() == 2).await);
    assert!(wait_until(Duration::from_secs(1), || survivor.frames_received() > 0).await);

    // Zero linger turns the close into a reset
    doomed.set_linger(Some(Duration::ZERO)).unwrap();
    drop(doomed);

    // Server notices the reset on a later write and drops only that connection
    for step in 0..20 {
        fixture.server.update_joint_angles(&elbow(step as f64)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(wait_until(Duration::from_secs(2), || fixture.server.active_connections() == 1).await);

    fixture.server.update_joint_angles(&elbow(99.0)).unwrap();
    assert!(wait_until(Duration::from_secs(1), || elbow_x(&survivor) == Some(99.0)).await);
    assert!(survivor.is_connected());

    let stats = fixture.server.stats();
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.closed, 1);

    survivor.shutdown().await;
    fixture.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_truncated_frame_leaves_pose_unchanged() {
    let listener = TcpListener::bind(LOOPBACK_ANY).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = StreamClient::new(ClientConfig {
        server_addr: addr.to_string(),
        ..Default::default()
    });
    let (connected, accepted) = tokio::join!(client.connect(), listener.accept());
    connected.unwrap();
    let (mut peer, _) = accepted.unwrap();

    peer.write_all(&encode_frame(&StreamFrame::new(0, 0, elbow(90.0))))
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(1), || elbow_x(&client) == Some(90.0)).await);

    // Body cut three bytes short, with a length prefix that agrees with the cut
    let whole = encode_frame(&StreamFrame::new(1, 0, elbow(45.0)));
    let body = &whole[4..whole.len() - 3];
    let mut cut = BytesMut::with_capacity(4 + body.len());
    cut.put_u32_le(body.len() as u32);
    cut.put_slice(body);
    peer.write_all(&cut).await.unwrap();

    assert!(
        wait_until(Duration::from_secs(1), || client.status() == LinkStatus::Disconnected).await
    );
    assert_eq!(elbow_x(&client), Some(90.0));
    assert_eq!(client.frames_received(), 1);
    assert!(client.last_error().is_some());

    // The same bytes surface as a protocol error
    assert!(decode_frame(&cut).unwrap_err().is_protocol());
}

#[tokio::test]
async fn test_stop_disconnects_clients() {
    let fixture = TestServer::start(INTERVAL).await.unwrap();
    let first = fixture.connect_client().await.unwrap();
    let second = fixture.connect_client().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || first.frames_received() > 0 && second.frames_received() > 0).await
    );

    let server = fixture.server.clone();
    within(Duration::from_secs(5), fixture.shutdown()).await.unwrap();

    assert_eq!(server.active_connections(), 0);
    assert!(
        wait_until(Duration::from_secs(1), || first.status() == LinkStatus::Disconnected).await
    );
    assert!(
        wait_until(Duration::from_secs(1), || second.status() == LinkStatus::Disconnected).await
    );
    assert!(!first.latest_pose().is_empty());
}

#[tokio::test]
async fn test_connect_retry_after_refusal() {
    let probe = TcpListener::bind(LOOPBACK_ANY).await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let client = StreamClient::new(ClientConfig {
        server_addr: addr.to_string(),
        ..Default::default()
    });
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, PoseError::ConnectionFailed(_)));
    assert_eq!(client.status(), LinkStatus::Disconnected);

    let fixture = TestServer::start_with(ServerConfig {
        listen_addr: addr.to_string(),
        send_interval: INTERVAL,
        ..Default::default()
    })
    .await
    .unwrap();
    fixture.server.update_joint_angles(&elbow(12.0)).unwrap();

    client.connect().await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || elbow_x(&client) == Some(12.0)).await);
    assert_eq!(client.status(), LinkStatus::Live);

    client.shutdown().await;
    fixture.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bind_in_use_fails_synchronously() {
    let fixture = TestServer::start(INTERVAL).await.unwrap();

    let second = StreamingServer::new(ServerConfig::default()).unwrap();
    let err = second
        .bind(&fixture.addr.to_string())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, PoseError::Bind { .. }));

    fixture.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_out_of_set_update_rejected_end_to_end() {
    let fixture = TestServer::start_with(ServerConfig {
        listen_addr: LOOPBACK_ANY.to_string(),
        send_interval: INTERVAL,
        joints: JointSet::from_joints([JointId::LeftShoulder, JointId::LeftElbow]),
        ..Default::default()
    })
    .await
    .unwrap();

    let err = fixture
        .server
        .update_joint_angles_named(&[("left_elbow", [1.0, 0.0, 0.0]), ("head", [2.0, 0.0, 0.0])])
        .unwrap_err();
    assert!(matches!(err, PoseError::InvalidJoint(_)));

    let client = fixture.connect_client().await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || client.frames_received() > 0).await);
    let pose = client.latest_pose();
    assert_eq!(pose.len(), 2);
    assert_eq!(pose.get(JointId::LeftElbow), Some(Rotation3::ZERO));

    client.shutdown().await;
    fixture.shutdown().await.unwrap();
}
