//! Synthetic dance producer
//!
//! Drives shoulders, spine1, hips and knees with sinusoids so a viewer has
//! something to show without a real pose source. The producer never waits on
//! clients: it only writes the store, and the store never blocks on I/O.

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use posestream_core::{JointId, JointSet, PoseError, PoseResult, PoseSnapshot};
use posestream_transport::{ServerConfig, StreamingServer};

/// Primary tempo of the dance
pub const DANCE_TEMPO_HZ: f64 = 0.6;

/// How often the producer writes a new pose
pub const DANCE_PERIOD: Duration = Duration::from_millis(100);

/// Joints the dance touches
pub const DANCE_JOINTS: [JointId; 7] = [
    JointId::RightShoulder,
    JointId::LeftShoulder,
    JointId::Spine1,
    JointId::RightHip,
    JointId::LeftHip,
    JointId::RightKnee,
    JointId::LeftKnee,
];

/// Dance pose `elapsed` into the routine, rotations in degrees
pub fn dance_pose(elapsed: Duration) -> PoseSnapshot {
    let beat = 2.0 * PI * DANCE_TEMPO_HZ * elapsed.as_secs_f64();

    let arm_swing = 35.0 * beat.sin();
    let arm_raise = 25.0 * (beat * 0.5).sin();
    let torso_twist = 15.0 * (beat * 1.2).sin();
    let leg_kick = 20.0 * (beat + PI / 2.0).sin();
    let knee_bounce = 10.0 * (beat * 2.0).sin();

    PoseSnapshot::new()
        .with(JointId::RightShoulder, [arm_swing, arm_raise, 0.0])
        .with(JointId::LeftShoulder, [-arm_swing, -arm_raise, 0.0])
        .with(JointId::Spine1, [0.0, torso_twist, 0.0])
        .with(JointId::LeftHip, [leg_kick, 0.0, 0.0])
        .with(JointId::RightHip, [-leg_kick, 0.0, 0.0])
        .with(JointId::LeftKnee, [knee_bounce, 0.0, 0.0])
        .with(JointId::RightKnee, [-knee_bounce, 0.0, 0.0])
}

/// Writes the dance into a server until the server stops
pub struct DanceProducer {
    server: Arc<StreamingServer>,
    started: Instant,
    period: Duration,
}

impl DanceProducer {
    /// Fails if the server's joint set cannot hold the dance joints
    pub fn new(server: Arc<StreamingServer>) -> PoseResult<Self> {
        let joints = server.config().joints;
        if let Some(missing) = DANCE_JOINTS.iter().find(|j| !joints.contains(**j)) {
            return Err(PoseError::InvalidJoint(missing.as_str().to_string()));
        }
        Ok(DanceProducer {
            server,
            started: Instant::now(),
            period: DANCE_PERIOD,
        })
    }

    /// Fails with `Config` for a zero period
    pub fn with_period(mut self, period: Duration) -> PoseResult<Self> {
        if period.is_zero() {
            return Err(PoseError::Config("dance period must be > 0".into()));
        }
        self.period = period;
        Ok(self)
    }

    /// Write the pose for the current instant
    pub fn step(&self) -> PoseResult<()> {
        let pose = dance_pose(self.started.elapsed());
        self.server.update_joint_angles(&pose)
    }

    /// Step every period until the server is stopped
    pub async fn run(self) -> PoseResult<()> {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut steps: u64 = 0;
        while !self.server.is_stopped() {
            ticker.tick().await;
            self.step()?;
            steps += 1;
            if steps % 100 == 0 {
                debug!("Dance producer wrote {} poses", steps);
            }
        }
        Ok(())
    }
}

/// Server config for the demo: the given config, narrowed to the dance joints
/// when it still accepts every joint
pub fn demo_config(mut config: ServerConfig) -> ServerConfig {
    if config.joints == JointSet::all() {
        config.joints = JointSet::from_joints(DANCE_JOINTS);
    }
    config
}

/// Serve the dance on `config.listen_addr` until ctrl-c
pub async fn demo(config: ServerConfig) -> PoseResult<()> {
    let config = demo_config(config);
    let addr = config.listen_addr.clone();
    let server = Arc::new(StreamingServer::new(config)?);
    let producer = DanceProducer::new(Arc::clone(&server))?;

    let (local_addr, serving) = server.start(&addr).await?;
    info!("Demo dance streaming on {}", local_addr);

    let producing = tokio::spawn(producer.run());

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupted, stopping demo"),
        Err(e) => warn!("Cannot listen for ctrl-c ({}), stopping demo", e),
    }
    server.stop();

    match producing.await {
        Ok(result) => result?,
        Err(e) => warn!("Dance producer task failed: {}", e),
    }
    match serving.await {
        Ok(result) => result,
        Err(e) => Err(PoseError::TransportError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_dance_start_pose() {
        let pose = dance_pose(Duration::ZERO);
        assert_eq!(pose.len(), DANCE_JOINTS.len());

        let hip = pose.get(JointId::LeftHip).unwrap();
        assert!(close(hip.x, 20.0));
        assert!(close(pose.get(JointId::RightHip).unwrap().x, -20.0));
        assert!(close(pose.get(JointId::RightShoulder).unwrap().x, 0.0));
    }

    #[test]
    fn test_dance_is_mirrored() {
        for ms in [130u64, 410, 975, 2_300] {
            let pose = dance_pose(Duration::from_millis(ms));
            let right = pose.get(JointId::RightShoulder).unwrap();
            let left = pose.get(JointId::LeftShoulder).unwrap();
            assert!(close(right.x, -left.x));
            assert!(close(right.y, -left.y));

            let lk = pose.get(JointId::LeftKnee).unwrap();
            let rk = pose.get(JointId::RightKnee).unwrap();
            assert!(close(lk.x, -rk.x));
        }
    }

    #[test]
    fn test_dance_amplitudes() {
        for step in 0..200u64 {
            let pose = dance_pose(Duration::from_millis(step * 37));
            let shoulder = pose.get(JointId::RightShoulder).unwrap();
            assert!(shoulder.x.abs() <= 35.0 + 1e-9);
            assert!(shoulder.y.abs() <= 25.0 + 1e-9);
            assert!(pose.get(JointId::Spine1).unwrap().y.abs() <= 15.0 + 1e-9);
            assert!(pose.get(JointId::LeftKnee).unwrap().x.abs() <= 10.0 + 1e-9);
        }
    }

    #[test]
    fn test_demo_config_narrows_all_joints() {
        let config = demo_config(ServerConfig::default());
        assert_eq!(config.joints.len(), DANCE_JOINTS.len());

        let custom = ServerConfig {
            joints: JointSet::from_joints([
                JointId::RightShoulder,
                JointId::LeftShoulder,
                JointId::Spine1,
                JointId::RightHip,
                JointId::LeftHip,
                JointId::RightKnee,
                JointId::LeftKnee,
                JointId::Head,
            ]),
            ..Default::default()
        };
        assert_eq!(demo_config(custom).joints.len(), 8);
    }

    #[test]
    fn test_producer_needs_dance_joints() {
        let config = ServerConfig {
            joints: JointSet::from_joints([JointId::LeftElbow]),
            ..Default::default()
        };
        let server = Arc::new(StreamingServer::new(config).unwrap());
        assert!(matches!(
            DanceProducer::new(server),
            Err(PoseError::InvalidJoint(_))
        ));
    }

    #[test]
    fn test_zero_period_rejected() {
        let server = Arc::new(StreamingServer::new(demo_config(ServerConfig::default())).unwrap());
        let producer = DanceProducer::new(server).unwrap();
        assert!(matches!(
            producer.with_period(Duration::ZERO),
            Err(PoseError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_producer_runs_without_clients() {
        let server = Arc::new(StreamingServer::new(demo_config(ServerConfig::default())).unwrap());
        let producer = DanceProducer::new(Arc::clone(&server))
            .unwrap()
            .with_period(Duration::from_millis(5))
            .unwrap();
        let store = server.store();

        let running = tokio::spawn(producer.run());
        time::sleep(Duration::from_millis(60)).await;
        server.stop();
        running.await.unwrap().unwrap();

        assert!(store.version() > 1);
        assert_eq!(server.active_connections(), 0);
    }
}
