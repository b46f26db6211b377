//! Pose state store - joint rotations behind a single lock

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use posestream_core::{JointId, JointSet, PoseError, PoseResult, PoseSnapshot, Rotation3};

#[derive(Debug)]
struct StoreInner {
    joints: BTreeMap<JointId, Rotation3>,
    /// Number of updates that changed at least one value
    version: u64,
}

/// Thread-safe mapping from joint to rotation
///
/// Every joint of the configured set is always present (zero at start).
/// `update` validates the whole partial pose before taking the write lock,
/// so a rejected update never mutates anything and an accepted one is seen
/// by readers all at once.
#[derive(Debug)]
pub struct PoseStateStore {
    joint_set: JointSet,
    inner: RwLock<StoreInner>,
}

impl Default for PoseStateStore {
    fn default() -> Self {
        Self::new(JointSet::all())
    }
}

impl PoseStateStore {
    /// Create a store covering `joint_set`, every joint at zero rotation
    pub fn new(joint_set: JointSet) -> Self {
        PoseStateStore {
            joint_set,
            inner: RwLock::new(StoreInner {
                joints: joint_set.iter().map(|j| (j, Rotation3::ZERO)).collect(),
                version: 0,
            }),
        }
    }

    /// The authoritative set of joints this store accepts
    pub fn joint_set(&self) -> JointSet {
        self.joint_set
    }

    /// Merge a partial pose
    pub fn update(&self, partial: &PoseSnapshot) -> PoseResult<()> {
        if let Some((joint, _)) = partial.iter().find(|(j, _)| !self.joint_set.contains(*j)) {
            debug!("Rejected update for joint outside configured set: {}", joint);
            return Err(PoseError::InvalidJoint(joint.to_string()));
        }

        let mut inner = self.inner.write();
        let mut changed = false;
        for (joint, rotation) in partial.iter() {
            match inner.joints.insert(joint, rotation) {
                Some(previous) if same_bits(previous, rotation) => {}
                _ => changed = true,
            }
        }
        if changed {
            inner.version += 1;
        }
        Ok(())
    }

    /// Merge a partial pose given by joint names
    pub fn update_named<S: AsRef<str>>(&self, entries: &[(S, [f64; 3])]) -> PoseResult<()> {
        let partial = PoseSnapshot::from_named(entries)?;
        self.update(&partial)
    }

    /// Copy of the full current state
    pub fn snapshot(&self) -> PoseSnapshot {
        let inner = self.inner.read();
        inner.joints.iter().map(|(j, r)| (*j, *r)).collect()
    }

    /// Copy of the full current state with the version it was taken at
    pub fn versioned_snapshot(&self) -> (u64, PoseSnapshot) {
        let inner = self.inner.read();
        let pose = inner.joints.iter().map(|(j, r)| (*j, *r)).collect();
        (inner.version, pose)
    }

    /// Current rotation of one joint
    pub fn get(&self, joint: JointId) -> Option<Rotation3> {
        self.inner.read().joints.get(&joint).copied()
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}

/// Bitwise equality, so a repeated NaN write is not a change
fn same_bits(a: Rotation3, b: Rotation3) -> bool {
    a.x.to_bits() == b.x.to_bits()
        && a.y.to_bits() == b.y.to_bits()
        && a.z.to_bits() == b.z.to_bits()
}
