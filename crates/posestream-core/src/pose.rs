//! Pose state - joint rotations and point-in-time snapshots
//!
//! The core never interprets rotation values. Units and Euler order are a
//! contract between the producer and the renderer (see [`crate::smpl`]).

use std::collections::BTreeMap;

use crate::{JointId, JointSet, PoseResult};

/// Local joint rotation as an opaque 3-vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Rotation3 {
    pub const ZERO: Rotation3 = Rotation3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Rotation3 {
    fn from(v: [f64; 3]) -> Self {
        Rotation3::new(v[0], v[1], v[2])
    }
}

impl From<Rotation3> for [f64; 3] {
    fn from(r: Rotation3) -> Self {
        r.to_array()
    }
}

/// Point-in-time mapping of joints to rotations
///
/// A snapshot may be partial. Joints it omits mean "no change" when it is
/// merged into a store, never "zero rotation".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoseSnapshot {
    joints: BTreeMap<JointId, Rotation3>,
}

impl PoseSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, joint: JointId, rotation: impl Into<Rotation3>) -> Self {
        self.joints.insert(joint, rotation.into());
        self
    }

    /// Build from wire-style names; the first unknown name fails
    pub fn from_named<S: AsRef<str>>(entries: &[(S, [f64; 3])]) -> PoseResult<Self> {
        let mut joints = BTreeMap::new();
        for (name, values) in entries {
            let joint: JointId = name.as_ref().parse()?;
            joints.insert(joint, Rotation3::from(*values));
        }
        Ok(Self { joints })
    }

    pub fn get(&self, joint: JointId) -> Option<Rotation3> {
        self.joints.get(&joint).copied()
    }

    pub fn contains(&self, joint: JointId) -> bool {
        self.joints.contains_key(&joint)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Iterate in body-pose order
    pub fn iter(&self) -> impl Iterator<Item = (JointId, Rotation3)> + '_ {
        self.joints.iter().map(|(j, r)| (*j, *r))
    }

    /// Joints covered by this snapshot
    pub fn joint_set(&self) -> JointSet {
        self.joints.keys().copied().collect()
    }
}

impl FromIterator<(JointId, Rotation3)> for PoseSnapshot {
    fn from_iter<I: IntoIterator<Item = (JointId, Rotation3)>>(iter: I) -> Self {
        Self {
            joints: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PoseSnapshot {
    type Item = (JointId, Rotation3);
    type IntoIter = std::collections::btree_map::IntoIter<JointId, Rotation3>;

    fn into_iter(self) -> Self::IntoIter {
        self.joints.into_iter()
    }
}
