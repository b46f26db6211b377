//! Joint identifiers for the streamed skeleton
//!
//! The joint vocabulary is closed and versioned. Server and client must agree
//! on `JOINT_SET_VERSION`; it is carried in every wire frame so a mismatch is
//! rejected instead of silently mis-posing the model.
//!
//! Variant order follows the SMPL `body_pose` block, so the discriminant is
//! also the body-pose row index (see [`JointId::body_pose_index`]).

use std::fmt;
use std::str::FromStr;

use crate::{PoseError, PoseResult};

/// Version of the joint vocabulary and its body-pose index layout
pub const JOINT_SET_VERSION: u8 = 1;

/// Number of joints in the vocabulary
pub const JOINT_COUNT: usize = 23;

/// Skeletal joint identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum JointId {
    LeftHip = 0,
    RightHip = 1,
    Spine1 = 2,
    LeftKnee = 3,
    RightKnee = 4,
    Spine2 = 5,
    LeftAnkle = 6,
    RightAnkle = 7,
    Spine3 = 8,
    LeftFoot = 9,
    RightFoot = 10,
    Neck = 11,
    LeftCollar = 12,
    RightCollar = 13,
    Head = 14,
    LeftShoulder = 15,
    RightShoulder = 16,
    LeftElbow = 17,
    RightElbow = 18,
    LeftWrist = 19,
    RightWrist = 20,
    LeftIndex = 21,
    RightIndex = 22,
}

impl JointId {
    /// All joints in body-pose order
    pub const ALL: [JointId; JOINT_COUNT] = [
        JointId::LeftHip,
        JointId::RightHip,
        JointId::Spine1,
        JointId::LeftKnee,
        JointId::RightKnee,
        JointId::Spine2,
        JointId::LeftAnkle,
        JointId::RightAnkle,
        JointId::Spine3,
        JointId::LeftFoot,
        JointId::RightFoot,
        JointId::Neck,
        JointId::LeftCollar,
        JointId::RightCollar,
        JointId::Head,
        JointId::LeftShoulder,
        JointId::RightShoulder,
        JointId::LeftElbow,
        JointId::RightElbow,
        JointId::LeftWrist,
        JointId::RightWrist,
        JointId::LeftIndex,
        JointId::RightIndex,
    ];

    /// Wire name of the joint
    pub fn as_str(self) -> &'static str {
        match self {
            JointId::LeftHip => "left_hip",
            JointId::RightHip => "right_hip",
            JointId::Spine1 => "spine1",
            JointId::LeftKnee => "left_knee",
            JointId::RightKnee => "right_knee",
            JointId::Spine2 => "spine2",
            JointId::LeftAnkle => "left_ankle",
            JointId::RightAnkle => "right_ankle",
            JointId::Spine3 => "spine3",
            JointId::LeftFoot => "left_foot",
            JointId::RightFoot => "right_foot",
            JointId::Neck => "neck",
            JointId::LeftCollar => "left_collar",
            JointId::RightCollar => "right_collar",
            JointId::Head => "head",
            JointId::LeftShoulder => "left_shoulder",
            JointId::RightShoulder => "right_shoulder",
            JointId::LeftElbow => "left_elbow",
            JointId::RightElbow => "right_elbow",
            JointId::LeftWrist => "left_wrist",
            JointId::RightWrist => "right_wrist",
            JointId::LeftIndex => "left_index",
            JointId::RightIndex => "right_index",
        }
    }

    /// Row of this joint in the SMPL `body_pose` block (23 × 3)
    #[inline]
    pub fn body_pose_index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl FromStr for JointId {
    type Err = PoseError;

    fn from_str(s: &str) -> PoseResult<Self> {
        JointId::ALL
            .iter()
            .copied()
            .find(|j| j.as_str() == s)
            .ok_or_else(|| PoseError::InvalidJoint(s.to_string()))
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of joints, stored as a bitmask over body-pose indices
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JointSet(u32);

impl JointSet {
    pub const EMPTY: JointSet = JointSet(0);

    /// Every joint in the vocabulary
    pub fn all() -> Self {
        JointSet((1u32 << JOINT_COUNT) - 1)
    }

    pub fn from_joints<I: IntoIterator<Item = JointId>>(joints: I) -> Self {
        let mut set = JointSet::EMPTY;
        for joint in joints {
            set.insert(joint);
        }
        set
    }

    /// Parse a list of joint names; the first unknown name fails
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> PoseResult<Self> {
        let mut set = JointSet::EMPTY;
        for name in names {
            set.insert(name.as_ref().parse()?);
        }
        Ok(set)
    }

    #[inline]
    pub fn insert(&mut self, joint: JointId) {
        self.0 |= 1 << joint.body_pose_index();
    }

    #[inline]
    pub fn contains(self, joint: JointId) -> bool {
        self.0 & (1 << joint.body_pose_index()) != 0
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate in body-pose order
    pub fn iter(self) -> impl Iterator<Item = JointId> {
        JointId::ALL.into_iter().filter(move |j| self.contains(*j))
    }
}

impl fmt::Debug for JointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<JointId> for JointSet {
    fn from_iter<I: IntoIterator<Item = JointId>>(iter: I) -> Self {
        JointSet::from_joints(iter)
    }
}
