//! SMPL body-pose mapping - the boundary into rendering code
//!
//! Mesh deformation is out of scope. What lives here is the contract a
//! renderer relies on to turn a [`PoseSnapshot`] into the SMPL `body_pose`
//! parameter block:
//!
//! - Row index: [`JointId::body_pose_index`], layout version
//!   [`crate::JOINT_SET_VERSION`]
//! - Convention: each rotation is extrinsic XYZ Euler angles in degrees,
//!   converted to an axis-angle vector in radians

use crate::{JointId, PoseSnapshot, Rotation3, JOINT_COUNT};

/// Consumer of streamed poses (renderer side)
pub trait PoseApplier {
    /// Apply a complete snapshot. Called from the render/consumer thread.
    fn apply(&mut self, pose: &PoseSnapshot);
}

#[derive(Clone, Copy, Debug)]
struct Quat {
    w: f64,
    x: f64,
    y: f64,
    z: f64,
}

impl Quat {
    fn axis(axis: usize, angle: f64) -> Quat {
        let (s, c) = (angle * 0.5).sin_cos();
        let mut q = Quat {
            w: c,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        match axis {
            0 => q.x = s,
            1 => q.y = s,
            _ => q.z = s,
        }
        q
    }

    fn mul(self, o: Quat) -> Quat {
        Quat {
            w: self.w * o.w - self.x * o.x - self.y * o.y - self.z * o.z,
            x: self.w * o.x + self.x * o.w + self.y * o.z - self.z * o.y,
            y: self.w * o.y - self.x * o.z + self.y * o.w + self.z * o.x,
            z: self.w * o.z + self.x * o.y - self.y * o.x + self.z * o.w,
        }
    }

    fn to_rotvec(self) -> [f64; 3] {
        // Canonical hemisphere so the angle lands in [0, π]
        let q = if self.w < 0.0 {
            Quat {
                w: -self.w,
                x: -self.x,
                y: -self.y,
                z: -self.z,
            }
        } else {
            self
        };

        let n = (q.x * q.x + q.y * q.y + q.z * q.z).sqrt();
        let angle = 2.0 * n.atan2(q.w);
        let scale = if angle.abs() < 1e-3 {
            // Taylor expansion of angle / sin(angle / 2)
            let a2 = angle * angle;
            2.0 + a2 / 12.0 + 7.0 * a2 * a2 / 2880.0
        } else {
            angle / (angle * 0.5).sin()
        };
        [q.x * scale, q.y * scale, q.z * scale]
    }
}

impl Rotation3 {
    /// Interpret as extrinsic XYZ Euler degrees and convert to axis-angle radians
    pub fn euler_xyz_degrees_to_axis_angle(self) -> [f64; 3] {
        let qx = Quat::axis(0, self.x.to_radians());
        let qy = Quat::axis(1, self.y.to_radians());
        let qz = Quat::axis(2, self.z.to_radians());
        qz.mul(qy).mul(qx).to_rotvec()
    }
}

/// SMPL `body_pose` block: one axis-angle row per joint
#[derive(Clone, Debug, PartialEq)]
pub struct SmplBodyPose {
    rows: [[f64; 3]; JOINT_COUNT],
    reset: bool,
}

impl Default for SmplBodyPose {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SmplBodyPose {
    /// `reset`: zero joints absent from a snapshot instead of keeping them
    pub fn new(reset: bool) -> Self {
        Self {
            rows: [[0.0; 3]; JOINT_COUNT],
            reset,
        }
    }

    pub fn row(&self, joint: JointId) -> [f64; 3] {
        self.rows[joint.body_pose_index()]
    }

    pub fn rows(&self) -> &[[f64; 3]; JOINT_COUNT] {
        &self.rows
    }

    /// Row-major copy, the layout a `(1, 69)` pose tensor expects
    pub fn to_flat(&self) -> Vec<f64> {
        self.rows.iter().flatten().copied().collect()
    }
}

impl PoseApplier for SmplBodyPose {
    fn apply(&mut self, pose: &PoseSnapshot) {
        if self.reset {
            self.rows = [[0.0; 3]; JOINT_COUNT];
        }
        for (joint, rotation) in pose.iter() {
            self.rows[joint.body_pose_index()] = rotation.euler_xyz_degrees_to_axis_angle();
        }
    }
}
