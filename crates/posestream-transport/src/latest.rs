//! Latest-pose cell shared between the receive loop and the renderer
//!
//! Holds only the newest snapshot. Readers never wait on I/O, only on a
//! short read lock. Only the client's receive loop writes it.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

use posestream_core::PoseSnapshot;
use posestream_wire::StreamFrame;

/// What the renderer can tell about the stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    /// No frame received yet; the pose is the empty default
    Idle,
    /// Connected and frames are arriving
    Live,
    /// Connected but no frame within the staleness window
    Stale,
    /// Connect failed or the stream was lost; the pose is the last one seen
    Disconnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    Idle,
    Connected,
    Disconnected,
}

#[derive(Debug)]
struct LatestInner {
    pose: PoseSnapshot,
    link: Link,
    /// Bumped on every connect so a finished loop cannot touch a newer link
    session: u64,
    last_seq: Option<u64>,
    last_frame_at: Option<Instant>,
    frames: u64,
    last_error: Option<String>,
}

/// Single-slot cell with the newest received pose
#[derive(Debug)]
pub struct LatestPose {
    inner: RwLock<LatestInner>,
}

impl Default for LatestPose {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestPose {
    pub fn new() -> Self {
        LatestPose {
            inner: RwLock::new(LatestInner {
                pose: PoseSnapshot::new(),
                link: Link::Idle,
                session: 0,
                last_seq: None,
                last_frame_at: None,
                frames: 0,
                last_error: None,
            }),
        }
    }

    /// Copy of the newest pose (empty until the first frame)
    pub fn pose(&self) -> PoseSnapshot {
        self.inner.read().pose.clone()
    }

    pub fn status(&self, stale_after: Duration) -> LinkStatus {
        let inner = self.inner.read();
        match inner.link {
            Link::Disconnected => LinkStatus::Disconnected,
            Link::Idle => LinkStatus::Idle,
            Link::Connected => match inner.last_frame_at {
                None => LinkStatus::Idle,
                Some(at) if at.elapsed() <= stale_after => LinkStatus::Live,
                Some(_) => LinkStatus::Stale,
            },
        }
    }

    /// Frames applied since creation
    pub fn frames_received(&self) -> u64 {
        self.inner.read().frames
    }

    /// Why the last link ended
    pub fn last_error(&self) -> Option<String> {
        self.inner.read().last_error.clone()
    }

    /// Start a new link, returning its session id
    pub(crate) fn begin_session(&self) -> u64 {
        let mut inner = self.inner.write();
        inner.session += 1;
        inner.link = Link::Connected;
        inner.last_seq = None;
        inner.last_frame_at = None;
        inner.last_error = None;
        inner.session
    }

    /// End the link identified by `session`; stale sessions are ignored
    pub(crate) fn end_session(&self, session: u64, reason: Option<String>) {
        let mut inner = self.inner.write();
        if inner.session == session && inner.link == Link::Connected {
            inner.link = Link::Disconnected;
            inner.last_error = reason;
        }
    }

    /// Record a failed connect attempt
    pub(crate) fn connect_failed(&self, reason: String) {
        let mut inner = self.inner.write();
        if inner.link != Link::Connected {
            inner.link = Link::Disconnected;
            inner.last_error = Some(reason);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().link == Link::Connected
    }

    pub fn current_session(&self) -> u64 {
        self.inner.read().session
    }

    /// Replace the newest pose
    ///
    /// Returns `false` if the frame belongs to an ended session or is not
    /// newer than the last frame applied on this session.
    pub(crate) fn publish(&self, session: u64, frame: StreamFrame) -> bool {
        let mut inner = self.inner.write();
        if inner.session != session || inner.link != Link::Connected {
            return false;
        }
        if matches!(inner.last_seq, Some(last) if frame.seq <= last) {
            return false;
        }
        inner.last_seq = Some(frame.seq);
        inner.last_frame_at = Some(Instant::now());
        inner.frames += 1;
        inner.pose = frame.pose;
        true
    }
}
