//! Pose frame encoding
//!
//! Frame layout:
//! - Bytes 0-3: Body length (LE, excludes these 4 bytes)
//! - Bytes 4-5: Magic `PS`
//! - Byte 6: Wire version
//! - Byte 7: Joint-set version
//! - Bytes 8-15: Sequence number (LE)
//! - Bytes 16-23: Stream time in microseconds (LE)
//! - Bytes 24-25: Entry count (LE)
//! - Entries: name length (u8), UTF-8 name, x/y/z (f64 LE each)

use bytes::{Buf, BufMut, Bytes, BytesMut};

use posestream_core::{JointId, PoseError, PoseResult, PoseSnapshot, Rotation3, JOINT_SET_VERSION};

/// Frame magic
pub const MAGIC: [u8; 2] = *b"PS";

/// Current wire protocol version
pub const WIRE_VERSION: u8 = 1;

/// Length prefix size
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Fixed body header size (magic through entry count)
pub const BODY_HEADER_SIZE: usize = 22;

/// Largest accepted body
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

const ROTATION_SIZE: usize = 24;

/// One pose frame as sent on a connection
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StreamFrame {
    /// Frame counter, per connection, starting at 0
    pub seq: u64,
    /// Stream time since the connection was accepted
    pub timestamp_micros: u64,
    pub pose: PoseSnapshot,
}

impl StreamFrame {
    pub fn new(seq: u64, timestamp_micros: u64, pose: PoseSnapshot) -> Self {
        StreamFrame {
            seq,
            timestamp_micros,
            pose,
        }
    }

    /// Encoded body size (without length prefix)
    pub fn body_size(&self) -> usize {
        BODY_HEADER_SIZE
            + self
                .pose
                .iter()
                .map(|(j, _)| 1 + j.as_str().len() + ROTATION_SIZE)
                .sum::<usize>()
    }

    /// Encoded size including length prefix
    pub fn size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.body_size()
    }
}

/// Encode a frame. Total over every snapshot, including the empty one.
pub fn encode_frame(frame: &StreamFrame) -> Bytes {
    let mut buf = BytesMut::with_capacity(frame.size());
    encode_frame_into(frame, &mut buf);
    buf.freeze()
}

/// Encode a frame, appending to an existing buffer
pub fn encode_frame_into(frame: &StreamFrame, buf: &mut BytesMut) {
    buf.reserve(frame.size());
    buf.put_u32_le(frame.body_size() as u32);
    buf.put_slice(&MAGIC);
    buf.put_u8(WIRE_VERSION);
    buf.put_u8(JOINT_SET_VERSION);
    buf.put_u64_le(frame.seq);
    buf.put_u64_le(frame.timestamp_micros);
    // At most JOINT_COUNT entries, always fits
    buf.put_u16_le(frame.pose.len() as u16);

    for (joint, rotation) in frame.pose.iter() {
        let name = joint.as_str();
        buf.put_u8(name.len() as u8);
        buf.put_slice(name.as_bytes());
        buf.put_f64_le(rotation.x);
        buf.put_f64_le(rotation.y);
        buf.put_f64_le(rotation.z);
    }
}

/// Decode exactly one complete frame, length prefix included
///
/// Fails atomically: either the whole frame decodes or nothing is returned.
pub fn decode_frame(buf: &[u8]) -> PoseResult<StreamFrame> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Err(PoseError::BufferTooShort {
            expected: LENGTH_PREFIX_SIZE,
            actual: buf.len(),
        });
    }

    let body_len = read_length_prefix(buf);
    if body_len > MAX_FRAME_SIZE {
        return Err(PoseError::FrameTooLarge {
            size: body_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let expected = LENGTH_PREFIX_SIZE + body_len;
    if buf.len() < expected {
        return Err(PoseError::BufferTooShort {
            expected,
            actual: buf.len(),
        });
    }
    if buf.len() > expected {
        return Err(PoseError::Protocol(format!(
            "{} bytes past declared frame end",
            buf.len() - expected
        )));
    }

    decode_body(&buf[LENGTH_PREFIX_SIZE..])
}

/// Body length declared by a length prefix
#[inline]
pub(crate) fn read_length_prefix(buf: &[u8]) -> usize {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize
}

fn ensure(buf: &[u8], needed: usize) -> PoseResult<()> {
    if buf.remaining() < needed {
        return Err(PoseError::Protocol(format!(
            "truncated body: need {} more bytes, {} left",
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn decode_body(mut buf: &[u8]) -> PoseResult<StreamFrame> {
    if buf.len() < BODY_HEADER_SIZE {
        return Err(PoseError::BufferTooShort {
            expected: BODY_HEADER_SIZE,
            actual: buf.len(),
        });
    }

    let mut magic = [0u8; 2];
    buf.copy_to_slice(&mut magic);
    if magic != MAGIC {
        return Err(PoseError::Protocol(format!("bad magic {:02x?}", magic)));
    }

    let version = buf.get_u8();
    if version != WIRE_VERSION {
        return Err(PoseError::Protocol(format!(
            "unsupported wire version {}",
            version
        )));
    }

    let joint_set_version = buf.get_u8();
    if joint_set_version != JOINT_SET_VERSION {
        return Err(PoseError::Protocol(format!(
            "joint set version {} does not match local version {}",
            joint_set_version, JOINT_SET_VERSION
        )));
    }

    let seq = buf.get_u64_le();
    let timestamp_micros = buf.get_u64_le();
    let count = buf.get_u16_le() as usize;

    let mut entries: Vec<(JointId, Rotation3)> = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        ensure(buf, 1)?;
        let name_len = buf.get_u8() as usize;
        ensure(buf, name_len + ROTATION_SIZE)?;

        let name = std::str::from_utf8(&buf[..name_len])
            .map_err(|_| PoseError::Protocol("joint name is not UTF-8".into()))?;
        let joint: JointId = name
            .parse()
            .map_err(|_| PoseError::Protocol(format!("unknown joint '{}'", name)))?;
        buf.advance(name_len);

        if entries.iter().any(|(j, _)| *j == joint) {
            return Err(PoseError::Protocol(format!("duplicate joint '{}'", joint)));
        }

        let rotation = Rotation3::new(buf.get_f64_le(), buf.get_f64_le(), buf.get_f64_le());
        entries.push((joint, rotation));
    }

    if buf.has_remaining() {
        return Err(PoseError::Protocol(format!(
            "{} trailing bytes after {} entries",
            buf.remaining(),
            count
        )));
    }

    Ok(StreamFrame {
        seq,
        timestamp_micros,
        pose: entries.into_iter().collect(),
    })
}
