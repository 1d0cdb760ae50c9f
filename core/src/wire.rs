//! Byte-exact framing of the control channel.
//!
//! Every frame is a 1-byte tag optionally followed by a fixed-size
//! payload determined by the tag.  Multibyte integers are little-endian
//! with fixed widths; string fields occupy fixed-capacity regions and are
//! NUL-terminated, so every payload size is a compile-time constant.
//! Changing anything here is a protocol break between controller and
//! worker builds.
//!
//! Payload sizes:
//!
//! | frame              | bytes |
//! |--------------------|-------|
//! | `Job`              | 321   |
//! | `Result`           | 73    |
//! | `HeartbeatResp`    | 28    |
//! | `ChunkAssign`      | 16    |
//!
//! All other frames are bare tags.  A short read inside a payload is a
//! protocol error and the peer is dropped.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::messages::{
    Algorithm, ChunkAssign, CrackJob, CrackResult, HeartbeatResponse, MAX_HASH_LEN,
    MAX_PASSWORD_LEN, MAX_SALT_LEN,
};

/// algorithm id + salt region + hash region.
pub const JOB_PAYLOAD_LEN: usize = 1 + MAX_SALT_LEN + MAX_HASH_LEN;
/// found flag + password region + f64 milliseconds.
pub const RESULT_PAYLOAD_LEN: usize = 1 + MAX_PASSWORD_LEN + 8;
/// delta + total + threads + rate.
pub const HEARTBEAT_PAYLOAD_LEN: usize = 8 + 8 + 4 + 8;
/// start index + count.
pub const CHUNK_PAYLOAD_LEN: usize = 8 + 8;

/// Frame tags. Discriminants are on the wire and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgTag {
    Register = 1,
    Job = 2,
    Result = 3,
    HeartbeatReq = 4,
    HeartbeatResp = 5,
    RequestChunk = 6,
    ChunkAssign = 7,
    Stop = 8,
}

impl MsgTag {
    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Register),
            2 => Some(Self::Job),
            3 => Some(Self::Result),
            4 => Some(Self::HeartbeatReq),
            5 => Some(Self::HeartbeatResp),
            6 => Some(Self::RequestChunk),
            7 => Some(Self::ChunkAssign),
            8 => Some(Self::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
    #[error("unknown algorithm id {0}")]
    UnknownAlgorithm(u8),
    #[error("{field} is {len} bytes, capacity is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{field} is not valid utf-8")]
    BadString { field: &'static str },
    #[error("{field} is missing its NUL terminator")]
    Unterminated { field: &'static str },
}

/// One decoded control-channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Register,
    Job(CrackJob),
    Result(CrackResult),
    HeartbeatReq,
    HeartbeatResp(HeartbeatResponse),
    RequestChunk,
    ChunkAssign(ChunkAssign),
    Stop,
}

impl Frame {
    pub fn tag(&self) -> MsgTag {
        match self {
            Frame::Register => MsgTag::Register,
            Frame::Job(_) => MsgTag::Job,
            Frame::Result(_) => MsgTag::Result,
            Frame::HeartbeatReq => MsgTag::HeartbeatReq,
            Frame::HeartbeatResp(_) => MsgTag::HeartbeatResp,
            Frame::RequestChunk => MsgTag::RequestChunk,
            Frame::ChunkAssign(_) => MsgTag::ChunkAssign,
            Frame::Stop => MsgTag::Stop,
        }
    }
}

fn put_cstr(dst: &mut [u8], field: &'static str, s: &str) -> Result<(), WireError> {
    let bytes = s.as_bytes();
    if bytes.len() >= dst.len() {
        return Err(WireError::FieldTooLong {
            field,
            len: bytes.len(),
            max: dst.len() - 1,
        });
    }
    dst[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn get_cstr(src: &[u8], field: &'static str) -> Result<String, WireError> {
    let end = src
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::Unterminated { field })?;
    std::str::from_utf8(&src[..end])
        .map(str::to_owned)
        .map_err(|_| WireError::BadString { field })
}

pub fn encode_job(job: &CrackJob) -> Result<[u8; JOB_PAYLOAD_LEN], WireError> {
    let mut buf = [0u8; JOB_PAYLOAD_LEN];
    buf[0] = job.algorithm as u8;
    put_cstr(&mut buf[1..1 + MAX_SALT_LEN], "salt", &job.salt)?;
    put_cstr(&mut buf[1 + MAX_SALT_LEN..], "target_hash", &job.target_hash)?;
    Ok(buf)
}

pub fn decode_job(buf: &[u8; JOB_PAYLOAD_LEN]) -> Result<CrackJob, WireError> {
    let algorithm =
        Algorithm::from_wire(buf[0]).ok_or(WireError::UnknownAlgorithm(buf[0]))?;
    Ok(CrackJob {
        algorithm,
        salt: get_cstr(&buf[1..1 + MAX_SALT_LEN], "salt")?,
        target_hash: get_cstr(&buf[1 + MAX_SALT_LEN..], "target_hash")?,
    })
}

pub fn encode_result(result: &CrackResult) -> Result<[u8; RESULT_PAYLOAD_LEN], WireError> {
    let mut buf = [0u8; RESULT_PAYLOAD_LEN];
    buf[0] = result.found as u8;
    put_cstr(&mut buf[1..1 + MAX_PASSWORD_LEN], "password", &result.password)?;
    buf[1 + MAX_PASSWORD_LEN..].copy_from_slice(&result.crack_time_ms.to_le_bytes());
    Ok(buf)
}

pub fn decode_result(buf: &[u8; RESULT_PAYLOAD_LEN]) -> Result<CrackResult, WireError> {
    let mut ms = [0u8; 8];
    ms.copy_from_slice(&buf[1 + MAX_PASSWORD_LEN..]);
    Ok(CrackResult {
        found: buf[0] != 0,
        password: get_cstr(&buf[1..1 + MAX_PASSWORD_LEN], "password")?,
        crack_time_ms: f64::from_le_bytes(ms),
    })
}

pub fn encode_heartbeat(hb: &HeartbeatResponse) -> [u8; HEARTBEAT_PAYLOAD_LEN] {
    let mut buf = [0u8; HEARTBEAT_PAYLOAD_LEN];
    buf[0..8].copy_from_slice(&hb.delta_tested.to_le_bytes());
    buf[8..16].copy_from_slice(&hb.total_tested.to_le_bytes());
    buf[16..20].copy_from_slice(&hb.threads_active.to_le_bytes());
    buf[20..28].copy_from_slice(&hb.current_rate.to_le_bytes());
    buf
}

pub fn decode_heartbeat(buf: &[u8; HEARTBEAT_PAYLOAD_LEN]) -> HeartbeatResponse {
    let mut u = [0u8; 8];
    let mut f = [0u8; 8];
    let mut t = [0u8; 4];
    u.copy_from_slice(&buf[0..8]);
    let delta_tested = u64::from_le_bytes(u);
    u.copy_from_slice(&buf[8..16]);
    let total_tested = u64::from_le_bytes(u);
    t.copy_from_slice(&buf[16..20]);
    f.copy_from_slice(&buf[20..28]);
    HeartbeatResponse {
        delta_tested,
        total_tested,
        threads_active: u32::from_le_bytes(t),
        current_rate: f64::from_le_bytes(f),
    }
}

pub fn encode_chunk(chunk: &ChunkAssign) -> [u8; CHUNK_PAYLOAD_LEN] {
    let mut buf = [0u8; CHUNK_PAYLOAD_LEN];
    buf[0..8].copy_from_slice(&chunk.start_idx.to_le_bytes());
    buf[8..16].copy_from_slice(&chunk.count.to_le_bytes());
    buf
}

pub fn decode_chunk(buf: &[u8; CHUNK_PAYLOAD_LEN]) -> ChunkAssign {
    let mut u = [0u8; 8];
    u.copy_from_slice(&buf[0..8]);
    let start_idx = u64::from_le_bytes(u);
    u.copy_from_slice(&buf[8..16]);
    ChunkAssign {
        start_idx,
        count: u64::from_le_bytes(u),
    }
}

/// Read one frame, blocking until the tag and its full payload arrived.
///
/// EOF before the tag byte surfaces as [`io::ErrorKind::UnexpectedEof`];
/// so does a short read inside a payload.  Either way the connection is
/// unusable afterwards.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, WireError>
where
    R: AsyncRead + Unpin,
{
    let tag = reader.read_u8().await?;
    let tag = MsgTag::from_wire(tag).ok_or(WireError::UnknownTag(tag))?;
    match tag {
        MsgTag::Register => Ok(Frame::Register),
        MsgTag::HeartbeatReq => Ok(Frame::HeartbeatReq),
        MsgTag::RequestChunk => Ok(Frame::RequestChunk),
        MsgTag::Stop => Ok(Frame::Stop),
        MsgTag::Job => {
            let mut buf = [0u8; JOB_PAYLOAD_LEN];
            reader.read_exact(&mut buf).await?;
            Ok(Frame::Job(decode_job(&buf)?))
        }
        MsgTag::Result => {
            let mut buf = [0u8; RESULT_PAYLOAD_LEN];
            reader.read_exact(&mut buf).await?;
            Ok(Frame::Result(decode_result(&buf)?))
        }
        MsgTag::HeartbeatResp => {
            let mut buf = [0u8; HEARTBEAT_PAYLOAD_LEN];
            reader.read_exact(&mut buf).await?;
            Ok(Frame::HeartbeatResp(decode_heartbeat(&buf)))
        }
        MsgTag::ChunkAssign => {
            let mut buf = [0u8; CHUNK_PAYLOAD_LEN];
            reader.read_exact(&mut buf).await?;
            Ok(Frame::ChunkAssign(decode_chunk(&buf)))
        }
    }
}

/// Write one frame as a single buffer (tag + payload) and flush.
///
/// The frame is fully encoded before any byte is written, so an encoding
/// error never leaves a half-written frame on the stream.  Callers that
/// share a socket between tasks must serialize calls under a write lock.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(1 + JOB_PAYLOAD_LEN);
    buf.push(frame.tag() as u8);
    match frame {
        Frame::Register | Frame::HeartbeatReq | Frame::RequestChunk | Frame::Stop => {}
        Frame::Job(job) => buf.extend_from_slice(&encode_job(job)?),
        Frame::Result(result) => buf.extend_from_slice(&encode_result(result)?),
        Frame::HeartbeatResp(hb) => buf.extend_from_slice(&encode_heartbeat(hb)),
        Frame::ChunkAssign(chunk) => buf.extend_from_slice(&encode_chunk(chunk)),
    }
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_sizes_are_frozen() {
        assert_eq!(JOB_PAYLOAD_LEN, 321);
        assert_eq!(RESULT_PAYLOAD_LEN, 73);
        assert_eq!(HEARTBEAT_PAYLOAD_LEN, 28);
        assert_eq!(CHUNK_PAYLOAD_LEN, 16);
    }

    #[test]
    fn job_payload_round_trips() {
        let job = CrackJob {
            algorithm: Algorithm::Sha512,
            salt: "saltsalt".into(),
            target_hash: "abcDEF123".into(),
        };
        let buf = encode_job(&job).unwrap();
        assert_eq!(decode_job(&buf).unwrap(), job);
    }

    #[test]
    fn job_rejects_oversized_salt() {
        let job = CrackJob {
            algorithm: Algorithm::Md5,
            salt: "s".repeat(MAX_SALT_LEN),
            target_hash: "h".into(),
        };
        assert!(matches!(
            encode_job(&job),
            Err(WireError::FieldTooLong { field: "salt", .. })
        ));
    }

    #[test]
    fn job_rejects_unknown_algorithm_id() {
        let mut buf = [0u8; JOB_PAYLOAD_LEN];
        buf[0] = 3;
        assert!(matches!(
            decode_job(&buf),
            Err(WireError::UnknownAlgorithm(3))
        ));
    }

    #[test]
    fn result_payload_round_trips() {
        let result = CrackResult {
            found: true,
            password: "Ab1".into(),
            crack_time_ms: 1234.5,
        };
        let buf = encode_result(&result).unwrap();
        assert_eq!(decode_result(&buf).unwrap(), result);
    }

    #[test]
    fn chunk_integers_are_little_endian() {
        let chunk = ChunkAssign {
            start_idx: 0x0102_0304_0506_0708,
            count: 1,
        };
        let buf = encode_chunk(&chunk);
        assert_eq!(buf[0], 0x08);
        assert_eq!(buf[7], 0x01);
        assert_eq!(decode_chunk(&buf), chunk);
    }

    #[tokio::test]
    async fn stream_round_trips_every_frame_kind() {
        let frames = vec![
            Frame::Register,
            Frame::Job(CrackJob {
                algorithm: Algorithm::Md5,
                salt: "xy".into(),
                target_hash: "digest".into(),
            }),
            Frame::RequestChunk,
            Frame::ChunkAssign(ChunkAssign {
                start_idx: 42,
                count: 10_000,
            }),
            Frame::HeartbeatReq,
            Frame::HeartbeatResp(HeartbeatResponse {
                delta_tested: 5,
                total_tested: 10,
                threads_active: 4,
                current_rate: 123.0,
            }),
            Frame::Result(CrackResult {
                found: false,
                password: String::new(),
                crack_time_ms: 0.5,
            }),
            Frame::Stop,
        ];

        let mut stream = Vec::new();
        for frame in &frames {
            write_frame(&mut stream, frame).await.unwrap();
        }

        let mut cursor = stream.as_slice();
        for expected in &frames {
            let got = read_frame(&mut cursor).await.unwrap();
            assert_eq!(&got, expected);
        }
        assert!(cursor.is_empty());
    }

    #[tokio::test]
    async fn truncated_payload_is_a_protocol_error() {
        let job = CrackJob {
            algorithm: Algorithm::Md5,
            salt: "xy".into(),
            target_hash: "digest".into(),
        };
        let mut stream = Vec::new();
        write_frame(&mut stream, &Frame::Job(job)).await.unwrap();
        stream.truncate(100);

        let mut cursor = stream.as_slice();
        match read_frame(&mut cursor).await {
            Err(WireError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected short-read error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tag_is_a_protocol_error() {
        let mut cursor: &[u8] = &[0xAA];
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(WireError::UnknownTag(0xAA))
        ));
    }
}
