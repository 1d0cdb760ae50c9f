//! Control-channel message types shared by the controller and the workers.
//!
//! These are the logical payloads; their byte layout on the wire lives in
//! [`crate::wire`].

use std::fmt;

/// Salt capacity, including the terminating NUL on the wire.
pub const MAX_SALT_LEN: usize = 64;
/// Target-hash capacity, including the terminating NUL on the wire.
pub const MAX_HASH_LEN: usize = 256;
/// Cleartext-password capacity, including the terminating NUL on the wire.
pub const MAX_PASSWORD_LEN: usize = 64;

/// The supported crypt(3) hash schemes.
///
/// Discriminants are the wire identifiers and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Algorithm {
    Md5 = 1,
    Bcrypt = 2,
    Sha256 = 5,
    Sha512 = 6,
    Yescrypt = 7,
}

impl Algorithm {
    /// Decode a wire identifier.
    pub fn from_wire(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Md5),
            2 => Some(Self::Bcrypt),
            5 => Some(Self::Sha256),
            6 => Some(Self::Sha512),
            7 => Some(Self::Yescrypt),
            _ => None,
        }
    }

    /// Map the `$<tag>$` identifier of a shadow entry to an algorithm.
    ///
    /// bcrypt appears as `2`, `2a`, `2b` or `2y`, so any tag starting
    /// with `2` selects it.
    pub fn from_shadow_tag(tag: &str) -> Option<Self> {
        match tag {
            "1" => Some(Self::Md5),
            "5" => Some(Self::Sha256),
            "6" => Some(Self::Sha512),
            "y" => Some(Self::Yescrypt),
            t if t.starts_with('2') => Some(Self::Bcrypt),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Bcrypt => "bcrypt",
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
            Self::Yescrypt => "yescrypt",
        }
    }

    /// Build the setting string handed to the hash primitive.
    ///
    /// For bcrypt the salt already carries its cost segment
    /// (`rounds$22-char-salt`) and for yescrypt its parameter segment
    /// (`params$salt`), so neither takes a trailing `$`.
    pub fn salt_template(&self, salt: &str) -> String {
        match self {
            Self::Md5 => format!("$1${salt}$"),
            Self::Bcrypt => format!("$2b${salt}"),
            Self::Sha256 => format!("$5${salt}$"),
            Self::Sha512 => format!("$6${salt}$"),
            Self::Yescrypt => format!("$y${salt}"),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The job descriptor, immutable after creation on the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct CrackJob {
    pub algorithm: Algorithm,
    /// Algorithm-specific salt blob; at most `MAX_SALT_LEN - 1` bytes.
    pub salt: String,
    /// Digest component of the shadow entry; at most `MAX_HASH_LEN - 1` bytes.
    pub target_hash: String,
}

/// Terminal outcome sent by a worker, exactly once per connection.
#[derive(Debug, Clone, PartialEq)]
pub struct CrackResult {
    pub found: bool,
    /// Cleartext password; empty when not found.
    pub password: String,
    /// Milliseconds from job acknowledgment to result emission.
    pub crack_time_ms: f64,
}

/// Progress sample produced in answer to a heartbeat request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartbeatResponse {
    /// Candidates tested since the previous heartbeat.
    pub delta_tested: u64,
    /// Lifetime counter for this worker.
    pub total_tested: u64,
    /// Cracking threads currently running.
    pub threads_active: u32,
    /// Candidates per second since job acknowledgment.
    pub current_rate: f64,
}

/// A granted slice `[start_idx, start_idx + count)` of the candidate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkAssign {
    pub start_idx: u64,
    pub count: u64,
}
