//! Candidate enumeration — the bijection between a 64-bit global index and
//! a 1–4 character printable-ASCII password.
//!
//! The search space is every string of length 1..=4 over character codes
//! 33..=111 (79 characters), ordered shortest-first and lexicographically
//! within a length.  Indices are dense: `[0, 79)` are the one-character
//! passwords, `[79, 6320)` the two-character ones, and so on.  Any worker
//! can crack an index range `[start, start+count)` independently because
//! the mapping is total, stable and allocation-free.

/// Lowest character code in the alphabet (`'!'`).
pub const PW_CHAR_MIN: u8 = 33;
/// Highest character code in the alphabet (`'o'`).
pub const PW_CHAR_MAX: u8 = 111;
/// Alphabet size: 79 characters.
pub const PW_CHAR_RANGE: u64 = (PW_CHAR_MAX - PW_CHAR_MIN + 1) as u64;
/// Longest candidate password.
pub const PW_MAX_LEN: usize = 4;

/// First index of the two-character bucket (79).
pub const OFF_LEN2: u64 = PW_CHAR_RANGE;
/// First index of the three-character bucket (6 320).
pub const OFF_LEN3: u64 = OFF_LEN2 + PW_CHAR_RANGE * PW_CHAR_RANGE;
/// First index of the four-character bucket (499 359).
pub const OFF_LEN4: u64 = OFF_LEN3 + PW_CHAR_RANGE * PW_CHAR_RANGE * PW_CHAR_RANGE;
/// Total number of candidates: 79 + 79² + 79³ + 79⁴ = 39 449 600.
pub const TOTAL_CANDIDATES: u64 =
    OFF_LEN4 + PW_CHAR_RANGE * PW_CHAR_RANGE * PW_CHAR_RANGE * PW_CHAR_RANGE;

/// Write the password for `idx` into `out` and return its length.
///
/// Returns `None` when `idx` is outside `[0, TOTAL_CANDIDATES)`.  The
/// most significant base-79 digit lands at position 0, so consecutive
/// indices differ in the last character first.
pub fn password_at(idx: u64, out: &mut [u8; PW_MAX_LEN]) -> Option<usize> {
    let (mut rem, len) = if idx < OFF_LEN2 {
        (idx, 1)
    } else if idx < OFF_LEN3 {
        (idx - OFF_LEN2, 2)
    } else if idx < OFF_LEN4 {
        (idx - OFF_LEN3, 3)
    } else if idx < TOTAL_CANDIDATES {
        (idx - OFF_LEN4, 4)
    } else {
        return None;
    };

    for pos in (0..len).rev() {
        out[pos] = PW_CHAR_MIN + (rem % PW_CHAR_RANGE) as u8;
        rem /= PW_CHAR_RANGE;
    }
    Some(len)
}

/// Allocating convenience wrapper around [`password_at`].
pub fn index_to_password(idx: u64) -> Option<String> {
    let mut buf = [0u8; PW_MAX_LEN];
    let len = password_at(idx, &mut buf)?;
    // The alphabet is pure ASCII, so this conversion cannot fail.
    std::str::from_utf8(&buf[..len]).ok().map(str::to_owned)
}

/// Exact inverse of [`index_to_password`].
///
/// Returns `None` for the empty string, strings longer than
/// [`PW_MAX_LEN`], or any character outside the alphabet.
pub fn password_to_index(password: &str) -> Option<u64> {
    let bytes = password.as_bytes();
    if bytes.is_empty() || bytes.len() > PW_MAX_LEN {
        return None;
    }

    let mut value = 0u64;
    for &b in bytes {
        if !(PW_CHAR_MIN..=PW_CHAR_MAX).contains(&b) {
            return None;
        }
        value = value * PW_CHAR_RANGE + (b - PW_CHAR_MIN) as u64;
    }

    let base = match bytes.len() {
        1 => 0,
        2 => OFF_LEN2,
        3 => OFF_LEN3,
        _ => OFF_LEN4,
    };
    Some(base + value)
}
