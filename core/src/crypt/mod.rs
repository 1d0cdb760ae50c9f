//! The hash primitive behind the probe: crypt(3)-style salted hashing.
//!
//! The rest of the system treats hashing as an opaque function from
//! `(password, setting)` to a `$id$…$digest` string.  MD5, bcrypt,
//! SHA-256 and SHA-512 settings dispatch to the `pwhash` crate; `$y$`
//! settings go to the local scrypt-backed [`yescrypt`] module.

mod yescrypt;

use thiserror::Error;

use crate::messages::Algorithm;

/// Length of the base-64 salt inside a bcrypt hash string.
pub const BCRYPT_SALT_B64_LEN: usize = 22;
/// Length of the base-64 digest at the end of a bcrypt hash string.
pub const BCRYPT_DIGEST_B64_LEN: usize = 31;

#[derive(Debug, Error)]
pub enum CryptError {
    #[error("hash primitive failed: {0}")]
    Primitive(String),
    #[error("malformed setting string '{0}'")]
    BadSetting(String),
}

/// Hash `password` under the crypt `setting` string, returning the full
/// `$id$…$digest` form.
pub fn crypt(password: &str, setting: &str) -> Result<String, CryptError> {
    if setting.starts_with("$y$") {
        yescrypt::crypt(password, setting)
    } else {
        pwhash::unix::crypt(password, setting)
            .map_err(|e| CryptError::Primitive(e.to_string()))
    }
}

/// Extract the digest component of a crypt hash string.
///
/// For MD5, SHA-256, SHA-512 and yescrypt this is the text after the
/// final `$`.  bcrypt does not separate salt and digest, so its final
/// component additionally drops the 22-character salt prefix, leaving
/// the trailing 31-character digest.  The returned slice is exactly what
/// the shadow parser stores as the target hash, which is what makes a
/// single byte-wise comparison work across all five algorithms.
pub fn digest_suffix<'a>(hash: &'a str, algorithm: Algorithm) -> Option<&'a str> {
    if !hash.starts_with('$') {
        return None;
    }
    let tail = hash.rsplit('$').next()?;
    match algorithm {
        Algorithm::Bcrypt => tail.get(BCRYPT_SALT_B64_LEN..),
        _ => Some(tail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_crypt_has_the_classic_shape() {
        let hash = crypt("ABC", "$1$saltsalt$").unwrap();
        assert!(hash.starts_with("$1$saltsalt$"), "{hash}");
        let digest = digest_suffix(&hash, Algorithm::Md5).unwrap();
        assert!(!digest.is_empty());
        assert!(!digest.contains('$'));
    }

    #[test]
    fn md5_crypt_is_deterministic_and_salt_sensitive() {
        let a = crypt("ABC", "$1$saltsalt$").unwrap();
        let b = crypt("ABC", "$1$saltsalt$").unwrap();
        let c = crypt("ABC", "$1$othersal$").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sha_crypt_digests_extract() {
        let h256 = crypt("pw", "$5$saltsalt$").unwrap();
        let h512 = crypt("pw", "$6$saltsalt$").unwrap();
        assert!(digest_suffix(&h256, Algorithm::Sha256).is_some());
        assert!(digest_suffix(&h512, Algorithm::Sha512).is_some());
        assert_ne!(h256, h512);
    }

    #[test]
    fn bcrypt_digest_drops_the_salt_prefix() {
        let setting = "$2b$05$abcdefghijklmnopqrstuv";
        let hash = crypt("pw", setting).unwrap();
        let digest = digest_suffix(&hash, Algorithm::Bcrypt).unwrap();
        assert_eq!(digest.len(), BCRYPT_DIGEST_B64_LEN);
        assert!(hash.ends_with(digest));
        // The component after the last '$' is salt + digest combined.
        let combined = hash.rsplit('$').next().unwrap();
        assert_eq!(combined.len(), BCRYPT_SALT_B64_LEN + BCRYPT_DIGEST_B64_LEN);
    }

    #[test]
    fn yescrypt_round_trips_through_the_probe() {
        let hash = crypt("pw", "$y$j9T$abcdefg").unwrap();
        assert!(hash.starts_with("$y$j9T$abcdefg$"), "{hash}");
        let digest = digest_suffix(&hash, Algorithm::Yescrypt).unwrap();
        assert!(!digest.is_empty());
        assert_eq!(crypt("pw", "$y$j9T$abcdefg").unwrap(), hash);
        assert_ne!(crypt("pw2", "$y$j9T$abcdefg").unwrap(), hash);
    }

    #[test]
    fn garbage_settings_fail_without_panicking() {
        assert!(crypt("pw", "").is_err());
        assert!(crypt("pw", "$9$nope$").is_err());
        assert!(crypt("pw", "$y$").is_err());
    }

    #[test]
    fn digest_suffix_rejects_non_crypt_strings() {
        assert_eq!(digest_suffix("no-dollars-here", Algorithm::Md5), None);
    }
}
