//! Shadow-file parsing: turn one `<user>:<crypt>[:…]` line into a
//! [`CrackJob`].
//!
//! Only the second field is interpreted.  The split rules follow the
//! crypt formats: 3 `$`-fields for MD5/SHA-256/SHA-512, a 4th parameter
//! field for yescrypt, and bcrypt's fused 53-character tail (22-char
//! salt + 31-char digest) with the cost segment folded into the salt so
//! the worker can rebuild the full setting string.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use gridcrack_core::messages::{Algorithm, CrackJob, MAX_HASH_LEN, MAX_SALT_LEN};

/// bcrypt's combined salt+digest tail length.
pub const BCRYPT_TAIL_LEN: usize = 53;
/// Leading salt portion of the bcrypt tail.
pub const BCRYPT_SALT_LEN: usize = 22;

/// Find `user` in the shadow file at `path` and build its crack job.
pub fn parse_shadow(path: &Path, user: &str) -> Result<CrackJob> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot open '{}'", path.display()))?;

    for line in content.lines() {
        let mut fields = line.splitn(3, ':');
        let (Some(name), Some(hash_field)) = (fields.next(), fields.next()) else {
            continue;
        };
        if name != user {
            continue;
        }
        return parse_entry(hash_field)
            .with_context(|| format!("malformed shadow entry for user '{user}'"));
    }

    bail!("user '{}' not found in {}", user, path.display());
}

pub(crate) fn parse_entry(hash_field: &str) -> Result<CrackJob> {
    let Some(body) = hash_field.strip_prefix('$') else {
        bail!("hash field does not start with '$'");
    };

    let mut parts = body.splitn(3, '$');
    let tag = parts.next().unwrap_or_default();
    let param = parts.next().context("missing salt field")?;
    let tail = parts.next().context("missing hash field")?;

    let algorithm =
        Algorithm::from_shadow_tag(tag).with_context(|| format!("unknown algorithm '{tag}'"))?;

    let (salt, target_hash) = match algorithm {
        Algorithm::Bcrypt => {
            // $2b$<cost>$<22-char salt><31-char digest>
            if tail.len() < BCRYPT_TAIL_LEN {
                bail!(
                    "bcrypt tail is {} chars, expected at least {}",
                    tail.len(),
                    BCRYPT_TAIL_LEN
                );
            }
            let (salt22, digest) = tail.split_at(BCRYPT_SALT_LEN);
            (format!("{param}${salt22}"), digest.to_owned())
        }
        Algorithm::Yescrypt => {
            // $y$<params>$<salt>$<digest>
            let (salt, digest) = tail
                .split_once('$')
                .context("yescrypt entry is missing its digest field")?;
            (format!("{param}${salt}"), digest.to_owned())
        }
        _ => (param.to_owned(), tail.to_owned()),
    };

    if salt.len() >= MAX_SALT_LEN {
        bail!("salt is {} bytes, capacity is {}", salt.len(), MAX_SALT_LEN - 1);
    }
    if target_hash.len() >= MAX_HASH_LEN {
        bail!(
            "target hash is {} bytes, capacity is {}",
            target_hash.len(),
            MAX_HASH_LEN - 1
        );
    }

    Ok(CrackJob {
        algorithm,
        salt,
        target_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn md5_entry_splits_into_salt_and_digest() {
        let job = parse_entry("$1$saltsalt$ArNaBmEFAFLTC8X5OJ4cc/").unwrap();
        assert_eq!(job.algorithm, Algorithm::Md5);
        assert_eq!(job.salt, "saltsalt");
        assert_eq!(job.target_hash, "ArNaBmEFAFLTC8X5OJ4cc/");
    }

    #[test]
    fn sha512_entry_keeps_the_raw_salt() {
        let job = parse_entry("$6$mysalt$abcdefABCDEF0123456789").unwrap();
        assert_eq!(job.algorithm, Algorithm::Sha512);
        assert_eq!(job.salt, "mysalt");
        assert_eq!(job.target_hash, "abcdefABCDEF0123456789");
    }

    #[test]
    fn bcrypt_tail_splits_at_22_chars_with_cost_in_the_salt() {
        let salt22 = "abcdefghijklmnopqrstuv";
        let digest31 = "A".repeat(31);
        let job = parse_entry(&format!("$2b$05${salt22}{digest31}")).unwrap();
        assert_eq!(job.algorithm, Algorithm::Bcrypt);
        assert_eq!(job.salt, format!("05${salt22}"));
        assert_eq!(job.target_hash, digest31);
    }

    #[test]
    fn bcrypt_short_tail_is_rejected() {
        assert!(parse_entry("$2b$05$tooshort").is_err());
    }

    #[test]
    fn yescrypt_entry_fuses_params_into_the_salt() {
        let job = parse_entry("$y$j9T$saltsalt$digestdigestdigest").unwrap();
        assert_eq!(job.algorithm, Algorithm::Yescrypt);
        assert_eq!(job.salt, "j9T$saltsalt");
        assert_eq!(job.target_hash, "digestdigestdigest");
    }

    #[test]
    fn yescrypt_without_digest_field_is_rejected() {
        assert!(parse_entry("$y$j9T$saltonly").is_err());
    }

    #[test]
    fn unknown_algorithm_tag_is_rejected() {
        let err = parse_entry("$7$salt$hash").unwrap_err();
        assert!(format!("{err:#}").contains("unknown algorithm"));
    }

    #[test]
    fn oversized_salt_is_rejected() {
        let salt = "s".repeat(MAX_SALT_LEN);
        assert!(parse_entry(&format!("$1${salt}$hash")).is_err());
    }

    #[test]
    fn file_lookup_finds_the_user_and_ignores_trailing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "root:$6$rootsalt$rootdigest:19000:0:99999:7:::").unwrap();
        writeln!(file, "alice:$1$as$alicedigest:19001:0:99999:7:::").unwrap();
        file.flush().unwrap();

        let job = parse_shadow(file.path(), "alice").unwrap();
        assert_eq!(job.algorithm, Algorithm::Md5);
        assert_eq!(job.salt, "as");
        assert_eq!(job.target_hash, "alicedigest");

        let err = parse_shadow(file.path(), "bob").unwrap_err();
        assert!(format!("{err:#}").contains("not found"));
    }
}
