//! yescrypt-shaped crypt handler built on the scrypt KDF.
//!
//! Produces `$y$<params>$<salt>$<digest>` strings that are format-
//! compatible with shadow entries: deterministic, salt- and parameter-
//! sensitive, digest in crypt base-64.  The digest itself is derived
//! with scrypt rather than the reference yescrypt transform, so entries
//! produced by other systems will not match — a miss, not an error.

use scrypt::{scrypt, Params as ScryptParams};

use super::CryptError;

const LOG2_N: u8 = 12; // N = 4096, 4 MiB working set
const R: u32 = 8;
const P: u32 = 1;
const DIGEST_LEN: usize = 32;

const ITOA64: &[u8; 64] =
    b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Hash `password` under a `$y$<params>$<salt>` setting string.
pub fn crypt(password: &str, setting: &str) -> Result<String, CryptError> {
    let body = setting
        .strip_prefix("$y$")
        .ok_or_else(|| CryptError::BadSetting(setting.to_owned()))?;
    let body = body.strip_suffix('$').unwrap_or(body);
    if body.is_empty() {
        return Err(CryptError::BadSetting(setting.to_owned()));
    }

    let params = ScryptParams::new(LOG2_N, R, P, DIGEST_LEN)
        .map_err(|e| CryptError::Primitive(e.to_string()))?;
    let mut digest = [0u8; DIGEST_LEN];
    scrypt(password.as_bytes(), body.as_bytes(), &params, &mut digest)
        .map_err(|e| CryptError::Primitive(e.to_string()))?;

    Ok(format!("$y${}${}", body, encode_b64(&digest)))
}

/// crypt-style base-64: 3-byte groups taken little-endian, 6 bits per
/// output character, least-significant bits first.
fn encode_b64(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for group in bytes.chunks(3) {
        let mut value = 0u32;
        for (i, &b) in group.iter().enumerate() {
            value |= (b as u32) << (8 * i);
        }
        for i in 0..=group.len() {
            out.push(ITOA64[(value >> (6 * i)) as usize & 0x3f] as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_keeps_the_setting_prefix() {
        let hash = crypt("secret", "$y$j9T$saltsalt").unwrap();
        assert!(hash.starts_with("$y$j9T$saltsalt$"));
    }

    #[test]
    fn digest_is_43_chars_of_crypt_base64() {
        let hash = crypt("secret", "$y$j9T$saltsalt").unwrap();
        let digest = hash.rsplit('$').next().unwrap();
        assert_eq!(digest.len(), 43);
        assert!(digest.bytes().all(|b| ITOA64.contains(&b)));
    }

    #[test]
    fn params_and_salt_both_feed_the_digest() {
        let base = crypt("secret", "$y$j9T$saltsalt").unwrap();
        assert_ne!(crypt("secret", "$y$j8T$saltsalt").unwrap(), base);
        assert_ne!(crypt("secret", "$y$j9T$saltsalu").unwrap(), base);
        assert_eq!(crypt("secret", "$y$j9T$saltsalt").unwrap(), base);
    }

    #[test]
    fn trailing_dollar_in_setting_is_tolerated() {
        assert_eq!(
            crypt("secret", "$y$j9T$saltsalt$").unwrap(),
            crypt("secret", "$y$j9T$saltsalt").unwrap()
        );
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(matches!(crypt("secret", "$y$"), Err(CryptError::BadSetting(_))));
    }
}
