//! Time-based one-time passwords (RFC 6238, HMAC-SHA1, six digits).
//!
//! Secrets travel as unpadded RFC 4648 base32 so authenticator apps can import
//! them directly.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha1::Sha1;

use crate::errors::{LarderError, Result};

const STEP_SECONDS: i64 = 30;
const DIGITS: u32 = 6;
const SECRET_BYTES: usize = 20;
/// Accepted clock drift, in steps, either side of now.
const WINDOW: i64 = 1;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Fresh random secret, base32 encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base32_encode(&bytes)
}

/// Code for `secret` at `at`.
pub fn code_at(secret: &str, at: DateTime<Utc>) -> Result<String> {
    let key = base32_decode(secret)?;
    code_for_counter(&key, counter(at))
}

/// Whether `token` is valid for `secret` within the drift window around `now`.
pub fn verify(secret: &str, token: &str, now: DateTime<Utc>) -> Result<bool> {
    let token = token.trim();
    if token.len() != DIGITS as usize || !token.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }

    let key = base32_decode(secret)?;
    let current = counter(now);
    for offset in -WINDOW..=WINDOW {
        let step = current + offset;
        if step < 0 {
            continue;
        }
        if code_for_counter(&key, step)? == token {
            return Ok(true);
        }
    }
    Ok(false)
}

fn counter(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(STEP_SECONDS)
}

fn code_for_counter(key: &[u8], counter: i64) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|err| LarderError::internal(format!("Invalid TOTP key: {}", err)))?;
    mac.update(&(counter as u64).to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Ok(format!("{:0width$}", binary % 10u32.pow(DIGITS), width = DIGITS as usize))
}

pub fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

pub fn base32_decode(encoded: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in encoded.chars().filter(|c| *c != '=' && !c.is_whitespace()) {
        let upper = c.to_ascii_uppercase() as u8;
        let value = ALPHABET
            .iter()
            .position(|&a| a == upper)
            .ok_or_else(|| LarderError::validation("two factor secret is not valid base32"))?;
        buffer = (buffer << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // RFC 6238 appendix B seed, "12345678901234567890".
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn matches_rfc_vectors() {
        let at = Utc.timestamp_opt(59, 0).unwrap();
        assert_eq!(code_at(RFC_SECRET, at).unwrap(), "287082");

        let at = Utc.timestamp_opt(1_111_111_109, 0).unwrap();
        assert_eq!(code_at(RFC_SECRET, at).unwrap(), "081804");

        let at = Utc.timestamp_opt(2_000_000_000, 0).unwrap();
        assert_eq!(code_at(RFC_SECRET, at).unwrap(), "279037");
    }

    #[test]
    fn accepts_one_step_of_drift() {
        let issued = Utc.timestamp_opt(59, 0).unwrap();
        assert!(verify(RFC_SECRET, "287082", issued + chrono::Duration::seconds(30)).unwrap());
        assert!(verify(RFC_SECRET, " 287082 ", issued - chrono::Duration::seconds(30)).unwrap());
        assert!(!verify(RFC_SECRET, "287082", issued + chrono::Duration::seconds(90)).unwrap());
        assert!(!verify(RFC_SECRET, "28708", issued).unwrap());
        assert!(!verify(RFC_SECRET, "abcdef", issued).unwrap());
    }

    #[test]
    fn base32_round_trips() {
        let bytes = b"12345678901234567890";
        assert_eq!(base32_encode(bytes), RFC_SECRET);
        assert_eq!(base32_decode(RFC_SECRET).unwrap(), bytes.to_vec());
        assert_eq!(generate_secret().len(), 32);
        assert!(base32_decode("not base32!").is_err());
    }
}
