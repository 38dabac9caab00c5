//! License token derivation for obfuscated KVS media URLs

use crate::error::KvsError;
use std::fmt;

/// Decimal digit string used as the key of the segment cipher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseToken(String);

impl LicenseToken {
    /// Token digits
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digits in the token
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if token has no digits
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of the digits from `start` to the end of the token
    pub fn digit_sum_from(&self, start: usize) -> usize {
        self.0
            .bytes()
            .skip(start)
            .map(|b| usize::from(b - b'0'))
            .sum()
    }
}

impl fmt::Display for LicenseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cipher key from a `license_code` value.
///
/// The numeric halves come from the sanitized code (`$` dropped, `0` mapped
/// to `1`) while the emitted digits index the original code. Both must stay
/// that way to match what the player does.
pub fn derive_license_token(license_code: &str) -> Result<LicenseToken, KvsError> {
    if license_code.is_empty() {
        return Err(KvsError::MalformedLicense("empty license code".to_string()));
    }

    let normalized: Vec<u8> = license_code
        .bytes()
        .filter(|&b| b != b'$')
        .map(|b| if b == b'0' { b'1' } else { b })
        .collect();
    if normalized.is_empty() {
        return Err(KvsError::MalformedLicense(format!(
            "no digits in license code {:?}",
            license_code
        )));
    }

    let center = normalized.len() / 2;
    let front = parse_half(&normalized[..=center], license_code)?;
    let back = parse_half(&normalized[center..], license_code)?;
    let diff = front.abs_diff(back).checked_mul(4).ok_or_else(|| {
        KvsError::MalformedLicense(format!("license code {:?} overflows", license_code))
    })?;
    let diff_digits = diff.to_string().into_bytes();

    let original = license_code.as_bytes();
    let mut token = String::with_capacity((center + 1) * 4);
    for offset in 0..=center {
        let shift = digit_at(&diff_digits, offset, license_code)?;
        for inner in 1..=4 {
            let digit = digit_at(original, offset + inner, license_code)?;
            token.push(char::from(b'0' + (digit + shift) % 10));
        }
    }

    Ok(LicenseToken(token))
}

fn parse_half(digits: &[u8], license_code: &str) -> Result<u128, KvsError> {
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(KvsError::MalformedLicense(format!(
            "non-digit characters in license code {:?}",
            license_code
        )));
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u128>().ok())
        .ok_or_else(|| {
            KvsError::MalformedLicense(format!("license code {:?} overflows", license_code))
        })
}

fn digit_at(digits: &[u8], index: usize, license_code: &str) -> Result<u8, KvsError> {
    match digits.get(index) {
        Some(b) if b.is_ascii_digit() => Ok(b - b'0'),
        Some(b) => Err(KvsError::MalformedLicense(format!(
            "unexpected {:?} at position {} of license code {:?}",
            char::from(*b),
            index,
            license_code
        ))),
        None => Err(KvsError::MalformedLicense(format!(
            "license code {:?} too short for position {}",
            license_code, index
        ))),
    }
}
