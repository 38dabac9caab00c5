//! Media URL deobfuscation for KVS `function/0/` links

use crate::error::KvsError;
use crate::platform::license::{derive_license_token, LicenseToken};
use tracing::debug;

/// Prefix marking a media URL as obfuscated
pub const OBFUSCATION_MARKER: &str = "function/0/";

/// Length of the scrambled part of the hash component
pub const SEGMENT_LEN: usize = 32;

/// Index of the hash component once `function` and `0` are dropped
const HASH_COMPONENT: usize = 5;

/// Check if a media URL needs deobfuscation
pub fn is_obfuscated(url: &str) -> bool {
    url.starts_with(OBFUSCATION_MARKER)
}

/// Undo the positional swap cipher on a 32-character segment.
///
/// The player scrambles positions in ascending order, so the swaps are
/// replayed from the last position down to the first.
pub fn unscramble_segment(segment: &str, token: &LicenseToken) -> Result<String, KvsError> {
    let mut buffer: Vec<char> = segment.chars().collect();
    if buffer.len() != SEGMENT_LEN {
        return Err(KvsError::MalformedUrl(format!(
            "scrambled segment {:?} is {} characters, expected {}",
            segment,
            buffer.len(),
            SEGMENT_LEN
        )));
    }
    if token.len() < SEGMENT_LEN {
        return Err(KvsError::TokenTooShort {
            needed: SEGMENT_LEN,
            available: token.len(),
        });
    }

    for position in (0..SEGMENT_LEN).rev() {
        let partner = (position + token.digit_sum_from(position)) % SEGMENT_LEN;
        buffer.swap(position, partner);
    }

    Ok(buffer.into_iter().collect())
}

/// Turn a `flashvars` media URL into the URL the CDN serves.
///
/// URLs without the obfuscation marker are returned as-is.
pub fn reconstruct_url(raw_url: &str, license_code: &str) -> Result<String, KvsError> {
    if !is_obfuscated(raw_url) {
        return Ok(raw_url.to_string());
    }

    let (path, query) = match raw_url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw_url, None),
    };

    // drop the "function" and "0" components
    let mut components: Vec<String> = path.split('/').skip(2).map(str::to_string).collect();
    if components.len() <= HASH_COMPONENT {
        return Err(KvsError::MalformedUrl(format!(
            "expected at least {} path components in {:?}, found {}",
            HASH_COMPONENT + 1,
            raw_url,
            components.len()
        )));
    }

    let hash = &components[HASH_COMPONENT];
    let scrambled: String = hash.chars().take(SEGMENT_LEN).collect();
    let rest: String = hash.chars().skip(SEGMENT_LEN).collect();

    let token = derive_license_token(license_code)?;
    let plain = unscramble_segment(&scrambled, &token)?;
    debug!("Unscrambled media hash {} -> {}", scrambled, plain);

    components[HASH_COMPONENT] = plain + &rest;
    let mut real_url = components.join("/");
    if let Some(query) = query {
        real_url.push('?');
        real_url.push_str(query);
    }

    Ok(real_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LICENSE: &str = "$603368314383937";
    const PLAIN_HASH: &str = "7a35a1d2e4f6b8c0d9e7f5a3b1c2d4e6";
    const SCRAMBLED_HASH: &str = "39ae6b1d73dec70d8212fb5face564a4";

    // what the player does before publishing the URL
    fn scramble_segment(segment: &str, token: &LicenseToken) -> String {
        let mut buffer: Vec<char> = segment.chars().collect();
        for position in 0..SEGMENT_LEN {
            let partner = (position + token.digit_sum_from(position)) % SEGMENT_LEN;
            buffer.swap(position, partner);
        }
        buffer.into_iter().collect()
    }

    #[test]
    fn test_unscramble_known_segment() {
        let token = derive_license_token(LICENSE).unwrap();
        assert_eq!(
            unscramble_segment(SCRAMBLED_HASH, &token).unwrap(),
            PLAIN_HASH
        );
    }

    #[test]
    fn test_unscramble_second_fixture() {
        let token = derive_license_token("$518714213521396").unwrap();
        assert_eq!(
            unscramble_segment("b0847fd17e5926a3a1bc4560cd293fe8", &token).unwrap(),
            "0f1e2d3c4b5a69788796a5b4c3d2e1f0"
        );
    }

    #[test]
    fn test_round_trip_with_forward_cipher() {
        let token = derive_license_token(LICENSE).unwrap();
        let plain = "0123456789abcdefghijklmnopqrstuv";
        let scrambled = scramble_segment(plain, &token);
        assert_ne!(scrambled, plain);
        assert_eq!(unscramble_segment(&scrambled, &token).unwrap(), plain);
    }

    #[test]
    fn test_ascending_order_gives_wrong_result() {
        let token = derive_license_token(LICENSE).unwrap();
        let wrong = scramble_segment(SCRAMBLED_HASH, &token);
        assert_eq!(wrong, "a2914ab82f6703d175cddcbf5eaee364");
        assert_ne!(wrong, PLAIN_HASH);
    }

    #[test]
    fn test_unscramble_is_deterministic() {
        let token = derive_license_token(LICENSE).unwrap();
        let first = unscramble_segment(SCRAMBLED_HASH, &token).unwrap();
        let second = unscramble_segment(SCRAMBLED_HASH, &token).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unscramble_rejects_wrong_length() {
        let token = derive_license_token(LICENSE).unwrap();
        assert!(matches!(
            unscramble_segment("abc", &token),
            Err(KvsError::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_unscramble_rejects_short_token() {
        // 12 digits -> center 6 -> 28 token digits
        let token = derive_license_token("123456789123").unwrap();
        assert_eq!(token.len(), 28);
        assert!(matches!(
            unscramble_segment(SCRAMBLED_HASH, &token),
            Err(KvsError::TokenTooShort {
                needed: 32,
                available: 28
            })
        ));
    }

    #[test]
    fn test_reconstruct_obfuscated_url() {
        let raw = format!(
            "function/0/https://thisvid.com/get_file/7/{}/3533000/3533241/3533241.mp4/?rnd=1700000000000",
            SCRAMBLED_HASH
        );
        assert_eq!(
            reconstruct_url(&raw, LICENSE).unwrap(),
            format!(
                "https://thisvid.com/get_file/7/{}/3533000/3533241/3533241.mp4/?rnd=1700000000000",
                PLAIN_HASH
            )
        );
    }

    #[test]
    fn test_reconstruct_keeps_hash_suffix() {
        let raw = format!(
            "function/0/https://thisvid.com/get_file/7/{}xyz/3533000/3533241/3533241.mp4/",
            SCRAMBLED_HASH
        );
        assert_eq!(
            reconstruct_url(&raw, LICENSE).unwrap(),
            format!(
                "https://thisvid.com/get_file/7/{}xyz/3533000/3533241/3533241.mp4/",
                PLAIN_HASH
            )
        );
    }

    #[test]
    fn test_reconstruct_passes_through_plain_urls() {
        let urls = [
            "https://thisvid.com/get_file/7/7a35a1d2e4f6b8c0d9e7f5a3b1c2d4e6/3533000/3533241/3533241.mp4/",
            "https://example.com/video.mp4?x=1",
            "",
        ];
        for url in urls {
            assert_eq!(reconstruct_url(url, "").unwrap(), url);
            assert_eq!(reconstruct_url(url, LICENSE).unwrap(), url);
        }
    }

    #[test]
    fn test_reconstruct_too_few_components() {
        assert!(matches!(
            reconstruct_url("function/0/https://thisvid.com/get_file/7", LICENSE),
            Err(KvsError::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_reconstruct_short_hash_component() {
        assert!(matches!(
            reconstruct_url(
                "function/0/https://thisvid.com/get_file/7/abcdef/3533000/",
                LICENSE
            ),
            Err(KvsError::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_reconstruct_propagates_license_errors() {
        let raw = format!(
            "function/0/https://thisvid.com/get_file/7/{}/3533000/3533241/3533241.mp4/",
            SCRAMBLED_HASH
        );
        assert!(matches!(
            reconstruct_url(&raw, ""),
            Err(KvsError::MalformedLicense(_))
        ));
    }
}
