//! World seed parsing.

use std::time::{SystemTime, UNIX_EPOCH};

/// Parses a user-entered seed.
///
/// Accepts a decimal number, a `0x`-prefixed hex number, or any other text,
/// which is hashed. An empty string picks a time-based seed.
pub fn parse_seed(input: &str) -> u64 {
    let input = input.trim();
    if input.is_empty() {
        return random_seed();
    }

    if let Ok(n) = input.parse::<u64>() {
        return n;
    }

    if let Some(hex) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        if let Ok(n) = u64::from_str_radix(hex, 16) {
            return n;
        }
    }

    hash_string(input)
}

/// Time-based seed for worlds created without one.
pub fn random_seed() -> u64 {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_nanos() as u64 ^ (duration.as_secs() << 32)
}

/// djb2 string hash.
fn hash_string(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for c in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u64::from(c));
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_seeds() {
        assert_eq!(parse_seed("12345"), 12345);
        assert_eq!(parse_seed(" 42 "), 42);
        assert_eq!(parse_seed("0xff"), 255);
        assert_eq!(parse_seed("0XDEADBEEF"), 0xDEAD_BEEF);
    }

    #[test]
    fn test_text_seeds_are_hashed() {
        assert_eq!(parse_seed("a"), 5381 * 33 + 97);
        assert_eq!(parse_seed("glacier"), parse_seed("glacier"));
        assert_ne!(parse_seed("glacier"), parse_seed("desert"));
        // Not valid hex, so hashed as text.
        assert_eq!(parse_seed("0xzz"), hash_string("0xzz"));
    }
}
