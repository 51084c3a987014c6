//! Magnet URI helpers

use once_cell::sync::Lazy;
use regex::Regex;

static BTIH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)btih:([0-9a-f]{40})").unwrap());

/// Extract the 40-hex info hash from a magnet URI, lowercased.
pub fn info_hash_from_magnet(magnet: &str) -> Option<String> {
    BTIH.captures(magnet)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_and_lowercases() {
        let hash = "ABCDEF0123456789ABCDEF0123456789ABCDEF01";
        let magnet = format!("magnet:?xt=urn:btih:{hash}&dn=Some.Release");
        assert_eq!(
            info_hash_from_magnet(&magnet).unwrap(),
            hash.to_ascii_lowercase()
        );
    }

    #[test]
    fn test_rejects_short_hash() {
        assert_eq!(info_hash_from_magnet("magnet:?xt=urn:btih:abc123"), None);
        assert_eq!(info_hash_from_magnet("not a magnet"), None);
    }
}
