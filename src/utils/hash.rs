//! Content hashing for cache-busted artifact names.

/// Compute a 16-char blake3 content key for binary artifacts.
pub fn content_key(data: &[u8]) -> String {
    let digest = blake3::hash(data);
    hex::encode(&digest.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_key_is_hex() {
        let key = content_key(b"\x00asm");
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn content_key_is_stable() {
        assert_eq!(content_key(b"\x00asm"), content_key(b"\x00asm"));
        assert_ne!(content_key(b"\x00asm"), content_key(b"\x00asM"));
    }
}
