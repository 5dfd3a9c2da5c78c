//! Session id minting (client) and validation (server).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

use crate::constants::{MIN_SESSION_ID_LENGTH, SESSION_ID_RANDOM_BYTES};

/// Mint a fresh session id: `SESSION_ID_RANDOM_BYTES` random bytes, base64
/// encoded without padding, so it survives unmodified in an HTTP header.
pub fn generate() -> String {
    let mut bytes = [0u8; SESSION_ID_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Server-side policy: reject session ids shorter than the minimum length.
/// Otherwise the id is uninterpreted.
pub fn is_valid(id: &str) -> bool {
    id.len() >= MIN_SESSION_ID_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let a = generate();
        let b = generate();
        assert!(is_valid(&a));
        assert!(is_valid(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn short_ids_are_rejected() {
        assert!(!is_valid("short"));
        assert!(!is_valid(""));
        assert!(is_valid("AAAAAAAA"));
    }
}
