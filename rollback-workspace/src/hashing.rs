use sha2::{Digest, Sha256};

pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_content(b"Hello, World!");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_content(b"Hello, World!"));
        assert_ne!(hash, hash_content(b"Hello, Rust!"));
    }
}
