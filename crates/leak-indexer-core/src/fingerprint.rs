//! Deterministic identity digests.
//!
//! Fingerprints identify records for deduplication only; they carry no
//! security meaning. Every call builds a fresh SHA-256 hasher, so two
//! fingerprints never share state. Fields are separated by a NUL byte so
//! that `("ab", "c")` and `("a", "bc")` produce different digests.

use sha2::{Digest, Sha256};

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Identity of a leak file: which file, not what it contains.
pub fn leak_file(parent: &str, folder: &str, filename: &str) -> String {
    digest(&[parent, folder, filename])
}

/// Identity of a credential pair; the dedup key across all files.
pub fn credential(email: &str, password: &str) -> String {
    digest(&[email, password])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_fingerprint_is_stable() {
        assert_eq!(credential("a@x.com", "pw1"), credential("a@x.com", "pw1"));
        assert_eq!(credential("a@x.com", "pw1").len(), 64);
    }

    #[test]
    fn repeated_calls_do_not_accumulate() {
        let first = credential("a@x.com", "pw1");
        let _ = credential("b@y.com", "pw2");
        assert_eq!(credential("a@x.com", "pw1"), first);
    }

    #[test]
    fn field_boundaries_matter() {
        assert_ne!(credential("ab", "c"), credential("a", "bc"));
        assert_ne!(leak_file("c", "ab", "f"), leak_file("ca", "b", "f"));
    }

    #[test]
    fn leak_fingerprint_distinguishes_path_components() {
        let a = leak_file("Collection 1", "dump-a", "part1.txt");
        let b = leak_file("Collection 1", "dump-b", "part1.txt");
        assert_ne!(a, b);
    }
}
