//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs and HMAC secrets.
//! All fixtures are deterministic based on seed values.

use ring::signature::{Ed25519KeyPair, KeyPair};

/// Deterministic Ed25519 keypair for signing test tokens.
///
/// The same seed always produces the same keypair, ensuring test
/// reproducibility.
pub struct TestKeypair {
    /// Raw 32-byte public key.
    pub public_key: Vec<u8>,
    /// PKCS#8 v1 document holding the private key, as `jsonwebtoken`
    /// expects for Ed25519 signing.
    pub pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Build a keypair from a one-byte seed.
    ///
    /// # Panics
    ///
    /// Panics if ring rejects the derived seed, which cannot happen
    /// for a well-formed 32-byte input.
    pub fn from_seed(seed: u8) -> Self {
        let seed_bytes = expand_seed(seed);

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("32-byte seed is always valid for Ed25519");

        Self {
            public_key: key_pair.public_key().as_ref().to_vec(),
            pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }
}

/// Deterministic HMAC secret for a given seed, 32 bytes.
pub fn test_hmac_secret(seed: u8) -> Vec<u8> {
    expand_seed(seed).to_vec()
}

/// Expand a one-byte seed into 32 deterministic bytes.
fn expand_seed(seed: u8) -> [u8; 32] {
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }
    seed_bytes
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility. Production code must use
/// ring::rand::SystemRandom.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // PKCS#8 v1 format for Ed25519 (RFC 5208):
    // SEQUENCE {
    //   version         INTEGER (0),
    //   algorithm       AlgorithmIdentifier,
    //   privateKey      OCTET STRING
    // }
    // Where privateKey for Ed25519 is:
    // OCTET STRING containing OCTET STRING with 32-byte seed

    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE
    pkcs8.push(0x30);
    pkcs8.push(0x05); // Length: 5 bytes
                      // OID for Ed25519: 1.3.101.112
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING
    pkcs8.push(0x04);
    pkcs8.push(0x22); // Length: 34 bytes
                      // Inner OCTET STRING with seed
    pkcs8.push(0x04);
    pkcs8.push(0x20); // Length: 32 bytes
    pkcs8.extend_from_slice(seed);

    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_is_deterministic() {
        let a = TestKeypair::from_seed(1);
        let b = TestKeypair::from_seed(1);
        assert_eq!(a.public_key, b.public_key);
        assert_eq!(a.pkcs8, b.pkcs8);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = TestKeypair::from_seed(1);
        let b = TestKeypair::from_seed(2);
        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn test_public_key_is_32_bytes() {
        assert_eq!(TestKeypair::from_seed(7).public_key.len(), 32);
    }

    #[test]
    fn test_hmac_secret_is_deterministic() {
        assert_eq!(test_hmac_secret(3), test_hmac_secret(3));
        assert_ne!(test_hmac_secret(3), test_hmac_secret(4));
    }
}
