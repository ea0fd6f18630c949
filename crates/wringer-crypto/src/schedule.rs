//! Key-block derivation for record protection.
//!
//! One HKDF expansion turns the session secrets into per-direction MAC
//! keys, cipher keys, and IVs, sliced in a fixed order so both peers agree
//! on the layout: client MAC, server MAC, client key, server key, client
//! IV, server IV.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use wringer_proto::{CipherKind, MacAlgorithm};

use crate::cipher::{AEAD_IV_LEN, AEAD_KEY_LEN};
use crate::error::{CryptoError, Result};

const KEY_EXPANSION_LABEL: &[u8] = b"wringer key expansion";

/// Session secrets the key block is derived from.
///
/// In a real exchange these come out of the handshake; the harness
/// generates them directly.
#[derive(Clone)]
pub struct SessionSecrets {
    /// Shared master secret
    pub master_secret: [u8; 48],
    /// Client-contributed randomness
    pub client_random: [u8; 32],
    /// Server-contributed randomness
    pub server_random: [u8; 32],
}

impl SessionSecrets {
    /// Generate fresh random secrets.
    #[must_use]
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut master_secret = [0u8; 48];
        let mut client_random = [0u8; 32];
        let mut server_random = [0u8; 32];
        rng.fill_bytes(&mut master_secret);
        rng.fill_bytes(&mut client_random);
        rng.fill_bytes(&mut server_random);
        Self { master_secret, client_random, server_random }
    }
}

impl std::fmt::Debug for SessionSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets stay out of logs
        f.debug_struct("SessionSecrets").finish_non_exhaustive()
    }
}

/// Key material for one direction.
#[derive(Clone)]
pub struct DirectionKeys {
    /// Record MAC key
    pub mac_key: Vec<u8>,
    /// Record cipher key
    pub cipher_key: Vec<u8>,
    /// Static per-direction IV
    pub iv: Vec<u8>,
}

impl std::fmt::Debug for DirectionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectionKeys").finish_non_exhaustive()
    }
}

/// Both directions' key material.
#[derive(Debug, Clone)]
pub struct KeyBlock {
    /// Keys protecting client-to-server records
    pub client: DirectionKeys,
    /// Keys protecting server-to-client records
    pub server: DirectionKeys,
}

impl KeyBlock {
    /// Derive the key block for the negotiated algorithms.
    pub fn derive(
        secrets: &SessionSecrets,
        mac: MacAlgorithm,
        cipher: CipherKind,
    ) -> Result<Self> {
        let mac_len = mac.tag_len();
        let (key_len, iv_len) = match cipher {
            CipherKind::Null => (0, 0),
            CipherKind::ChaCha20Poly1305 => (AEAD_KEY_LEN, AEAD_IV_LEN),
        };

        let mut salt = Vec::with_capacity(64);
        salt.extend_from_slice(&secrets.client_random);
        salt.extend_from_slice(&secrets.server_random);

        let hkdf = Hkdf::<Sha256>::new(Some(&salt), &secrets.master_secret);
        let mut block = vec![0u8; 2 * (mac_len + key_len + iv_len)];
        hkdf.expand(KEY_EXPANSION_LABEL, &mut block)
            .map_err(|e| CryptoError::KeyMaterial(e.to_string()))?;

        let mut offset = 0usize;
        let mut take = |len: usize| {
            let slice = block[offset..offset + len].to_vec();
            offset += len;
            slice
        };

        let client_mac = take(mac_len);
        let server_mac = take(mac_len);
        let client_key = take(key_len);
        let server_key = take(key_len);
        let client_iv = take(iv_len);
        let server_iv = take(iv_len);

        Ok(Self {
            client: DirectionKeys { mac_key: client_mac, cipher_key: client_key, iv: client_iv },
            server: DirectionKeys { mac_key: server_mac, cipher_key: server_key, iv: server_iv },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_secrets() -> SessionSecrets {
        SessionSecrets {
            master_secret: [0x11; 48],
            client_random: [0x22; 32],
            server_random: [0x33; 32],
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = KeyBlock::derive(
            &fixed_secrets(),
            MacAlgorithm::HmacSha256,
            CipherKind::ChaCha20Poly1305,
        )
        .unwrap();
        let b = KeyBlock::derive(
            &fixed_secrets(),
            MacAlgorithm::HmacSha256,
            CipherKind::ChaCha20Poly1305,
        )
        .unwrap();
        assert_eq!(a.client.mac_key, b.client.mac_key);
        assert_eq!(a.server.cipher_key, b.server.cipher_key);
    }

    #[test]
    fn directions_get_distinct_keys() {
        let block = KeyBlock::derive(
            &fixed_secrets(),
            MacAlgorithm::HmacSha256,
            CipherKind::ChaCha20Poly1305,
        )
        .unwrap();
        assert_ne!(block.client.mac_key, block.server.mac_key);
        assert_ne!(block.client.cipher_key, block.server.cipher_key);
        assert_ne!(block.client.iv, block.server.iv);
    }

    #[test]
    fn lengths_match_algorithms() {
        let block =
            KeyBlock::derive(&fixed_secrets(), MacAlgorithm::HmacSha384, CipherKind::Null).unwrap();
        assert_eq!(block.client.mac_key.len(), 48);
        assert!(block.client.cipher_key.is_empty());
        assert!(block.client.iv.is_empty());
    }

    #[test]
    fn random_secrets_differ() {
        let a = SessionSecrets::random();
        let b = SessionSecrets::random();
        assert_ne!(a.master_secret, b.master_secret);
    }
}
