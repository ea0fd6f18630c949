//! Record ciphers and padding schemes.
//!
//! Two ciphers cover the dialect family's needs: the null cipher (identity,
//! the state every connection starts in) and an AEAD cipher with a
//! per-record nonce derived from the sequence number. Padding is a separate
//! concern: the null cipher honors an explicitly configured scheme so
//! malformed-padding records can be crafted and observed, while the AEAD
//! cipher never pads.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use wringer_proto::CipherKind;

use crate::error::{CryptoError, Result};

/// AEAD key length in bytes.
pub const AEAD_KEY_LEN: usize = 32;
/// AEAD nonce length in bytes.
pub const AEAD_IV_LEN: usize = 12;
/// AEAD tag length in bytes.
pub const AEAD_TAG_LEN: usize = 16;

/// Per-direction record cipher.
pub enum RecordCipher {
    /// Identity transform
    Null,
    /// AEAD with per-record nonce = IV XOR sequence
    Aead(AeadCipher),
}

impl RecordCipher {
    /// Build a cipher for the negotiated kind.
    pub fn new(kind: CipherKind, key: &[u8], iv: &[u8]) -> Result<Self> {
        match kind {
            CipherKind::Null => Ok(Self::Null),
            CipherKind::ChaCha20Poly1305 => Ok(Self::Aead(AeadCipher::new(key, iv)?)),
        }
    }

    /// Whether padding applies under this cipher.
    #[must_use]
    pub fn supports_padding(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Encrypt one assembled record block.
    pub fn encrypt(&self, scoped_sequence: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Null => Ok(plaintext.to_vec()),
            Self::Aead(aead) => aead.encrypt(scoped_sequence, plaintext),
        }
    }

    /// Decrypt one record payload.
    pub fn decrypt(&self, scoped_sequence: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Null => Ok(ciphertext.to_vec()),
            Self::Aead(aead) => aead.decrypt(scoped_sequence, ciphertext),
        }
    }
}

impl std::fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("RecordCipher::Null"),
            Self::Aead(_) => f.write_str("RecordCipher::Aead"),
        }
    }
}

/// AEAD record cipher state: key plus the static per-direction IV.
pub struct AeadCipher {
    key: [u8; AEAD_KEY_LEN],
    iv: [u8; AEAD_IV_LEN],
}

impl AeadCipher {
    /// Build from raw key material.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let key: [u8; AEAD_KEY_LEN] = key
            .try_into()
            .map_err(|_| CryptoError::KeyMaterial(format!("AEAD key must be {AEAD_KEY_LEN} bytes, got {}", key.len())))?;
        let iv: [u8; AEAD_IV_LEN] = iv
            .try_into()
            .map_err(|_| CryptoError::KeyMaterial(format!("AEAD IV must be {AEAD_IV_LEN} bytes, got {}", iv.len())))?;
        Ok(Self { key, iv })
    }

    /// Per-record nonce: the static IV with the sequence number XORed into
    /// the trailing eight bytes.
    #[must_use]
    pub fn nonce_for(&self, scoped_sequence: u64) -> [u8; AEAD_IV_LEN] {
        let mut nonce = self.iv;
        for (slot, byte) in nonce[4..].iter_mut().zip(scoped_sequence.to_be_bytes()) {
            *slot ^= byte;
        }
        nonce
    }

    /// Encrypt, appending the 16-byte tag.
    pub fn encrypt(&self, scoped_sequence: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| CryptoError::KeyMaterial(e.to_string()))?;
        let nonce = self.nonce_for(scoped_sequence);
        cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptFailed)
    }

    /// Decrypt and verify the trailing tag.
    pub fn decrypt(&self, scoped_sequence: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| CryptoError::KeyMaterial(e.to_string()))?;
        let nonce = self.nonce_for(scoped_sequence);
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptFailed)
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs
        f.debug_struct("AeadCipher").finish_non_exhaustive()
    }
}

/// Padding applied to the assembled block before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingScheme {
    /// No padding
    None,
    /// Pad so the block (including the trailing length byte) is a multiple
    /// of the given block size; every padding byte equals the length byte.
    BlockAlign(u8),
}

impl PaddingScheme {
    /// Padding bytes and the padding-length byte for a block of
    /// `assembled_len` bytes, or `None` when the scheme adds nothing.
    #[must_use]
    pub fn pad_for(&self, assembled_len: usize) -> Option<(Vec<u8>, u8)> {
        match self {
            Self::None => None,
            Self::BlockAlign(block) => {
                let block = usize::from(*block).max(1);
                let overshoot = (assembled_len + 1) % block;
                let padding_length = ((block - overshoot) % block) as u8;
                Some((vec![padding_length; usize::from(padding_length)], padding_length))
            },
        }
    }
}

/// Strip padding from a decrypted block.
///
/// Defensive by construction: an empty plaintext, a padding length that
/// does not fit, or inconsistent padding bytes each fail with a distinct
/// [`CryptoError`] instead of reading out of bounds.
pub fn unpad(plaintext: &[u8]) -> Result<(&[u8], &[u8], u8)> {
    let (&padding_length, rest) = plaintext.split_last().ok_or(CryptoError::EmptyPlaintext)?;

    let claimed = usize::from(padding_length);
    if claimed > rest.len() {
        return Err(CryptoError::BadPadding { claimed, available: rest.len() });
    }

    let (content, padding) = rest.split_at(rest.len() - claimed);
    if padding.iter().any(|&b| b != padding_length) {
        return Err(CryptoError::PaddingContent);
    }

    Ok((content, padding, padding_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aead() -> AeadCipher {
        AeadCipher::new(&[7u8; AEAD_KEY_LEN], &[3u8; AEAD_IV_LEN]).unwrap()
    }

    #[test]
    fn aead_round_trip() {
        let cipher = aead();
        let ciphertext = cipher.encrypt(5, b"payload").unwrap();
        assert_eq!(ciphertext.len(), 7 + AEAD_TAG_LEN);
        assert_eq!(cipher.decrypt(5, &ciphertext).unwrap(), b"payload");
    }

    #[test]
    fn wrong_sequence_fails_decrypt() {
        let cipher = aead();
        let ciphertext = cipher.encrypt(5, b"payload").unwrap();
        assert_eq!(cipher.decrypt(6, &ciphertext), Err(CryptoError::DecryptFailed));
    }

    #[test]
    fn nonce_differs_per_sequence() {
        let cipher = aead();
        assert_ne!(cipher.nonce_for(0), cipher.nonce_for(1));
        assert_eq!(cipher.nonce_for(9), cipher.nonce_for(9));
    }

    #[test]
    fn bad_key_material_rejected() {
        assert!(matches!(
            AeadCipher::new(&[0u8; 16], &[0u8; AEAD_IV_LEN]),
            Err(CryptoError::KeyMaterial(_))
        ));
    }

    #[test]
    fn block_align_pads_to_multiple() {
        let scheme = PaddingScheme::BlockAlign(16);
        let (padding, len) = scheme.pad_for(10).unwrap();
        assert_eq!(usize::from(len), padding.len());
        assert_eq!((10 + padding.len() + 1) % 16, 0);
        assert!(padding.iter().all(|&b| b == len));
    }

    #[test]
    fn already_aligned_block_gets_zero_padding() {
        let scheme = PaddingScheme::BlockAlign(8);
        let (padding, len) = scheme.pad_for(7).unwrap();
        assert_eq!(len, 0);
        assert!(padding.is_empty());
    }

    #[test]
    fn unpad_round_trip() {
        let scheme = PaddingScheme::BlockAlign(16);
        let content = b"0123456789".to_vec();
        let (padding, len) = scheme.pad_for(content.len()).unwrap();

        let mut block = content.clone();
        block.extend_from_slice(&padding);
        block.push(len);

        let (recovered, pad, plen) = unpad(&block).unwrap();
        assert_eq!(recovered, content.as_slice());
        assert_eq!(pad, padding.as_slice());
        assert_eq!(plen, len);
    }

    #[test]
    fn unpad_empty_plaintext() {
        assert_eq!(unpad(&[]), Err(CryptoError::EmptyPlaintext));
    }

    #[test]
    fn unpad_claimed_length_too_large() {
        // Last byte claims 200 padding bytes, only 2 precede it
        assert_eq!(unpad(&[0xAA, 0xBB, 200]), Err(CryptoError::BadPadding { claimed: 200, available: 2 }));
    }

    #[test]
    fn unpad_inconsistent_padding_bytes() {
        // Claims 2 padding bytes but they disagree with the length byte
        assert_eq!(unpad(&[0x01, 0x05, 0x02, 0x02]), Err(CryptoError::PaddingContent));
    }
}
