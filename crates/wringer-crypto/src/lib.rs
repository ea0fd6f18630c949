//! Record protection transforms for the Wringer protocol family.
//!
//! One record's payload passes through a fixed pipeline on its way to the
//! wire — compress, MAC, pad, encrypt — and through the exact inverse on
//! the way back. This crate owns that pipeline and the pieces it is built
//! from: per-direction stateful compression, record MACs, record ciphers,
//! padding schemes, and the HKDF key block that feeds them.
//!
//! Everything here is deliberately tolerant on the receive path: malformed
//! padding, truncated ciphertexts, and lying lengths fail with structured
//! [`CryptoError`]s that invalidate one record, never the process. The
//! cryptographic primitives themselves come from the ecosystem; this crate
//! only sequences them.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod compress;
pub mod error;
pub mod mac;
pub mod pipeline;
pub mod schedule;

pub use cipher::{AeadCipher, PaddingScheme, RecordCipher, unpad};
pub use compress::{Compressor, Decompressor, effective_method};
pub use error::{CryptoError, Result};
pub use mac::RecordMac;
pub use pipeline::{Protected, RecordTransform, TransformSuite, Unprotected};
pub use schedule::{DirectionKeys, KeyBlock, SessionSecrets};
