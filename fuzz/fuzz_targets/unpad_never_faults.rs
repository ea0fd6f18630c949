//! Fuzzer for defensive unpadding.
//!
//! Whatever the decrypted block looks like, unpadding must return either
//! content or a structured crypto error — never an index fault.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wringer_crypto::unpad;

fuzz_target!(|data: &[u8]| {
    if let Ok((content, padding, padding_length)) = unpad(data) {
        assert_eq!(padding.len(), usize::from(padding_length));
        assert_eq!(content.len() + padding.len() + 1, data.len());
    }
});
