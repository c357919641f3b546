//! Utility functions and helpers
//!
//! Hashing, signatures, address encoding and the bincode layer shared by
//! the rest of the crate.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign,
    ecdsa_p256_sha256_verify, new_key_pair, public_key_from_pkcs8, ripemd160_digest,
    sha256_digest,
};

pub use serialization::{deserialize, serialize};
