use ring::digest::{digest, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED,
    ECDSA_P256_SHA256_FIXED_SIGNING,
};
use ripemd::{Digest as RipemdDigest, Ripemd160};

use crate::error::{LedgerError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used for block timestamps
pub fn current_timestamp() -> Result<i64> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LedgerError::Crypto(format!("System time error: {e}")))?
        .as_millis();
    i64::try_from(millis).map_err(|_| LedgerError::Crypto("Timestamp overflow".to_string()))
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    digest(&SHA256, data).as_ref().to_vec()
}

pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| LedgerError::InvalidAddress(format!("Invalid base58 encoding: {e}")))
}

fn key_pair_from_pkcs8(pkcs8: &[u8], rng: &SystemRandom) -> Result<EcdsaKeyPair> {
    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, rng)
        .map_err(|e| LedgerError::Crypto(format!("Failed to load PKCS8 key pair: {e}")))
}

/// Generate a fresh P-256 key pair, returned as PKCS#8 document bytes
pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| LedgerError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?;
    Ok(document.as_ref().to_vec())
}

/// Uncompressed SEC1 public key for a PKCS#8 private key
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = key_pair_from_pkcs8(pkcs8, &rng)?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

pub fn ecdsa_p256_sha256_sign(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = key_pair_from_pkcs8(pkcs8, &rng)?;
    let signature = key_pair
        .sign(&rng, message)
        .map_err(|e| LedgerError::Crypto(format!("Failed to sign message: {e}")))?;
    Ok(signature.as_ref().to_vec())
}

pub fn ecdsa_p256_sha256_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key)
        .verify(message, signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_encoding::HEXLOWER;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            HEXLOWER.encode(&sha256_digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_ripemd160_length() {
        assert_eq!(ripemd160_digest(b"abc").len(), 20);
    }

    #[test]
    fn test_sign_then_verify() {
        let pkcs8 = new_key_pair().unwrap();
        let public_key = public_key_from_pkcs8(&pkcs8).unwrap();
        let signature = ecdsa_p256_sha256_sign(&pkcs8, b"ledger").unwrap();

        assert!(ecdsa_p256_sha256_verify(&public_key, &signature, b"ledger"));
        assert!(!ecdsa_p256_sha256_verify(&public_key, &signature, b"ledgers"));
    }

    #[test]
    fn test_base58_round_trip_and_rejects_bad_alphabet() {
        let encoded = base58_encode(&[0, 1, 2, 255]);
        assert_eq!(base58_decode(&encoded).unwrap(), vec![0, 1, 2, 255]);
        assert!(base58_decode("0OIl").is_err());
    }
}
