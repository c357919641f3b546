use crate::error::{LedgerError, Result};
use crate::utils::{
    base58_decode, base58_encode, new_key_pair, public_key_from_pkcs8, ripemd160_digest,
    sha256_digest,
};
use serde::{Deserialize, Serialize};

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn generate() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(pkcs8)
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let public_key = public_key_from_pkcs8(&pkcs8)?;
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn address(&self) -> String {
        convert_address(&hash_pub_key(&self.public_key))
    }

    pub fn public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn pub_key_hash(&self) -> Vec<u8> {
        hash_pub_key(&self.public_key)
    }

    pub fn pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }
}

/// RIPEMD160(SHA256(public key)), the locking condition of an output
pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    ripemd160_digest(&sha256_digest(pub_key))
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let twice = sha256_digest(&sha256_digest(payload));
    twice[..ADDRESS_CHECK_SUM_LEN].to_vec()
}

/// version + pub key hash + checksum, base58 encoded
pub fn convert_address(pub_key_hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + pub_key_hash.len() + ADDRESS_CHECK_SUM_LEN);
    payload.push(VERSION);
    payload.extend_from_slice(pub_key_hash);
    let checksum = checksum(&payload);
    payload.extend(checksum);
    base58_encode(&payload)
}

pub fn validate_address(address: &str) -> bool {
    address_to_pub_key_hash(address).is_ok()
}

/// Recover the public key hash an address locks to, checking its checksum
pub fn address_to_pub_key_hash(address: &str) -> Result<Vec<u8>> {
    let payload = base58_decode(address)?;
    if payload.len() <= ADDRESS_CHECK_SUM_LEN + 1 {
        return Err(LedgerError::InvalidAddress(format!(
            "{address} is too short"
        )));
    }

    let (body, actual_checksum) = payload.split_at(payload.len() - ADDRESS_CHECK_SUM_LEN);
    if checksum(body) != actual_checksum {
        return Err(LedgerError::InvalidAddress(format!(
            "{address} has a bad checksum"
        )));
    }
    Ok(body[1..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_address_is_valid() {
        let wallet = Wallet::generate().unwrap();
        let address = wallet.address();
        assert!(validate_address(&address));
        assert_eq!(
            address_to_pub_key_hash(&address).unwrap(),
            wallet.pub_key_hash()
        );
    }

    #[test]
    fn test_tampered_address_is_rejected() {
        let address = Wallet::generate().unwrap().address();
        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        let tampered: String = chars.into_iter().collect();

        assert!(!validate_address(&tampered));
        assert!(!validate_address("not-an-address"));
    }

    #[test]
    fn test_pkcs8_restores_same_wallet() {
        let wallet = Wallet::generate().unwrap();
        let restored = Wallet::from_pkcs8(wallet.pkcs8().to_vec()).unwrap();
        assert_eq!(restored.address(), wallet.address());
    }
}
