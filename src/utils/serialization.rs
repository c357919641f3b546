// Every value the ledger persists goes through these two helpers, so the
// encoding of blocks, transactions and wallet files stays in one place.
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Encode a value with bincode's standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    Ok(bincode::encode_to_vec(data, config)?)
}

/// Decode a value, rejecting input with bytes left over after it
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, consumed) = bincode::decode_from_slice(bytes, config)?;
    if consumed != bytes.len() {
        return Err(LedgerError::Serialization(format!(
            "{} trailing bytes after decoded value",
            bytes.len() - consumed
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
    struct Record {
        id: u64,
        payload: Vec<u8>,
    }

    #[test]
    fn test_record_round_trips() {
        let original = Record {
            id: 7,
            payload: vec![1, 2, 3],
        };
        let bytes = serialize(&original).unwrap();
        let decoded: Record = deserialize(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = serialize(&Record {
            id: 1,
            payload: vec![],
        })
        .unwrap();
        bytes.push(0);
        let result: Result<Record> = deserialize(&bytes);
        assert!(matches!(result, Err(LedgerError::Serialization(_))));
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let result: Result<Record> = deserialize(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(result.is_err());
    }
}
