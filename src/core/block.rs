use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: i64,
    prev_hash: Vec<u8>, // empty for genesis
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
    height: usize,
}

impl Block {
    pub fn new(prev_hash: Vec<u8>, transactions: &[Transaction], height: usize) -> Result<Block> {
        Self::with_timestamp(current_timestamp()?, prev_hash, transactions, height)
    }

    pub fn with_timestamp(
        timestamp: i64,
        prev_hash: Vec<u8>,
        transactions: &[Transaction],
        height: usize,
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let mut block = Block {
            timestamp,
            prev_hash,
            hash: vec![],
            transactions: transactions.to_vec(),
            height,
        };
        block.hash = block.compute_hash();
        Ok(block)
    }

    pub fn genesis(coinbase: &Transaction) -> Result<Block> {
        if !coinbase.is_coinbase() {
            return Err(LedgerError::InvalidBlock(
                "Genesis block must hold a coinbase transaction".to_string(),
            ));
        }
        Block::new(vec![], std::slice::from_ref(coinbase), 0)
    }

    fn compute_hash(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.prev_hash.len() + 32 + 16);
        data.extend(&self.prev_hash);
        data.extend(self.hash_transactions());
        data.extend(self.timestamp.to_be_bytes());
        data.extend((self.height as u64).to_be_bytes());
        sha256_digest(&data)
    }

    /// Whether the stored identifier matches the block's content
    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn hash_transactions(&self) -> Vec<u8> {
        let mut tx_ids = vec![];
        for transaction in &self.transactions {
            tx_ids.extend(transaction.get_id());
        }
        sha256_digest(&tx_ids)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_prev_hash(&self) -> &[u8] {
        self.prev_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_hash_hex(&self) -> String {
        HEXLOWER.encode(&self.hash)
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_height(&self) -> usize {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn coinbase() -> Transaction {
        let address = Wallet::generate().unwrap().address();
        Transaction::new_coinbase_tx(&address, None).unwrap()
    }

    #[test]
    fn test_genesis_has_empty_back_reference() {
        let block = Block::genesis(&coinbase()).unwrap();
        assert!(block.is_genesis());
        assert_eq!(block.get_height(), 0);
        assert_eq!(block.get_transactions().len(), 1);
        assert!(block.get_transactions()[0].is_coinbase());
        assert_eq!(block.get_hash().len(), 32);
    }

    #[test]
    fn test_round_trip_is_exact() {
        let parent = Block::genesis(&coinbase()).unwrap();
        let block = Block::new(parent.get_hash().to_vec(), &[coinbase(), coinbase()], 1).unwrap();

        let bytes = block.serialize().unwrap();
        let decoded = Block::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_hash_covers_content() {
        let tx = coinbase();
        let a = Block::with_timestamp(1, vec![9; 32], &[tx.clone()], 3).unwrap();
        let b = Block::with_timestamp(1, vec![9; 32], &[tx.clone()], 3).unwrap();
        let c = Block::with_timestamp(2, vec![9; 32], &[tx.clone()], 3).unwrap();
        let d = Block::with_timestamp(1, vec![8; 32], &[tx], 3).unwrap();

        assert_eq!(a.get_hash(), b.get_hash());
        assert_ne!(a.get_hash(), c.get_hash());
        assert_ne!(a.get_hash(), d.get_hash());
        assert!(a.verify_hash());
    }

    #[test]
    fn test_empty_block_is_rejected() {
        assert!(matches!(
            Block::new(vec![], &[], 0),
            Err(LedgerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_truncated_bytes_fail_to_decode() {
        let bytes = Block::genesis(&coinbase()).unwrap().serialize().unwrap();
        assert!(Block::deserialize(&bytes[..bytes.len() / 2]).is_err());
    }
}
