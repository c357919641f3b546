use crate::core::{Blockchain, TXOutput, UnspentOutput};
use crate::error::Result;
use std::collections::HashMap;

/// Unspent outputs of a chain as of one full replay. Rebuild it after the
/// chain grows; nothing here is written back to the store.
pub struct UTXOSet {
    utxo: HashMap<String, Vec<UnspentOutput>>,
}

impl UTXOSet {
    pub fn build(blockchain: &Blockchain) -> Result<UTXOSet> {
        Ok(UTXOSet {
            utxo: blockchain.find_utxo()?,
        })
    }

    pub fn from_map(utxo: HashMap<String, Vec<UnspentOutput>>) -> UTXOSet {
        UTXOSet { utxo }
    }

    /// Unspent outputs of one transaction, by hex id
    pub fn outputs_of(&self, txid_hex: &str) -> &[UnspentOutput] {
        self.utxo.get(txid_hex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Gather outputs locked to `pub_key_hash` until `amount` is covered.
    /// Returns the total gathered and, per hex txid, the output indexes used.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> (u64, HashMap<String, Vec<usize>>) {
        let mut spendable: HashMap<String, Vec<usize>> = HashMap::new();
        let mut accumulated = 0u64;

        // Sorted so the same chain always yields the same selection
        let mut txids: Vec<&String> = self.utxo.keys().collect();
        txids.sort();

        for txid_hex in txids {
            for unspent in &self.utxo[txid_hex] {
                if accumulated >= amount {
                    return (accumulated, spendable);
                }
                if unspent.output.is_locked_with_key(pub_key_hash) {
                    accumulated = accumulated.saturating_add(unspent.output.get_value());
                    spendable
                        .entry(txid_hex.clone())
                        .or_default()
                        .push(unspent.index);
                }
            }
        }
        (accumulated, spendable)
    }

    pub fn find_outputs(&self, pub_key_hash: &[u8]) -> Vec<TXOutput> {
        self.utxo
            .values()
            .flatten()
            .filter(|unspent| unspent.output.is_locked_with_key(pub_key_hash))
            .map(|unspent| unspent.output.clone())
            .collect()
    }

    pub fn balance(&self, pub_key_hash: &[u8]) -> u64 {
        self.find_outputs(pub_key_hash)
            .iter()
            .map(TXOutput::get_value)
            .sum()
    }

    /// Number of transactions with at least one unspent output
    pub fn count_transactions(&self) -> usize {
        self.utxo.values().filter(|outs| !outs.is_empty()).count()
    }
}
