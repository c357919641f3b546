// The ledger itself: an append-only chain of blocks kept in the store under
// their hashes, plus one mutable pointer ("lh") naming the newest block.
// Everything else - UTXO replay, transaction lookup, signing - walks the
// chain backwards from that pointer.

use crate::config::global_config;
use crate::core::{Block, Transaction, UnspentOutput};
use crate::error::{LedgerError, Result};
use crate::storage::{abort, Store};
use data_encoding::HEXLOWER;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Store key of the last-hash pointer
const LAST_HASH_KEY: &[u8] = b"lh";

const GENESIS_COINBASE_DATA: &str = "First Transaction from genesis";

#[derive(Clone)]
pub struct Blockchain {
    // I cache the tip hash in memory; Arc<RwLock> lets every clone read it
    // while an append replaces it
    last_hash: Arc<RwLock<Vec<u8>>>,
    // I keep blocks under their hash and the "lh" pointer in this one store,
    // and clones share the same underlying Sled handle
    store: Store,
    // I hold this across the whole read-tip-then-write sequence of an append,
    // so two appenders can never both build on the same parent
    append_lock: Arc<Mutex<()>>,
}

impl Blockchain {
    /// Create a chain in the configured data directory
    pub fn create_blockchain(genesis_address: &str) -> Result<Blockchain> {
        Self::create_blockchain_with_path(genesis_address, &global_config()?.get_data_dir())
    }

    /// Reopen the chain in the configured data directory
    pub fn continue_blockchain() -> Result<Blockchain> {
        Self::continue_blockchain_with_path(&global_config()?.get_data_dir())
    }

    pub fn create_blockchain_with_path(genesis_address: &str, path: &Path) -> Result<Blockchain> {
        if Store::exists(path) {
            return Err(LedgerError::ChainExists(path.display().to_string()));
        }

        // Build genesis before touching the disk so a bad address leaves nothing behind
        let coinbase = Transaction::new_coinbase_tx(genesis_address, Some(GENESIS_COINBASE_DATA))?;
        let genesis = Block::genesis(&coinbase)?;
        let genesis_bytes = genesis.serialize()?;
        let genesis_hash = genesis.get_hash().to_vec();

        let store = Store::open(path)?;
        store.update(|txn| {
            txn.set(&genesis_hash, &genesis_bytes)?;
            txn.set(LAST_HASH_KEY, &genesis_hash)
        })?;
        info!(
            "Genesis block {} created at {}",
            genesis.get_hash_hex(),
            path.display()
        );

        Ok(Self::from_parts(store, genesis_hash))
    }

    pub fn continue_blockchain_with_path(path: &Path) -> Result<Blockchain> {
        if !Store::exists(path) {
            return Err(LedgerError::ChainNotFound(path.display().to_string()));
        }

        let store = Store::open(path)?;
        let last_hash = store.view(|txn| match txn.get(LAST_HASH_KEY)? {
            Some(hash) => Ok(hash.to_vec()),
            None => abort(LedgerError::MissingLastHash),
        })?;
        debug!("Reopened chain at {} tip {}", path.display(), HEXLOWER.encode(&last_hash));

        Ok(Self::from_parts(store, last_hash))
    }

    fn from_parts(store: Store, last_hash: Vec<u8>) -> Blockchain {
        Blockchain {
            last_hash: Arc::new(RwLock::new(last_hash)),
            store,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn last_hash(&self) -> Vec<u8> {
        self.last_hash
            .read()
            .expect("Failed to acquire read lock on last_hash - this should never happen")
            .clone()
    }

    fn set_last_hash(&self, hash: Vec<u8>) {
        let mut last_hash = self
            .last_hash
            .write()
            .expect("Failed to acquire write lock on last_hash - this should never happen");
        *last_hash = hash;
    }

    fn lock_appends(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state
        self.append_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persisted last hash and the height of the block it names
    fn read_tip(&self) -> Result<(Vec<u8>, usize)> {
        self.store.view(|txn| {
            let last_hash = match txn.get(LAST_HASH_KEY)? {
                Some(hash) => hash.to_vec(),
                None => return abort(LedgerError::MissingLastHash),
            };
            let tip = match txn.get(&last_hash)? {
                Some(bytes) => Block::deserialize(&bytes).or_else(abort)?,
                None => return abort(LedgerError::BlockNotFound(HEXLOWER.encode(&last_hash))),
            };
            Ok((last_hash, tip.get_height()))
        })
    }

    // Block body and pointer go in one transaction: nobody can see an "lh"
    // naming a block that is not stored yet
    fn commit_block(&self, block: &Block) -> Result<()> {
        let block_bytes = block.serialize()?;
        let block_hash = block.get_hash().to_vec();
        self.store.update(|txn| {
            txn.set(&block_hash, &block_bytes)?;
            txn.set(LAST_HASH_KEY, &block_hash)
        })?;
        self.set_last_hash(block_hash);
        info!(
            "Appended block {} at height {} with {} transactions",
            block.get_hash_hex(),
            block.get_height(),
            block.get_transactions().len()
        );
        Ok(())
    }

    /// Build a block on top of the current tip and append it
    pub fn add_block(&self, transactions: &[Transaction]) -> Result<Block> {
        let _guard = self.lock_appends();
        let (last_hash, tip_height) = self.read_tip()?;
        let block = Block::new(last_hash, transactions, tip_height + 1)?;
        self.commit_block(&block)?;
        Ok(block)
    }

    /// Append a block produced elsewhere. It must extend the current tip.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        let _guard = self.lock_appends();
        let (last_hash, tip_height) = self.read_tip()?;

        if block.get_prev_hash() != last_hash.as_slice() {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} builds on {}, but the tip is {}",
                block.get_hash_hex(),
                HEXLOWER.encode(block.get_prev_hash()),
                HEXLOWER.encode(&last_hash)
            )));
        }
        if block.get_height() != tip_height + 1 {
            return Err(LedgerError::InvalidBlock(format!(
                "Block height {} does not follow tip height {tip_height}",
                block.get_height()
            )));
        }
        if block.get_transactions().is_empty() || !block.verify_hash() {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} does not match its content",
                block.get_hash_hex()
            )));
        }

        self.commit_block(block)
    }

    pub fn iterator(&self) -> BlockchainIterator {
        BlockchainIterator::new(self.last_hash(), self.store.clone())
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        let bytes = self.store.view(|txn| txn.get(block_hash))?;
        bytes.map(|bytes| Block::deserialize(&bytes)).transpose()
    }

    pub fn get_best_height(&self) -> Result<usize> {
        let last_hash = self.last_hash();
        let tip = self
            .get_block(&last_hash)?
            .ok_or_else(|| LedgerError::BlockNotFound(HEXLOWER.encode(&last_hash)))?;
        Ok(tip.get_height())
    }

    /// Replay the whole chain, newest first, and return the outputs no input
    /// has spent, keyed by hex transaction id.
    pub fn find_utxo(&self) -> Result<HashMap<String, Vec<UnspentOutput>>> {
        let mut utxo: HashMap<String, Vec<UnspentOutput>> = HashMap::new();
        let mut spent_txos: HashMap<String, Vec<usize>> = HashMap::new();

        let mut iterator = self.iterator();
        loop {
            let block = iterator.next_block()?;

            // Within a block a transaction can only spend ones before it, so
            // walking it back to front records every spend ahead of its output
            for tx in block.get_transactions().iter().rev() {
                let txid_hex = tx.get_id_hex();
                for (index, out) in tx.get_vout().iter().enumerate() {
                    let spent = spent_txos
                        .get(&txid_hex)
                        .is_some_and(|indexes| indexes.contains(&index));
                    if spent {
                        continue;
                    }
                    utxo.entry(txid_hex.clone()).or_default().push(UnspentOutput {
                        index,
                        output: out.clone(),
                    });
                }

                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    spent_txos
                        .entry(HEXLOWER.encode(txin.get_txid()))
                        .or_default()
                        .push(txin.get_vout());
                }
            }

            if block.is_genesis() {
                break;
            }
        }

        // Outputs were collected per transaction in index order
        Ok(utxo)
    }

    pub fn find_transaction(&self, txid: &[u8]) -> Result<Transaction> {
        let mut iterator = self.iterator();
        loop {
            let block = iterator.next_block()?;
            if let Some(tx) = block.get_transactions().iter().find(|tx| tx.get_id() == txid) {
                return Ok(tx.clone());
            }
            if block.is_genesis() {
                return Err(LedgerError::TransactionNotFound(HEXLOWER.encode(txid)));
            }
        }
    }

    /// Every transaction referenced by `tx`'s inputs, keyed by hex id
    pub fn collect_referenced(&self, tx: &Transaction) -> Result<HashMap<String, Transaction>> {
        let mut prev_txs = HashMap::new();
        if tx.is_coinbase() {
            return Ok(prev_txs);
        }
        for input in tx.get_vin() {
            let txid_hex = HEXLOWER.encode(input.get_txid());
            if prev_txs.contains_key(&txid_hex) {
                continue;
            }
            let prev_tx = self.find_transaction(input.get_txid())?;
            prev_txs.insert(txid_hex, prev_tx);
        }
        Ok(prev_txs)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, pkcs8: &[u8]) -> Result<()> {
        let prev_txs = self.collect_referenced(tx)?;
        tx.sign(pkcs8, &prev_txs)
    }

    /// `Ok(false)` for anything wrong with the transaction itself; `Err`
    /// only when the store could not be read.
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        match self.collect_referenced(tx) {
            Ok(prev_txs) => Ok(tx.verify(&prev_txs)),
            Err(LedgerError::TransactionNotFound(txid)) => {
                warn!(
                    "Transaction {} references unknown transaction {txid}",
                    tx.get_id_hex()
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Flush the store and drop this handle. Clones share the same Sled
    /// database, so the file lock is only released once every clone (and
    /// every live iterator) has been dropped too.
    pub fn close(self) -> Result<()> {
        self.store.flush()
    }
}

pub struct BlockchainIterator {
    store: Store,
    current_hash: Vec<u8>,
}

impl BlockchainIterator {
    fn new(tip_hash: Vec<u8>, store: Store) -> BlockchainIterator {
        BlockchainIterator {
            current_hash: tip_hash,
            store,
        }
    }

    pub fn current_hash(&self) -> &[u8] {
        self.current_hash.as_slice()
    }

    /// Read the block under the current hash and step back to its parent.
    /// Callers stop once they get a block with an empty back-reference;
    /// calling again after that fails with `BlockNotFound`.
    pub fn next_block(&mut self) -> Result<Block> {
        let hash = self.current_hash.clone();
        let block = self.store.view(|txn| match txn.get(&hash)? {
            Some(bytes) => Block::deserialize(&bytes).or_else(abort),
            None => abort(LedgerError::BlockNotFound(HEXLOWER.encode(&hash))),
        })?;
        self.current_hash = block.get_prev_hash().to_vec();
        Ok(block)
    }
}

impl Iterator for BlockchainIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_hash.is_empty() {
            return None;
        }
        let block = self.next_block();
        if block.is_err() {
            self.current_hash.clear();
        }
        Some(block)
    }
}
