//! # Hashlink Ledger
//!
//! An append-only, hash-linked ledger of transactions kept in a Sled
//! database, with the set of spendable outputs computed by replaying it.
//!
//! ## Layout
//! - `core/`: blocks, transactions and the chain (append, backward
//!   iteration, UTXO replay, transaction lookup, signing and verification)
//! - `storage/`: the transactional store adapter and the UTXO view
//! - `wallet/`: key pairs and base58 addresses
//! - `config/`: settings from defaults, `hashlink.toml` and the environment
//! - `utils/`: hashing, ECDSA and bincode helpers
//! - `cli/`: argument parsing for the binary
//!
//! ## Invariants worth remembering
//! - A block body and the `"lh"` pointer naming it are written in one store
//!   transaction.
//! - Appends are serialized from reading the tip to committing the block,
//!   so the chain never forks.
//! - The UTXO table is derived, never stored.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use cli::{Command, Opt};
pub use config::{global_config, Config, Settings};
pub use core::{
    Block, Blockchain, BlockchainIterator, TXInput, TXOutput, Transaction, UnspentOutput,
    SUBSIDY,
};
pub use error::{LedgerError, Result};
pub use storage::{Store, UTXOSet};
pub use wallet::{
    address_to_pub_key_hash, convert_address, hash_pub_key, validate_address, Wallet, Wallets,
};
