//! Data storage and persistence
//!
//! The transactional store the chain lives in, and the UTXO view derived
//! from replaying it.

pub mod store;
pub mod utxo_set;

pub use store::{abort, ReadTxn, Store, TxnResult, WriteTxn};
pub use utxo_set::UTXOSet;
