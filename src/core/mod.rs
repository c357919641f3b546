//! Core ledger functionality
//!
//! Blocks, transactions and the hash-linked chain that stores them.

pub mod block;
pub mod blockchain;
pub mod transaction;

pub use block::Block;
pub use blockchain::{Blockchain, BlockchainIterator};
pub use transaction::{TXInput, TXOutput, Transaction, UnspentOutput, SUBSIDY};
