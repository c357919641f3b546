//! Error handling for the ledger
//!
//! Every fallible operation in the crate returns [`Result`]. Store failures,
//! precondition violations and lookups that come up empty each have their
//! own variant so callers can tell them apart. A transaction whose signature
//! does not check is not an error: verification reports it as `false`.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The durable store failed to open, read or write
    Database(String),
    /// Encoding or decoding of a stored value failed
    Serialization(String),
    /// File I/O errors outside the store
    Io(String),
    /// `create` was called on a location that already holds a chain
    ChainExists(String),
    /// `continue` was called on a location without a chain
    ChainNotFound(String),
    /// The store is open but carries no last-hash pointer
    MissingLastHash,
    /// No block body is stored under the given (hex) hash
    BlockNotFound(String),
    /// A candidate block does not extend the current chain
    InvalidBlock(String),
    /// No transaction with the given (hex) id exists in the chain
    TransactionNotFound(String),
    /// Malformed transaction or input
    Transaction(String),
    /// Key handling or signing failed
    Crypto(String),
    InvalidAddress(String),
    InsufficientFunds { required: u64, available: u64 },
    Wallet(String),
    Config(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::ChainExists(location) => {
                write!(f, "Blockchain already exists at {location}")
            }
            LedgerError::ChainNotFound(location) => {
                write!(f, "No blockchain found at {location}, create one first")
            }
            LedgerError::MissingLastHash => write!(f, "Store has no last hash pointer"),
            LedgerError::BlockNotFound(hash) => write!(f, "Block not found: {hash}"),
            LedgerError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::TransactionNotFound(id) => {
                write!(f, "Transaction does not exist: {id}")
            }
            LedgerError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            LedgerError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_convert_to_database_variant() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: LedgerError = sled::Error::Io(io).into();
        assert!(matches!(err, LedgerError::Database(_)));
    }

    #[test]
    fn test_display_names_the_missing_transaction() {
        let err = LedgerError::TransactionNotFound("abcd".to_string());
        assert_eq!(err.to_string(), "Transaction does not exist: abcd");
    }
}
