// Thin transactional layer over Sled. The ledger only ever talks to the
// store through `view` and `update`, so every multi-key write it makes
// commits atomically or not at all.

use crate::error::{LedgerError, Result};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, IVec, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";

// Files Sled lays down when it first creates a database directory
const DB_MARKER_FILES: [&str; 2] = ["conf", "db"];

/// Result type returned from inside a store transaction
pub type TxnResult<T> = ConflictableTransactionResult<T, LedgerError>;

/// Turn a ledger error raised inside a transaction into an abort
pub fn abort<T>(err: LedgerError) -> TxnResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

pub struct ReadTxn<'a> {
    tree: &'a TransactionalTree,
}

impl ReadTxn<'_> {
    pub fn get(&self, key: &[u8]) -> TxnResult<Option<IVec>> {
        Ok(self.tree.get(key)?)
    }
}

pub struct WriteTxn<'a> {
    tree: &'a TransactionalTree,
}

impl WriteTxn<'_> {
    pub fn get(&self, key: &[u8]) -> TxnResult<Option<IVec>> {
        Ok(self.tree.get(key)?)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> TxnResult<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Store {
    db: Db,
    tree: Tree,
}

impl Store {
    /// Whether a database has ever been created at `path`
    pub fn exists(path: &Path) -> bool {
        DB_MARKER_FILES
            .iter()
            .any(|marker| path.join(marker).is_file())
    }

    pub fn open(path: &Path) -> Result<Store> {
        let db = sled::open(path).map_err(|e| {
            LedgerError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;
        let tree = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open blocks tree: {e}")))?;
        Ok(Store { db, tree })
    }

    /// Run `f` against a consistent read of the store
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&ReadTxn) -> TxnResult<T>,
    {
        self.tree
            .transaction(|tree| f(&ReadTxn { tree }))
            .map_err(Self::unwrap_txn_error)
    }

    /// Run `f` in a read-write transaction; its writes commit together
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&WriteTxn) -> TxnResult<T>,
    {
        let value = self
            .tree
            .transaction(|tree| f(&WriteTxn { tree }))
            .map_err(Self::unwrap_txn_error)?;
        self.tree.flush()?;
        Ok(value)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn unwrap_txn_error(err: TransactionError<LedgerError>) -> LedgerError {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => {
                LedgerError::Database(format!("Store transaction failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_marker_appears_after_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        assert!(!Store::exists(&path));
        let _store = Store::open(&path).unwrap();
        assert!(Store::exists(&path));
    }

    #[test]
    fn test_update_writes_are_visible_to_view() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store
            .update(|txn| {
                txn.set(b"a", b"1")?;
                txn.set(b"b", b"2")
            })
            .unwrap();

        let (a, b) = store
            .view(|txn| Ok((txn.get(b"a")?, txn.get(b"b")?)))
            .unwrap();
        assert_eq!(a.as_deref(), Some(&b"1"[..]));
        assert_eq!(b.as_deref(), Some(&b"2"[..]));
    }

    #[test]
    fn test_aborted_update_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let result: Result<()> = store.update(|txn| {
            txn.set(b"a", b"1")?;
            abort(LedgerError::MissingLastHash)
        });

        assert_eq!(result, Err(LedgerError::MissingLastHash));
        assert_eq!(store.view(|txn| txn.get(b"a")).unwrap(), None);
    }
}
