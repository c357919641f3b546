use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Wallets {
    path: PathBuf,
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    /// Load the wallet file at `path`; a missing file is an empty collection
    pub fn load(path: &Path) -> Result<Wallets> {
        let wallets = if path.exists() {
            let bytes = fs::read(path)?;
            deserialize(&bytes).map_err(|e| {
                LedgerError::Wallet(format!("Corrupt wallet file {}: {e}", path.display()))
            })?
        } else {
            HashMap::new()
        };
        Ok(Wallets {
            path: path.to_path_buf(),
            wallets,
        })
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::generate()?;
        let address = wallet.address();
        self.wallets.insert(address.clone(), wallet);
        self.save()?;
        Ok(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serialize(&self.wallets)?)?;
        Ok(())
    }
}
