// Transactions follow the UTXO model: each one consumes earlier outputs
// through its inputs and creates new outputs locked to a public key hash.

use crate::core::Blockchain;
use crate::error::{LedgerError, Result};
use crate::storage::UTXOSet;
use crate::utils::{ecdsa_p256_sha256_sign, ecdsa_p256_sha256_verify, serialize, sha256_digest};
use crate::wallet::{address_to_pub_key_hash, hash_pub_key, Wallet};
use data_encoding::HEXLOWER;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Reward paid by a coinbase transaction
pub const SUBSIDY: u64 = 100;

// Output index carried by the single input of a coinbase transaction
const COINBASE_VOUT: usize = usize::MAX;

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXInput {
    txid: Vec<u8>, // transaction holding the output being spent
    vout: usize,   // index of that output
    signature: Vec<u8>,
    pub_key: Vec<u8>, // spender's public key; arbitrary data on a coinbase
}

impl TXInput {
    pub fn new(txid: &[u8], vout: usize) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            signature: vec![],
            pub_key: vec![],
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> usize {
        self.vout
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    pub fn set_pub_key(&mut self, pub_key: &[u8]) {
        self.pub_key = pub_key.to_vec();
    }

    pub fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    /// Whether the key carried by this input hashes to `pub_key_hash`
    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        hash_pub_key(self.pub_key.as_slice()).eq(pub_key_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    pub_key_hash: Vec<u8>,
}

impl TXOutput {
    /// An output of `value` that only the owner of `address` can spend
    pub fn new(value: u64, address: &str) -> Result<TXOutput> {
        if value == 0 {
            return Err(LedgerError::Transaction(
                "Output value must be positive".to_string(),
            ));
        }
        Ok(TXOutput {
            value,
            pub_key_hash: address_to_pub_key_hash(address)?,
        })
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash.eq(pub_key_hash)
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Block reward paying `to`; `data` defaults to random bytes so that
    /// two rewards to the same address never share an id
    pub fn new_coinbase_tx(to: &str, data: Option<&str>) -> Result<Transaction> {
        let data = match data {
            Some(text) => text.as_bytes().to_vec(),
            None => Uuid::new_v4().as_bytes().to_vec(),
        };
        let tx_input = TXInput {
            txid: vec![],
            vout: COINBASE_VOUT,
            signature: vec![],
            pub_key: data,
        };
        Self::from_parts(vec![tx_input], vec![TXOutput::new(SUBSIDY, to)?])
    }

    /// Assemble an unsigned transaction and compute its id
    pub fn from_parts(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Result<Transaction> {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Pay `amount` from `wallet` to `to`, keeping `fee` back for the block
    /// producer and returning any change to the sender. The result is signed.
    pub fn new_utxo_transaction(
        wallet: &Wallet,
        to: &str,
        amount: u64,
        fee: u64,
        utxo_set: &UTXOSet,
        blockchain: &Blockchain,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::Transaction(
                "Amount must be positive".to_string(),
            ));
        }
        let required = amount
            .checked_add(fee)
            .ok_or_else(|| LedgerError::Transaction("Amount plus fee overflows".to_string()))?;

        let (accumulated, spendable) =
            utxo_set.find_spendable_outputs(&wallet.pub_key_hash(), required);
        if accumulated < required {
            return Err(LedgerError::InsufficientFunds {
                required,
                available: accumulated,
            });
        }

        let mut inputs = vec![];
        for (txid_hex, indexes) in spendable {
            let txid = HEXLOWER.decode(txid_hex.as_bytes()).map_err(|e| {
                LedgerError::Transaction(format!("Invalid transaction ID {txid_hex}: {e}"))
            })?;
            for index in indexes {
                let mut input = TXInput::new(&txid, index);
                input.set_pub_key(wallet.public_key());
                inputs.push(input);
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)?];
        let change = accumulated - required;
        if change > 0 {
            outputs.push(TXOutput::new(change, &wallet.address())?);
        }

        let mut tx = Self::from_parts(inputs, outputs)?;
        blockchain.sign_transaction(&mut tx, wallet.pkcs8())?;
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_empty() && self.vin[0].vout == COINBASE_VOUT
    }

    fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(&tx_copy.serialize()?))
    }

    // Signatures and keys cleared, id cleared
    fn trimmed_copy(&self) -> Transaction {
        Transaction {
            id: vec![],
            vin: self
                .vin
                .iter()
                .map(|input| TXInput::new(input.get_txid(), input.get_vout()))
                .collect(),
            vout: self.vout.clone(),
        }
    }

    /// Digest that the signature of input `idx` commits to: the trimmed
    /// transaction with that input's key slot holding the spent output's
    /// lock, followed by the spent output's value.
    fn signing_digest(trimmed: &mut Transaction, idx: usize, spent: &TXOutput) -> Result<Vec<u8>> {
        trimmed.vin[idx].pub_key = spent.pub_key_hash.clone();
        let mut data = serialize(&*trimmed)?;
        trimmed.vin[idx].pub_key = vec![];
        data.extend(spent.value.to_be_bytes());
        Ok(sha256_digest(&data))
    }

    /// First (txid, vout) pair referenced by more than one input
    fn duplicate_input(&self) -> Option<(String, usize)> {
        let mut seen = HashSet::new();
        self.vin
            .iter()
            .map(|input| (HEXLOWER.encode(input.get_txid()), input.get_vout()))
            .find(|outpoint| !seen.insert(outpoint.clone()))
    }

    /// Look up the output `input` spends among the referenced transactions
    fn spent_output<'a>(
        input: &TXInput,
        prev_txs: &'a HashMap<String, Transaction>,
    ) -> Result<&'a TXOutput> {
        let txid_hex = HEXLOWER.encode(input.get_txid());
        let prev_tx = prev_txs
            .get(&txid_hex)
            .ok_or_else(|| LedgerError::TransactionNotFound(txid_hex.clone()))?;
        prev_tx.vout.get(input.vout).ok_or_else(|| {
            LedgerError::Transaction(format!(
                "Output {} does not exist in transaction {txid_hex}",
                input.vout
            ))
        })
    }

    /// Sign every input with the key in `pkcs8`. `prev_txs` maps the hex id
    /// of each referenced transaction to that transaction.
    pub fn sign(&mut self, pkcs8: &[u8], prev_txs: &HashMap<String, Transaction>) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        if let Some((txid, vout)) = self.duplicate_input() {
            return Err(LedgerError::Transaction(format!(
                "Output {vout} of transaction {txid} is spent more than once"
            )));
        }

        let mut trimmed = self.trimmed_copy();
        for idx in 0..self.vin.len() {
            let spent = Self::spent_output(&self.vin[idx], prev_txs)?;
            let digest = Self::signing_digest(&mut trimmed, idx, spent)?;
            self.vin[idx].signature = ecdsa_p256_sha256_sign(pkcs8, &digest)?;
        }
        Ok(())
    }

    /// Check every input's signature and that its key satisfies the lock of
    /// the output it spends. A single bad input fails the whole transaction.
    pub fn verify(&self, prev_txs: &HashMap<String, Transaction>) -> bool {
        if self.is_coinbase() {
            return true;
        }
        if self.vin.is_empty() {
            warn!("Transaction {} has no inputs", HEXLOWER.encode(&self.id));
            return false;
        }
        if let Some((txid, vout)) = self.duplicate_input() {
            warn!(
                "Transaction {} spends output {vout} of {txid} more than once",
                HEXLOWER.encode(&self.id)
            );
            return false;
        }

        let mut trimmed = self.trimmed_copy();
        for (idx, input) in self.vin.iter().enumerate() {
            let spent = match Self::spent_output(input, prev_txs) {
                Ok(spent) => spent,
                Err(e) => {
                    warn!("Input {idx} cannot be resolved: {e}");
                    return false;
                }
            };

            if !input.uses_key(spent.get_pub_key_hash()) {
                warn!("Input {idx} key does not match the lock of the output it spends");
                return false;
            }

            let digest = match Self::signing_digest(&mut trimmed, idx, spent) {
                Ok(digest) => digest,
                Err(e) => {
                    warn!("Input {idx} signing digest failed: {e}");
                    return false;
                }
            };
            if !ecdsa_p256_sha256_verify(input.get_pub_key(), input.get_signature(), &digest) {
                warn!("Input {idx} signature does not verify");
                return false;
            }
        }
        true
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_id_hex(&self) -> String {
        HEXLOWER.encode(&self.id)
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn get_vin_mut(&mut self) -> &mut [TXInput] {
        self.vin.as_mut_slice()
    }

    pub fn get_vout_mut(&mut self) -> &mut [TXOutput] {
        self.vout.as_mut_slice()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }
}

/// An output still spendable, with its position in the creating transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub index: usize,
    pub output: TXOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend_of(prev: &Transaction, owner: &Wallet, to: &str) -> Transaction {
        let mut input = TXInput::new(prev.get_id(), 0);
        input.set_pub_key(owner.public_key());
        Transaction::from_parts(vec![input], vec![TXOutput::new(60, to).unwrap()]).unwrap()
    }

    fn prev_map(prev: &Transaction) -> HashMap<String, Transaction> {
        HashMap::from([(prev.get_id_hex(), prev.clone())])
    }

    #[test]
    fn test_coinbase_shape() {
        let wallet = Wallet::generate().unwrap();
        let tx = Transaction::new_coinbase_tx(&wallet.address(), Some("genesis")).unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.get_vout().len(), 1);
        assert_eq!(tx.get_vout()[0].get_value(), SUBSIDY);
        assert!(tx.get_vout()[0].is_locked_with_key(&wallet.pub_key_hash()));
        assert!(tx.verify(&HashMap::new()));
    }

    #[test]
    fn test_coinbase_ids_differ_without_data() {
        let address = Wallet::generate().unwrap().address();
        let a = Transaction::new_coinbase_tx(&address, None).unwrap();
        let b = Transaction::new_coinbase_tx(&address, None).unwrap();
        assert_ne!(a.get_id(), b.get_id());
    }

    #[test]
    fn test_sign_then_verify() {
        let alice = Wallet::generate().unwrap();
        let bob = Wallet::generate().unwrap();
        let prev = Transaction::new_coinbase_tx(&alice.address(), None).unwrap();
        let prev_txs = prev_map(&prev);

        let mut tx = spend_of(&prev, &alice, &bob.address());
        assert!(!tx.is_coinbase());
        tx.sign(alice.pkcs8(), &prev_txs).unwrap();
        assert!(tx.verify(&prev_txs));
    }

    #[test]
    fn test_flipped_signature_byte_fails() {
        let alice = Wallet::generate().unwrap();
        let prev = Transaction::new_coinbase_tx(&alice.address(), None).unwrap();
        let prev_txs = prev_map(&prev);
        let mut tx = spend_of(&prev, &alice, &alice.address());
        tx.sign(alice.pkcs8(), &prev_txs).unwrap();

        let mut signature = tx.get_vin()[0].get_signature().to_vec();
        signature[5] ^= 0x01;
        tx.get_vin_mut()[0].set_signature(signature);
        assert!(!tx.verify(&prev_txs));
    }

    #[test]
    fn test_changed_output_fails() {
        let alice = Wallet::generate().unwrap();
        let prev = Transaction::new_coinbase_tx(&alice.address(), None).unwrap();
        let prev_txs = prev_map(&prev);
        let mut tx = spend_of(&prev, &alice, &alice.address());
        tx.sign(alice.pkcs8(), &prev_txs).unwrap();

        tx.get_vout_mut()[0] = TXOutput::new(61, &alice.address()).unwrap();
        assert!(!tx.verify(&prev_txs));
    }

    #[test]
    fn test_signature_is_bound_to_spent_output_value() {
        let alice = Wallet::generate().unwrap();
        let prev = Transaction::new_coinbase_tx(&alice.address(), None).unwrap();
        let mut tx = spend_of(&prev, &alice, &alice.address());
        tx.sign(alice.pkcs8(), &prev_map(&prev)).unwrap();

        // Same id, same lock, different value: the signature must not carry over
        let mut forged = prev.clone();
        forged.get_vout_mut()[0] = TXOutput::new(SUBSIDY + 1, &alice.address()).unwrap();
        assert!(!tx.verify(&prev_map(&forged)));
    }

    #[test]
    fn test_wrong_key_fails_lock_check() {
        let alice = Wallet::generate().unwrap();
        let mallory = Wallet::generate().unwrap();
        let prev = Transaction::new_coinbase_tx(&alice.address(), None).unwrap();
        let prev_txs = prev_map(&prev);

        let mut tx = spend_of(&prev, &mallory, &mallory.address());
        tx.sign(mallory.pkcs8(), &prev_txs).unwrap();
        assert!(!tx.verify(&prev_txs));
    }

    #[test]
    fn test_missing_reference_fails_sign_and_verify() {
        let alice = Wallet::generate().unwrap();
        let prev = Transaction::new_coinbase_tx(&alice.address(), None).unwrap();
        let mut tx = spend_of(&prev, &alice, &alice.address());

        let result = tx.sign(alice.pkcs8(), &HashMap::new());
        assert!(matches!(result, Err(LedgerError::TransactionNotFound(_))));
        assert!(!tx.verify(&HashMap::new()));
    }

    #[test]
    fn test_out_of_range_output_index_is_malformed() {
        let alice = Wallet::generate().unwrap();
        let prev = Transaction::new_coinbase_tx(&alice.address(), None).unwrap();
        let mut input = TXInput::new(prev.get_id(), 3);
        input.set_pub_key(alice.public_key());
        let mut tx = Transaction::from_parts(
            vec![input],
            vec![TXOutput::new(1, &alice.address()).unwrap()],
        )
        .unwrap();

        let result = tx.sign(alice.pkcs8(), &prev_map(&prev));
        assert!(matches!(result, Err(LedgerError::Transaction(_))));
        assert!(!tx.verify(&prev_map(&prev)));
    }

    #[test]
    fn test_outpoint_spent_twice_is_rejected() {
        let alice = Wallet::generate().unwrap();
        let prev = Transaction::new_coinbase_tx(&alice.address(), None).unwrap();
        let prev_txs = prev_map(&prev);
        let vin: Vec<TXInput> = (0..2)
            .map(|_| {
                let mut input = TXInput::new(prev.get_id(), 0);
                input.set_pub_key(alice.public_key());
                input
            })
            .collect();
        let payout = TXOutput::new(2 * SUBSIDY, &alice.address()).unwrap();
        let mut tx = Transaction::from_parts(vin, vec![payout]).unwrap();

        let result = tx.sign(alice.pkcs8(), &prev_txs);
        assert!(matches!(result, Err(LedgerError::Transaction(_))));

        // Every input carries a valid signature, yet the whole thing must fail
        let mut trimmed = tx.trimmed_copy();
        let spent = prev.get_vout()[0].clone();
        for idx in 0..2 {
            let digest = Transaction::signing_digest(&mut trimmed, idx, &spent).unwrap();
            let signature = ecdsa_p256_sha256_sign(alice.pkcs8(), &digest).unwrap();
            tx.get_vin_mut()[idx].set_signature(signature);
        }
        assert!(!tx.verify(&prev_txs));
    }

    #[test]
    fn test_zero_value_output_is_rejected() {
        let address = Wallet::generate().unwrap().address();
        assert!(TXOutput::new(0, &address).is_err());
        assert!(matches!(
            TXOutput::new(5, "bogus"),
            Err(LedgerError::InvalidAddress(_))
        ));
    }
}
