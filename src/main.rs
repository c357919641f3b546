// This is the entry point for the ledger CLI
// I keep all the real work in the library and only wire commands to it here
use clap::Parser;
use data_encoding::HEXLOWER;
use hashlink_ledger::{
    address_to_pub_key_hash, convert_address, global_config, hash_pub_key, Blockchain, Command,
    LedgerError, Opt, Transaction, UTXOSet, Wallets,
};
use log::error;
use std::process;

fn main() {
    // I parse the command line first so --help works even with a broken config
    let opt = Opt::parse();

    // I load the configuration before anything else touches it. The logger
    // is not up yet, so a bad config file goes straight to stderr
    let config = match global_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    // Flags on the command line beat both the file and the environment
    if let Some(dir) = opt.data_dir.clone() {
        config.set_data_dir(dir);
    }
    if let Some(file) = opt.wallet_file.clone() {
        config.set_wallet_file(file);
    }

    // I start logging at the configured level; RUST_LOG still wins over it
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.get_log_level()),
    )
    .init();

    // I run the command and exit with code 1 if anything went wrong
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

// This is where I dispatch every CLI command to the ledger
fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = global_config()?;
    match command {
        // When I want a brand new chain, the given address gets the genesis reward
        Command::Createblockchain { address } => {
            // The address is checked before anything is written to disk
            let blockchain = Blockchain::create_blockchain(&address)?;
            // I flush and release the store so the next command can open it
            blockchain.close()?;
            println!("Done!");
        }
        // When I want a new key pair stored in the local wallet file
        Command::Createwallet => {
            // I load the existing wallets (an absent file just means none yet)
            let mut wallets = Wallets::load(&config.get_wallet_file())?;
            // I generate the key pair, derive its address and save the file
            let address = wallets.create_wallet()?;
            println!("Your new address: {address}");
        }
        // When I want to see every address I hold keys for
        Command::ListAddresses => {
            let wallets = Wallets::load(&config.get_wallet_file())?;
            for address in wallets.addresses() {
                println!("{address}");
            }
        }
        // When I want to know how much an address can spend
        Command::GetBalance { address } => {
            // I decode the address up front so a typo fails before the store is opened
            let pub_key_hash = address_to_pub_key_hash(&address)?;
            let blockchain = Blockchain::continue_blockchain()?;
            // I replay the chain once and sum every unspent output locked to this key
            let utxo_set = UTXOSet::build(&blockchain)?;
            println!("Balance of {address}: {}", utxo_set.balance(&pub_key_hash));
            blockchain.close()?;
        }
        // When I want to move value from one of my addresses to another one
        Command::Send {
            from,
            to,
            amount,
            fee,
        } => {
            // I need the sender's private key, so the sender must be a local wallet
            let wallets = Wallets::load(&config.get_wallet_file())?;
            let wallet = wallets
                .get(&from)
                .ok_or_else(|| LedgerError::Wallet(format!("No wallet for address {from}")))?;

            let blockchain = Blockchain::continue_blockchain()?;
            // I pick enough unspent outputs to cover amount plus fee and sign every input
            let utxo_set = UTXOSet::build(&blockchain)?;
            let tx =
                Transaction::new_utxo_transaction(wallet, &to, amount, fee, &utxo_set, &blockchain)?;
            // I double-check the signatures against the chain before appending anything
            if !blockchain.verify_transaction(&tx)? {
                return Err(LedgerError::Transaction(format!(
                    "Transaction {} failed verification",
                    tx.get_id_hex()
                ))
                .into());
            }

            // The sender produces the block, so the reward goes back to them
            let coinbase = Transaction::new_coinbase_tx(&from, None)?;
            blockchain.add_block(&[coinbase, tx])?;
            blockchain.close()?;
            println!("Success!");
        }
        // When I want to see the whole chain, newest block first
        Command::Printchain => {
            let blockchain = Blockchain::continue_blockchain()?;
            for block in blockchain.iterator() {
                let block = block?;
                println!("Height: {}", block.get_height());
                println!("Prev hash: {}", HEXLOWER.encode(block.get_prev_hash()));
                println!("Hash: {}", block.get_hash_hex());
                println!("Timestamp: {}", block.get_timestamp());

                for tx in block.get_transactions() {
                    println!("- Transaction {}", tx.get_id_hex());
                    if !tx.is_coinbase() {
                        for input in tx.get_vin() {
                            println!(
                                "-- Input txid = {}, vout = {}, from = {}",
                                HEXLOWER.encode(input.get_txid()),
                                input.get_vout(),
                                convert_address(&hash_pub_key(input.get_pub_key())),
                            );
                        }
                    }
                    for output in tx.get_vout() {
                        println!(
                            "-- Output value = {}, to = {}",
                            output.get_value(),
                            convert_address(output.get_pub_key_hash()),
                        );
                    }
                }
                println!();
            }
            blockchain.close()?;
        }
        // When I want to re-check every signature stored in the chain
        Command::Verifychain => {
            let blockchain = Blockchain::continue_blockchain()?;
            // I keep going after a bad transaction so the report covers all of them
            let mut checked = 0usize;
            let mut failed = 0usize;
            for block in blockchain.iterator() {
                for tx in block?.get_transactions() {
                    checked += 1;
                    if !blockchain.verify_transaction(tx)? {
                        failed += 1;
                        println!("Invalid transaction: {}", tx.get_id_hex());
                    }
                }
            }
            blockchain.close()?;
            println!("Checked {checked} transactions, {failed} invalid");
            if failed > 0 {
                return Err(format!("{failed} invalid transactions in chain").into());
            }
        }
    }
    Ok(())
}
