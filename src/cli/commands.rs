use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hashlink-ledger")]
pub struct Opt {
    #[arg(
        long = "data-dir",
        global = true,
        help = "Directory holding the chain (overrides configuration)"
    )]
    pub data_dir: Option<PathBuf>,
    #[arg(
        long = "wallet-file",
        global = true,
        help = "File holding local wallets (overrides configuration)"
    )]
    pub wallet_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createblockchain", about = "Create a new blockchain")]
    Createblockchain {
        #[arg(help = "The address to send the genesis reward to")]
        address: String,
    },
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses,
    #[command(name = "getbalance", about = "Get the balance of an address")]
    GetBalance {
        #[arg(help = "The wallet address")]
        address: String,
    },
    #[command(name = "send", about = "Send value between addresses and append it in a new block")]
    Send {
        #[arg(help = "Source wallet address")]
        from: String,
        #[arg(help = "Destination wallet address")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: u64,
        #[arg(long = "fee", default_value_t = 0, help = "Fee left for the block producer")]
        fee: u64,
    },
    #[command(name = "printchain", about = "Print all blocks, newest first")]
    Printchain,
    #[command(name = "verifychain", about = "Verify every transaction in the chain")]
    Verifychain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_parses_fee_and_global_data_dir() {
        let opt = Opt::parse_from([
            "hashlink-ledger",
            "send",
            "from",
            "to",
            "25",
            "--fee",
            "2",
            "--data-dir",
            "/tmp/chain",
        ]);
        assert_eq!(opt.data_dir, Some(PathBuf::from("/tmp/chain")));
        match opt.command {
            Command::Send {
                from,
                to,
                amount,
                fee,
            } => {
                assert_eq!((from.as_str(), to.as_str(), amount, fee), ("from", "to", 25, 2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_wallet_file_flag_is_optional() {
        let opt = Opt::parse_from(["hashlink-ledger", "createwallet"]);
        assert_eq!(opt.wallet_file, None);

        let opt = Opt::parse_from(["hashlink-ledger", "--wallet-file", "./w.data", "createwallet"]);
        assert_eq!(opt.wallet_file, Some(PathBuf::from("./w.data")));
        assert!(matches!(opt.command, Command::Createwallet));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Opt::try_parse_from(["hashlink-ledger", "startnode"]).is_err());
    }
}
