//! The operator console: reads commands from stdin, dispatches `transfer` to
//! the sender's peer, and fans the three query commands out to every peer
//! and prints the aggregated result.

use std::io::{self, BufRead, Write};

use clap::Parser;
use ledger_mutex::{
    config::ClusterConfig,
    ledger::Transaction,
    protocol::{Command, Envelope, QueryResponse},
    transport,
};

#[derive(Parser)]
struct Args {
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClusterConfig::load(path)?,
        None => ClusterConfig::reference(),
    };

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        if let Err(err) = dispatch(&config, &words).await {
            eprintln!("error: {err}");
        }
    }
    Ok(())
}

async fn dispatch(config: &ClusterConfig, words: &[&str]) -> anyhow::Result<()> {
    match words {
        ["transfer", sender, receiver, amount] => {
            let amount: u64 = amount.parse()?;
            let addr = config
                .addr_of(&sender.to_string())
                .ok_or_else(|| anyhow::anyhow!("unknown peer {sender}"))?;
            let envelope = Envelope::Command(Command::Transfer {
                transaction: Transaction::new(*sender, *receiver, amount),
            });
            transport::request(addr, &envelope).await?;
            Ok(())
        }
        ["balance"] => {
            let mut balances = std::collections::BTreeMap::new();
            for (id, addr) in &config.peers {
                let bytes = transport::request(*addr, &Envelope::Command(Command::Balance)).await?;
                if let QueryResponse::Balance(one) = serde_json::from_slice(&bytes)? {
                    balances.extend(one);
                } else {
                    eprintln!("error: invalid response from client {id}");
                }
            }
            println!("Balances:");
            for (id, balance) in balances {
                println!("{id}: ${balance}");
            }
            Ok(())
        }
        ["balance_table"] => {
            println!("Balance Tables:");
            for (id, addr) in &config.peers {
                let bytes =
                    transport::request(*addr, &Envelope::Command(Command::BalanceTable)).await?;
                match serde_json::from_slice(&bytes)? {
                    QueryResponse::BalanceTable(table) => println!("Client {id}: {table:?}"),
                    _ => eprintln!("error: invalid response from client {id}"),
                }
            }
            Ok(())
        }
        ["blockchain"] => {
            println!("Blockchains:");
            for (id, addr) in &config.peers {
                let bytes =
                    transport::request(*addr, &Envelope::Command(Command::Blockchain)).await?;
                match serde_json::from_slice(&bytes)? {
                    QueryResponse::Blockchain(chain) => {
                        println!("Client {id}:");
                        for block in chain {
                            println!(
                                "  Block {}: {:?} (Hash: {})",
                                block.index, block.transaction, block.hash
                            );
                        }
                    }
                    _ => eprintln!("error: invalid response from client {id}"),
                }
            }
            Ok(())
        }
        _ => {
            println!("Invalid command.");
            Ok(())
        }
    }
}
