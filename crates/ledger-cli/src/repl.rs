//! Line-oriented command loop over a chain.

use std::io::{BufRead, Write};
use std::str::FromStr;

use anyhow::{bail, Result};
use ledger_core::{Block, Chain, HashValidator, Transaction};
use tracing::debug;

const INSTRUCTIONS: &str = "\
Valid commands:
  mine: discovers the nonce for a given transaction
  append: appends a new block onto the end of the chain
  remove: removes the last block from the end of the chain
  check: checks that the block chain is valid
  users: prints a list of users
  balance: finds a user's balance
  transactions: prints out the chain of transactions
  blocks: prints out the chain of blocks (for debugging only)
  dump: prints the chain of blocks as JSON
  help: prints this list of commands
  quit: quits the program";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Mine,
    Append,
    Remove,
    Check,
    Users,
    Balance,
    Transactions,
    Blocks,
    Dump,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        Ok(match s.trim().to_lowercase().as_str() {
            "mine" => Command::Mine,
            "append" => Command::Append,
            "remove" => Command::Remove,
            "check" => Command::Check,
            "users" => Command::Users,
            "balance" => Command::Balance,
            "transactions" => Command::Transactions,
            "blocks" => Command::Blocks,
            "dump" => Command::Dump,
            "help" => Command::Help,
            "quit" => Command::Quit,
            _ => return Err(()),
        })
    }
}

pub struct Repl<R, W, V> {
    input: R,
    out: W,
    chain: Chain<V>,
}

impl<R: BufRead, W: Write, V: HashValidator> Repl<R, W, V> {
    pub fn new(chain: Chain<V>, input: R, out: W) -> Self {
        Self { input, out, chain }
    }

    pub fn into_inner(self) -> (Chain<V>, W) {
        (self.chain, self.out)
    }

    /// Run until `quit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        writeln!(self.out, "{INSTRUCTIONS}")?;
        loop {
            write!(self.out, "\nCommand: ")?;
            self.out.flush()?;
            let line = self.read_line()?.unwrap_or_else(|| "quit".to_string());
            let Ok(command) = line.parse::<Command>() else {
                writeln!(self.out, "invalid command: '{line}'. Try again.")?;
                continue;
            };
            debug!(?command, "dispatch");
            if command == Command::Quit {
                break;
            }
            self.dispatch(command)?;
        }
        writeln!(self.out, "\nGoodbye")?;
        self.out.flush()?;
        Ok(())
    }

    fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Mine => {
                let tx = self.read_transaction()?;
                let block = self.chain.mine(tx);
                writeln!(self.out, "Nonce: {}", block.nonce())?;
            }
            Command::Append => {
                let tx = self.read_transaction()?;
                let nonce: i64 = self.read_number("Nonce: ")?;
                let block = Block::with_nonce(
                    self.chain.next_index(),
                    tx,
                    Some(self.chain.tail_hash().clone()),
                    nonce,
                );
                match self.chain.append(block) {
                    Ok(()) => writeln!(self.out, "Appended: {}", self.chain.tail())?,
                    Err(err) => writeln!(self.out, "Not valid information: {err}")?,
                }
            }
            Command::Remove => {
                let removed = self.chain.remove_last().is_some();
                writeln!(
                    self.out,
                    "Remove is {}successful",
                    if removed { "" } else { "not " }
                )?;
            }
            Command::Check => match self.chain.check() {
                Ok(()) => writeln!(self.out, "The block chain is correct")?,
                Err(err) => writeln!(self.out, "The block chain is not correct: {err}")?,
            },
            Command::Users => {
                let users: Vec<String> = self.chain.users().map(|u| format!("'{u}'")).collect();
                writeln!(self.out, "{}", users.join(" "))?;
            }
            Command::Balance => {
                let user = self.prompt("Username: ")?.unwrap_or_default();
                writeln!(
                    self.out,
                    "Balance for '{user}' : {}",
                    self.chain.balance(&user)
                )?;
            }
            Command::Transactions => {
                for tx in &self.chain {
                    writeln!(self.out, "{tx}")?;
                }
            }
            Command::Blocks => {
                for block in self.chain.blocks() {
                    writeln!(self.out, "{block}")?;
                }
            }
            Command::Dump => {
                let blocks: Vec<&Block> = self.chain.blocks().collect();
                writeln!(self.out, "{}", serde_json::to_string_pretty(&blocks)?)?;
            }
            Command::Help => writeln!(self.out, "{INSTRUCTIONS}")?,
            Command::Quit => {}
        }
        Ok(())
    }

    fn read_transaction(&mut self) -> Result<Transaction> {
        let source = self.prompt("Source (return for deposit): ")?.unwrap_or_default();
        let target = self.prompt("Target: ")?.unwrap_or_default();
        let amount: i32 = self.read_number("Amount: ")?;
        Ok(Transaction::new(source, target, amount))
    }

    /// Prompt until the reply parses as `T`.
    fn read_number<T: FromStr>(&mut self, prompt: &str) -> Result<T> {
        loop {
            let Some(line) = self.prompt(prompt)? else {
                bail!("input ended while waiting for {}", prompt.trim_end_matches([':', ' ']));
            };
            match line.trim().parse() {
                Ok(value) => return Ok(value),
                Err(_) => writeln!(self.out, "Invalid number '{line}'. Try again.")?,
            }
        }
    }

    fn prompt(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        self.read_line()
    }

    // The raw line without its terminator; `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}
