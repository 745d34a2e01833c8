mod repl;

use std::io;

use anyhow::Result;
use clap::Parser;
use ledger_core::{constants::DEFAULT_DIFFICULTY, Chain, Hash, HashValidator};
use ledger_core::{LeadingZeroBits, LeadingZeroBytes};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::repl::Repl;

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Interactive proof-of-work ledger")]
struct Cli {
    /// Number of leading zero bytes a block hash must have
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: usize,

    /// Require this many leading zero bits instead of whole zero bytes
    #[arg(long, conflicts_with = "difficulty")]
    zero_bits: Option<u32>,
}

/// The validator chosen on the command line.
#[derive(Clone, Copy, Debug)]
enum Difficulty {
    Bytes(LeadingZeroBytes),
    Bits(LeadingZeroBits),
}

impl From<&Cli> for Difficulty {
    fn from(cli: &Cli) -> Self {
        match cli.zero_bits {
            Some(bits) => Difficulty::Bits(LeadingZeroBits(bits)),
            None => Difficulty::Bytes(LeadingZeroBytes(cli.difficulty)),
        }
    }
}

impl HashValidator for Difficulty {
    fn is_valid(&self, hash: &Hash) -> bool {
        match self {
            Difficulty::Bytes(v) => v.is_valid(hash),
            Difficulty::Bits(v) => v.is_valid(hash),
        }
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .pretty()
        .init();

    let cli = Cli::parse();
    let difficulty = Difficulty::from(&cli);
    info!(?difficulty, "mining genesis block");
    let chain = Chain::new(difficulty);

    let stdin = io::stdin();
    let mut repl = Repl::new(chain, stdin.lock(), io::stdout());
    repl.run()
}
