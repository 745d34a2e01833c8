//! In-memory proof-of-work ledger: hash-linked blocks, one transaction each,
//! with balances derived by replaying the chain.

pub mod block;
pub mod chain;
pub mod constants;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod transaction;
pub mod validator;

pub use block::Block;
pub use chain::Chain;
pub use error::{LedgerError, LinkTarget, Result};
pub use hash::Hash;
pub use ledger::Ledger;
pub use transaction::Transaction;
pub use validator::{HashValidator, LeadingZeroBits, LeadingZeroBytes};
