use thiserror::Error;

use crate::hash::Hash;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("block {index}: hash {hash} does not satisfy the validator")]
    InvalidHash { index: u32, hash: Hash },

    #[error("block {index}: stored hash {stored} does not match contents (computed {computed})")]
    HashMismatch {
        index: u32,
        stored: Hash,
        computed: Hash,
    },

    #[error("block {index}: previous hash {found} does not match {expected}")]
    BrokenLink {
        index: u32,
        expected: LinkTarget,
        found: LinkTarget,
    },

    #[error("block {index}: negative amount {amount}")]
    NegativeAmount { index: u32, amount: i32 },

    #[error("block {index}: '{account}' cannot afford {amount} (balance {balance})")]
    InsufficientFunds {
        index: u32,
        account: String,
        amount: i32,
        balance: i64,
    },

    #[error("chain already holds the maximum of {len} blocks")]
    ChainFull { len: usize },

    #[error("byte {index} out of range for hash of length {len}")]
    ByteOutOfRange { index: usize, len: usize },

    #[error("invalid hex hash: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl LedgerError {
    /// Index of the block a chain violation refers to.
    pub fn block_index(&self) -> Option<u32> {
        match self {
            LedgerError::InvalidHash { index, .. }
            | LedgerError::HashMismatch { index, .. }
            | LedgerError::BrokenLink { index, .. }
            | LedgerError::NegativeAmount { index, .. }
            | LedgerError::InsufficientFunds { index, .. } => Some(*index),
            LedgerError::ChainFull { .. }
            | LedgerError::ByteOutOfRange { .. }
            | LedgerError::InvalidHex(_) => None,
        }
    }
}

/// What a block's previous-hash field points at: a predecessor, or nothing (genesis).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Genesis,
    Block(Hash),
}

impl From<Option<&Hash>> for LinkTarget {
    fn from(hash: Option<&Hash>) -> Self {
        match hash {
            Some(h) => LinkTarget::Block(h.clone()),
            None => LinkTarget::Genesis,
        }
    }
}

impl std::fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkTarget::Genesis => write!(f, "<none>"),
            LinkTarget::Block(h) => write!(f, "{h}"),
        }
    }
}
