//! Blocks, their digest, and the proof-of-work search.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::hash::Hash;
use crate::transaction::Transaction;
use crate::validator::HashValidator;

/// One transaction sealed with a nonce and linked to its predecessor.
///
/// `hash` is expected to equal [`Block::compute_hash`] over the other fields.
/// Blocks built here always satisfy that; deserialized blocks might not, which
/// is why the chain re-derives it before accepting anything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub(crate) index: u32,
    pub(crate) transaction: Transaction,
    pub(crate) previous_hash: Option<Hash>,
    pub(crate) nonce: i64,
    pub(crate) hash: Hash,
}

impl Block {
    /// Search random nonces until the block's hash satisfies `validator`.
    /// Blocks until a nonce is found; there is no attempt limit.
    pub fn mine<V>(
        index: u32,
        transaction: Transaction,
        previous_hash: Option<Hash>,
        validator: &V,
    ) -> Self
    where
        V: HashValidator + ?Sized,
    {
        let base = Sha256::new_with_prefix(Self::fields_preimage(
            index,
            &transaction,
            previous_hash.as_ref(),
        ));
        let mut rng = rand::thread_rng();
        let mut attempts: u64 = 0;
        loop {
            let nonce: i64 = rng.gen();
            attempts += 1;
            let digest = base.clone().chain_update(nonce.to_be_bytes()).finalize();
            let hash = Hash::new(digest.as_slice());
            if validator.is_valid(&hash) {
                info!(index, nonce, attempts, %hash, "mined block");
                return Self {
                    index,
                    transaction,
                    previous_hash,
                    nonce,
                    hash,
                };
            }
        }
    }

    /// Rebuild a block from a nonce found elsewhere. The digest is computed
    /// once and is not checked against any validator.
    pub fn with_nonce(
        index: u32,
        transaction: Transaction,
        previous_hash: Option<Hash>,
        nonce: i64,
    ) -> Self {
        let hash = Self::compute_hash(index, &transaction, previous_hash.as_ref(), nonce);
        Self {
            index,
            transaction,
            previous_hash,
            nonce,
            hash,
        }
    }

    /// SHA-256 over [`Block::preimage`].
    pub fn compute_hash(
        index: u32,
        transaction: &Transaction,
        previous_hash: Option<&Hash>,
        nonce: i64,
    ) -> Hash {
        let digest = Sha256::digest(Self::preimage(index, transaction, previous_hash, nonce));
        Hash::new(digest.as_slice())
    }

    /// The digest input: big-endian index, source bytes, target bytes,
    /// big-endian amount, previous hash bytes (only when present), big-endian
    /// nonce. Names are not delimited, so ("ab", "c") and ("a", "bc") collide.
    pub fn preimage(
        index: u32,
        transaction: &Transaction,
        previous_hash: Option<&Hash>,
        nonce: i64,
    ) -> Vec<u8> {
        let mut bytes = Self::fields_preimage(index, transaction, previous_hash);
        bytes.extend_from_slice(&nonce.to_be_bytes());
        bytes
    }

    // Everything but the nonce, so mining can hash this prefix once.
    fn fields_preimage(
        index: u32,
        transaction: &Transaction,
        previous_hash: Option<&Hash>,
    ) -> Vec<u8> {
        let prev_len = previous_hash.map_or(0, Hash::len);
        let mut bytes = Vec::with_capacity(
            4 + transaction.source.len() + transaction.target.len() + 4 + prev_len + 8,
        );
        bytes.extend_from_slice(&index.to_be_bytes());
        bytes.extend_from_slice(transaction.source.as_bytes());
        bytes.extend_from_slice(transaction.target.as_bytes());
        bytes.extend_from_slice(&transaction.amount.to_be_bytes());
        if let Some(prev) = previous_hash {
            bytes.extend_from_slice(prev.as_bytes());
        }
        bytes
    }

    /// The digest of this block's fields, independent of the stored hash.
    pub fn recompute_hash(&self) -> Hash {
        Self::compute_hash(
            self.index,
            &self.transaction,
            self.previous_hash.as_ref(),
            self.nonce,
        )
    }

    pub fn is_consistent(&self) -> bool {
        self.recompute_hash() == self.hash
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn previous_hash(&self) -> Option<&Hash> {
        self.previous_hash.as_ref()
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {} (Transaction: {}, Nonce: {}, prevHash: ",
            self.index, self.transaction, self.nonce
        )?;
        match &self.previous_hash {
            Some(prev) => write!(f, "{prev}")?,
            None => f.write_str("null")?,
        }
        write!(f, ", hash: {})", self.hash)
    }
}
