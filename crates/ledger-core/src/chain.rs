//! The block chain: an append/remove-at-tail sequence of blocks and the
//! balance ledger derived from it.

use std::iter::Map;
use std::slice;

use tracing::{debug, info, warn};

use crate::block::Block;
use crate::constants::GENESIS_INDEX;
use crate::error::{LedgerError, LinkTarget, Result};
use crate::hash::Hash;
use crate::ledger::Ledger;
use crate::transaction::Transaction;
use crate::validator::HashValidator;

pub type Transactions<'a> = Map<slice::Iter<'a, Block>, fn(&'a Block) -> &'a Transaction>;

/// An in-memory chain that always holds at least its genesis block.
///
/// `append` verifies structure only (validator, digest, linkage) and lets
/// balances go negative; `check` replays everything and additionally audits
/// amounts and solvency. Mutation needs `&mut self`, so callers sharing a chain
/// across threads must wrap it in a lock.
///
/// Block indices are `u32`, so a chain holds at most `u32::MAX + 1` blocks;
/// `append` fails with [`LedgerError::ChainFull`] beyond that.
#[derive(Clone)]
pub struct Chain<V> {
    validator: V,
    blocks: Vec<Block>,
    ledger: Ledger,
}

impl<V: HashValidator> Chain<V> {
    /// Mine the genesis block with `validator` and start an empty ledger.
    pub fn new(validator: V) -> Self {
        let genesis = Block::mine(
            GENESIS_INDEX,
            Transaction::new("", "", 0),
            None,
            &validator,
        );
        info!(hash = %genesis.hash, "chain created");
        Self {
            validator,
            blocks: vec![genesis],
            ledger: Ledger::new(),
        }
    }

    /// Mine the block that would come next, without appending it.
    pub fn mine(&self, transaction: Transaction) -> Block {
        Block::mine(
            self.next_index(),
            transaction,
            Some(self.tail_hash().clone()),
            &self.validator,
        )
    }

    /// Append `block` at the tail. On error nothing changes.
    ///
    /// The source's ability to pay is not checked here; see [`Chain::check`].
    pub fn append(&mut self, block: Block) -> Result<()> {
        if u32::try_from(self.blocks.len()).is_err() {
            return Err(LedgerError::ChainFull {
                len: self.blocks.len(),
            });
        }
        if let Err(err) = self.verify_next(&block) {
            warn!(%err, "rejected block");
            return Err(err);
        }
        self.ledger.apply(&block.transaction);
        info!(index = block.index, hash = %block.hash, "appended block");
        self.blocks.push(block);
        Ok(())
    }

    /// Detach the tail block and undo its ledger effect. Returns `None`, and
    /// changes nothing, when only the genesis block is left.
    pub fn remove_last(&mut self) -> Option<Block> {
        if self.blocks.len() <= 1 {
            debug!("refusing to remove the genesis block");
            return None;
        }
        let block = self.blocks.pop()?;
        self.ledger.revert(&block.transaction);
        info!(index = block.index, "removed block");
        Some(block)
    }

    /// `user`'s balance, replayed from every transaction in the chain.
    pub fn balance(&self, user: &str) -> i64 {
        Ledger::replay(self.transactions()).balance(user)
    }

    /// Replay the whole chain into a scratch ledger and report the first
    /// violation: digest mismatch, invalid hash, broken link, negative amount,
    /// or a source that cannot afford its transfer.
    pub fn check(&self) -> Result<()> {
        let mut scratch = Ledger::new();
        let mut previous: Option<&Hash> = None;
        for (position, block) in self.blocks.iter().enumerate() {
            let index = block_index(position);
            if let Err(err) = self.verify_at(index, block, previous, &scratch) {
                debug!(%err, "chain check failed");
                return Err(err);
            }
            scratch.apply(&block.transaction);
            previous = Some(&block.hash);
        }
        debug!(blocks = self.blocks.len(), "chain check passed");
        Ok(())
    }

    pub fn is_correct(&self) -> bool {
        self.check().is_ok()
    }

    fn verify_next(&self, block: &Block) -> Result<()> {
        if !self.validator.is_valid(&block.hash) {
            return Err(LedgerError::InvalidHash {
                index: block.index,
                hash: block.hash.clone(),
            });
        }
        let computed = block.recompute_hash();
        if computed != block.hash {
            return Err(LedgerError::HashMismatch {
                index: block.index,
                stored: block.hash.clone(),
                computed,
            });
        }
        let tail = self.tail_hash();
        if block.previous_hash.as_ref() != Some(tail) {
            return Err(LedgerError::BrokenLink {
                index: block.index,
                expected: LinkTarget::Block(tail.clone()),
                found: block.previous_hash.as_ref().into(),
            });
        }
        Ok(())
    }

    fn verify_at(
        &self,
        index: u32,
        block: &Block,
        previous: Option<&Hash>,
        scratch: &Ledger,
    ) -> Result<()> {
        let computed = block.recompute_hash();
        if computed != block.hash {
            return Err(LedgerError::HashMismatch {
                index,
                stored: block.hash.clone(),
                computed,
            });
        }
        if !self.validator.is_valid(&block.hash) {
            return Err(LedgerError::InvalidHash {
                index,
                hash: block.hash.clone(),
            });
        }
        if block.previous_hash.as_ref() != previous {
            return Err(LedgerError::BrokenLink {
                index,
                expected: previous.into(),
                found: block.previous_hash.as_ref().into(),
            });
        }
        let tx = &block.transaction;
        if tx.amount < 0 {
            return Err(LedgerError::NegativeAmount {
                index,
                amount: tx.amount,
            });
        }
        if !scratch.can_afford(tx) {
            return Err(LedgerError::InsufficientFunds {
                index,
                account: tx.source.clone(),
                amount: tx.amount,
                balance: scratch.balance(&tx.source),
            });
        }
        Ok(())
    }
}

impl<V> Chain<V> {
    /// Number of blocks, genesis included. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn tail(&self) -> &Block {
        // blocks is never empty
        &self.blocks[self.blocks.len() - 1]
    }

    /// The hash the next block must link to.
    pub fn tail_hash(&self) -> &Hash {
        &self.tail().hash
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// The incrementally maintained ledger. Always agrees with a full replay.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn blocks(&self) -> slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn transactions<'a>(&'a self) -> Transactions<'a> {
        let project: fn(&'a Block) -> &'a Transaction = Block::transaction;
        self.blocks.iter().map(project)
    }

    /// Every non-empty name that appears as a source or target, in order of
    /// first appearance.
    pub fn users(&self) -> impl Iterator<Item = &str> + '_ {
        let mut seen = std::collections::HashSet::new();
        self.transactions()
            .flat_map(|tx| [tx.source(), tx.target()])
            .filter(|name| !name.is_empty())
            .filter(move |name| seen.insert(*name))
    }

    /// The index the next block takes: the current length.
    pub fn next_index(&self) -> u32 {
        block_index(self.blocks.len())
    }
}

// Positions past u32::MAX cannot occur; append stops there.
fn block_index(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

impl<'a, V> IntoIterator for &'a Chain<V> {
    type Item = &'a Transaction;
    type IntoIter = Transactions<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::LeadingZeroBytes;

    fn chain() -> Chain<LeadingZeroBytes> {
        Chain::new(LeadingZeroBytes(1))
    }

    fn mine_and_append(
        chain: &mut Chain<LeadingZeroBytes>,
        source: &str,
        target: &str,
        amount: i32,
    ) {
        let block = chain.mine(Transaction::new(source, target, amount));
        chain.append(block).unwrap();
    }

    #[test]
    fn genesis_block_example() {
        let chain = chain();
        assert_eq!(chain.len(), 1);
        let genesis = chain.tail();
        assert_eq!(genesis.index(), GENESIS_INDEX);
        assert!(genesis.previous_hash().is_none());
        assert_eq!(genesis.transaction(), &Transaction::new("", "", 0));
        assert_eq!(genesis.hash().byte_at(0), Ok(0));
        assert!(chain.ledger().is_empty());
        assert!(chain.is_correct());
        assert_eq!(chain.check(), Ok(()));
    }

    #[test]
    fn mine_addresses_the_tail_without_appending() {
        let chain = chain();
        let block = chain.mine(Transaction::new("", "Alexis", 50));
        assert_eq!(block.index(), 1);
        assert_eq!(block.previous_hash(), Some(chain.tail_hash()));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.balance("Alexis"), 0);
    }

    #[test]
    fn append_rejects_hash_failing_validator() {
        let mut chain = chain();
        let tx = Transaction::new("", "Alexis", 50);
        let block = (0i64..)
            .map(|nonce| Block::with_nonce(1, tx.clone(), Some(chain.tail_hash().clone()), nonce))
            .find(|b| !chain.validator().is_valid(b.hash()))
            .unwrap();

        let err = chain.append(block).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidHash { index: 1, .. }));
        assert_eq!(chain.len(), 1);
        assert!(chain.ledger().is_empty());
    }

    #[test]
    fn append_rejects_hash_not_matching_contents() {
        let mut chain = chain();
        let mut block = chain.mine(Transaction::new("", "Alexis", 50));
        block.transaction.amount = 5_000;

        let err = chain.append(block).unwrap_err();
        assert!(matches!(err, LedgerError::HashMismatch { index: 1, .. }));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.balance("Alexis"), 0);
        assert!(chain.ledger().is_empty());
    }

    #[test]
    fn append_rejects_stale_previous_hash() {
        let mut chain = chain();
        let genesis_hash = chain.tail_hash().clone();
        mine_and_append(&mut chain, "", "Alexis", 50);
        let before = chain.ledger().clone();

        let stale = Block::mine(
            2,
            Transaction::new("Alexis", "Blake", 10),
            Some(genesis_hash.clone()),
            chain.validator(),
        );
        let err = chain.append(stale).unwrap_err();
        assert_eq!(
            err,
            LedgerError::BrokenLink {
                index: 2,
                expected: LinkTarget::Block(chain.tail_hash().clone()),
                found: LinkTarget::Block(genesis_hash),
            }
        );
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.ledger(), &before);
    }

    #[test]
    fn append_rejects_missing_previous_hash() {
        let mut chain = chain();
        let orphan = Block::mine(1, Transaction::new("", "Alexis", 5), None, chain.validator());
        let err = chain.append(orphan).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::BrokenLink {
                found: LinkTarget::Genesis,
                ..
            }
        ));
    }

    #[test]
    fn remove_last_keeps_genesis() {
        let mut chain = chain();
        assert!(chain.remove_last().is_none());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn remove_then_append_round_trip() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 50);
        mine_and_append(&mut chain, "Alexis", "Blake", 20);
        let ledger_before = chain.ledger().clone();
        let tail_before = chain.tail().clone();

        let removed = chain.remove_last().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.balance("Alexis"), 50);
        assert_eq!(chain.ledger().balance("Blake"), 0);

        chain.append(removed).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.tail(), &tail_before);
        assert_eq!(chain.ledger(), &ledger_before);
    }

    #[test]
    fn remove_last_matches_full_replay() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 50);
        chain.remove_last().unwrap();
        assert_eq!(chain.ledger(), &Ledger::replay(chain.transactions()));
        assert!(chain.ledger().is_empty());
        assert_eq!(chain.ledger().iter().count(), 0);

        mine_and_append(&mut chain, "", "Alexis", 50);
        mine_and_append(&mut chain, "Alexis", "Blake", 50);
        chain.remove_last().unwrap();
        assert_eq!(chain.ledger(), &Ledger::replay(chain.transactions()));
        assert_eq!(chain.ledger().len(), 1);
        assert_eq!(chain.ledger().balance("Alexis"), 50);
    }

    #[test]
    fn next_index_tracks_length() {
        let mut chain = chain();
        assert_eq!(chain.next_index(), 1);
        mine_and_append(&mut chain, "", "Alexis", 50);
        assert_eq!(chain.next_index(), 2);
        assert_eq!(chain.mine(Transaction::new("Alexis", "Blake", 1)).index(), 2);
    }

    #[test]
    fn block_index_saturates_instead_of_wrapping() {
        assert_eq!(block_index(7), 7);
        assert_eq!(block_index(u32::MAX as usize), u32::MAX);
        if let Some(past) = (u32::MAX as usize).checked_add(1) {
            assert_eq!(block_index(past), u32::MAX);
        }
    }

    #[test]
    fn check_flags_hash_the_validator_rejects() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 50);
        let strict = Chain {
            validator: LeadingZeroBytes(32),
            blocks: chain.blocks.clone(),
            ledger: chain.ledger.clone(),
        };
        let err = strict.check().unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidHash {
                index: 0,
                hash: chain.blocks[0].hash.clone(),
            }
        );
        assert!(!strict.is_correct());
    }

    #[test]
    fn check_flags_block_without_previous_hash() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 50);
        mine_and_append(&mut chain, "Alexis", "Blake", 25);
        let expected = chain.blocks[1].hash.clone();

        let unlinked = Block::mine(2, chain.blocks[2].transaction.clone(), None, &chain.validator);
        chain.blocks[2] = unlinked;

        assert_eq!(
            chain.check(),
            Err(LedgerError::BrokenLink {
                index: 2,
                expected: LinkTarget::Block(expected),
                found: LinkTarget::Genesis,
            })
        );
    }

    #[test]
    fn check_flags_genesis_with_previous_hash() {
        let mut chain = chain();
        let bogus = Hash::from([7u8; 32]);
        let genesis = Block::mine(
            GENESIS_INDEX,
            Transaction::new("", "", 0),
            Some(bogus.clone()),
            &chain.validator,
        );
        chain.blocks[0] = genesis;

        assert_eq!(
            chain.check(),
            Err(LedgerError::BrokenLink {
                index: 0,
                expected: LinkTarget::Genesis,
                found: LinkTarget::Block(bogus),
            })
        );
    }

    #[test]
    fn tampering_with_a_non_tail_block_is_detected() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 50);
        mine_and_append(&mut chain, "Alexis", "Blake", 25);
        assert!(chain.is_correct());

        chain.blocks[1].transaction.amount = 500;

        let err = chain.check().unwrap_err();
        assert!(matches!(err, LedgerError::HashMismatch { index: 1, .. }));
        assert_eq!(err.block_index(), Some(1));
        assert!(!chain.is_correct());
    }

    #[test]
    fn check_flags_negative_amount() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 50);
        mine_and_append(&mut chain, "Alexis", "Blake", -5);
        assert_eq!(
            chain.check(),
            Err(LedgerError::NegativeAmount {
                index: 2,
                amount: -5
            })
        );
    }

    #[test]
    fn check_flags_overdraft_that_append_allowed() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 5);
        mine_and_append(&mut chain, "Alexis", "Blake", 10);
        assert_eq!(chain.balance("Alexis"), -5);
        assert_eq!(
            chain.check(),
            Err(LedgerError::InsufficientFunds {
                index: 2,
                account: "Alexis".to_string(),
                amount: 10,
                balance: 5,
            })
        );
    }

    #[test]
    fn check_does_not_touch_live_state() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 5);
        mine_and_append(&mut chain, "Alexis", "Blake", 10);
        let ledger = chain.ledger().clone();
        let _ = chain.check();
        let _ = chain.balance("Alexis");
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.ledger(), &ledger);
    }

    #[test]
    fn users_are_distinct_and_in_first_seen_order() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 50);
        mine_and_append(&mut chain, "Alexis", "Blake", 20);
        mine_and_append(&mut chain, "Blake", "Alexis", 5);
        mine_and_append(&mut chain, "Cassidy", "", 0);

        let users: Vec<&str> = chain.users().collect();
        assert_eq!(users, vec!["Alexis", "Blake", "Cassidy"]);
        // restartable
        assert_eq!(chain.users().count(), 3);
    }

    #[test]
    fn traversals_follow_chain_order() {
        let mut chain = chain();
        mine_and_append(&mut chain, "", "Alexis", 50);
        mine_and_append(&mut chain, "Alexis", "Blake", 20);

        let indices: Vec<u32> = chain.blocks().map(Block::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let amounts: Vec<i32> = (&chain).into_iter().map(Transaction::amount).collect();
        assert_eq!(amounts, vec![0, 50, 20]);
        assert_eq!(chain.transactions().count(), chain.len());
    }
}
