use std::collections::HashMap;

use crate::transaction::Transaction;

/// Net balance per user, derived by replaying transactions.
///
/// A user has an entry exactly while some applied transaction names them, so
/// reverting the last transaction that mentions a user removes that user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    accounts: HashMap<String, Account>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Account {
    balance: i64,
    // applied transactions naming this user
    mentions: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay `transactions` in order into a fresh ledger.
    pub fn replay<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut ledger = Self::new();
        for tx in transactions {
            ledger.apply(tx);
        }
        ledger
    }

    pub fn balance(&self, user: &str) -> i64 {
        self.accounts.get(user).map_or(0, |acct| acct.balance)
    }

    /// Debit the source and credit the target; empty names are skipped.
    /// Balances may go negative.
    pub fn apply(&mut self, tx: &Transaction) {
        let amount = i64::from(tx.amount);
        self.credit(&tx.source, -amount);
        self.credit(&tx.target, amount);
    }

    /// Undo [`Ledger::apply`] for the same transaction.
    pub fn revert(&mut self, tx: &Transaction) {
        let amount = i64::from(tx.amount);
        self.uncredit(&tx.target, amount);
        self.uncredit(&tx.source, -amount);
    }

    /// Whether applying `tx` keeps its source solvent. Mints are always
    /// affordable.
    pub fn can_afford(&self, tx: &Transaction) -> bool {
        tx.is_mint() || self.balance(&tx.source) >= i64::from(tx.amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.accounts
            .iter()
            .map(|(user, acct)| (user.as_str(), acct.balance))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn credit(&mut self, user: &str, delta: i64) {
        if user.is_empty() {
            return;
        }
        let acct = self.accounts.entry(user.to_owned()).or_default();
        acct.balance += delta;
        acct.mentions += 1;
    }

    fn uncredit(&mut self, user: &str, delta: i64) {
        let Some(acct) = self.accounts.get_mut(user) else {
            return;
        };
        acct.balance -= delta;
        acct.mentions = acct.mentions.saturating_sub(1);
        if acct.mentions == 0 {
            self.accounts.remove(user);
        }
    }
}
