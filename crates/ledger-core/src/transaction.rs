use std::fmt;

use serde::{Deserialize, Serialize};

/// A transfer of `amount` from `source` to `target`.
///
/// An empty `source` mints (nothing is debited) and an empty `target` burns
/// (nothing is credited). Nothing is validated here; the chain decides what is
/// legal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub(crate) source: String,
    pub(crate) target: String,
    pub(crate) amount: i32,
}

impl Transaction {
    pub fn new(source: impl Into<String>, target: impl Into<String>, amount: i32) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            amount,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn amount(&self) -> i32 {
        self.amount
    }

    pub fn is_mint(&self) -> bool {
        self.source.is_empty()
    }

    pub fn is_burn(&self) -> bool {
        self.target.is_empty()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Source: {}, Target: {}, Amount: {}]",
            self.source, self.target, self.amount
        )
    }
}
