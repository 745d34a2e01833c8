//! Difficulty predicates deciding whether a hash is acceptable.

use crate::constants::BYTE;
use crate::hash::Hash;

/// Decides whether a hash meets a difficulty target. Any `Fn(&Hash) -> bool`
/// is a validator.
pub trait HashValidator {
    fn is_valid(&self, hash: &Hash) -> bool;
}

impl<F> HashValidator for F
where
    F: Fn(&Hash) -> bool,
{
    fn is_valid(&self, hash: &Hash) -> bool {
        self(hash)
    }
}

/// Valid iff the hash has at least `n` bytes and the first `n` are zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeadingZeroBytes(pub usize);

impl HashValidator for LeadingZeroBytes {
    fn is_valid(&self, hash: &Hash) -> bool {
        hash.len() >= self.0 && hash.as_bytes()[..self.0].iter().all(|b| *b == 0)
    }
}

/// Valid iff the hash starts with at least `n` zero bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeadingZeroBits(pub u32);

impl HashValidator for LeadingZeroBits {
    fn is_valid(&self, hash: &Hash) -> bool {
        count_leading_zero_bits(hash.as_bytes()) >= self.0
    }
}

pub fn count_leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut total = 0u32;
    for b in bytes {
        if *b == 0 {
            total += BYTE as u32;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}
