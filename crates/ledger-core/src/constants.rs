pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const GENESIS_INDEX: u32 = 0;
/// Zero-byte prefix required by the default validator.
pub const DEFAULT_DIFFICULTY: usize = 3;
