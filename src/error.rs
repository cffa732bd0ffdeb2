use crate::Address;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Occurs when a value has no registered encoding.
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),
    /// Occurs when a zero-length code is appended to the arena.
    #[error("Cannot append an empty code")]
    EmptyCode,
    /// Occurs when a code that already has an address is bound a second time. Callers that want
    /// idempotent storage must look the code up first.
    #[error("Code already has an address")]
    DuplicateCode,
    /// Occurs when deleting a code that has no binding in the trie.
    #[error("No trie branch holds this code")]
    UnknownBranch,
    /// A code ended before all of its declared parts could be read.
    #[error("Expected code length {expected}, but got {actual} on step [{step}]")]
    MalformedCode {
        step: &'static str,
        actual: usize,
        expected: usize,
    },
    /// Basic decoding failure: unknown footer, invalid UTF-8, non-canonical parts and the like.
    #[error("Basic data encoding failure: {0}")]
    BadEncode(String),
    /// No arena chunk covers the requested address.
    #[error("No code stored at address {0}")]
    AddressNotFound(Address),
    /// The address doesn't fit in the widest address part.
    #[error("Address {0} is too large to embed in a part")]
    AddressOverflow(Address),
    /// A Duple tree of entries had a leaf that wasn't a pair.
    #[error("Duple tree mixes pair and non-pair leaves")]
    NonFlattenableDuple,
    /// A balanced sequence needs at least two items.
    #[error("Cannot build a balanced sequence from {0} items")]
    SequenceTooShort(usize),
    /// Decoding hit a nesting limit.
    #[error("Hit parsing limit: {0}")]
    ParseLimit(String),
}
