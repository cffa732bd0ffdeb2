//! turtle-pack is a content-addressed binary encoding for structured values. Every value becomes
//! a short byte string, its *code*, and every sufficiently large piece of a value is stored once
//! in an append-only arena and referenced by address from then on. Equal values produce equal
//! codes, so duplicated structure costs a few bytes per reuse.
//!
//! The pieces:
//!
//! - An [`Arena`] of immutable codes laid end to end in one address space. A code's address is
//! 	the index of its last byte.
//! - A [`CodeTrie`], a bitwise prefix trie from codes back to their addresses, which is how an
//! 	encoder finds out a code is already stored.
//! - A [`Store`] pairing the two. Stores can be snapshotted at any earlier address cheaply: the
//! 	snapshot shares chunk bytes and trie nodes with the original.
//! - The [`Codec`], which turns a [`Value`] into a code and back. Codes end in a footer byte that
//! 	names the value type and says, for each part, whether it is inlined or how many address bytes
//! 	it takes. The [`Registry`] fixes that footer table.
//! - [`Duple`], the balanced pair tree used to store sequences of any length with two-part codes.
//!
//! Values are the usual dynamic data model: undefined, null, booleans, numbers, dates, byte
//! strings, strings, ordered pairs, arrays (dense or sparse), and ordered objects.
//!
//! ```
//! use turtle_pack::{Codec, Store, Value};
//!
//! let codec = Codec::new();
//! let mut store = Store::new();
//! let value = Value::object([("name", Value::from("turtle")), ("legs", Value::from(4))]);
//! let code = codec.encode(&mut store, &value).unwrap();
//! assert_eq!(codec.decode(&store, &code).unwrap(), value);
//! ```
//!
//! The byte layout is described in [`format`].

mod address;
mod arena;
mod codec;
mod duple;
mod error;
mod marker;
mod store;
mod trie;
mod value;

pub mod format;

#[cfg(test)]
mod proptests;

pub use self::address::{address_width, decode_address, encode_address};
pub use self::arena::{Arena, Chunk};
pub use self::codec::{Codec, Inspection, PartInspection};
pub use self::duple::{flatten_pairs, flatten_value, Duple, Side};
pub use self::error::{Error, Result};
pub use self::marker::{CodecType, Registry};
pub use self::store::Store;
pub use self::trie::{count_matching_bits, CodeTrie};
pub use self::value::{SparseArray, Value};

/// A global byte index into an arena. Codes are addressed by the index of their footer byte.
pub type Address = u64;

/// Maximum nesting depth of parts within a code, counted the same way when encoding and
/// decoding. Every level of a pair tree counts, as do the byte codes inside strings and numbers.
pub const MAX_DEPTH: usize = 512;

/// Widest address a part can hold, in bytes. Arenas past 4 GiB can't be addressed.
pub const MAX_ADDRESS_WIDTH: usize = 4;

/// Options per part: inline, or an address of 1 to [`MAX_ADDRESS_WIDTH`] bytes.
pub const OPTIONS_PER_PART: usize = MAX_ADDRESS_WIDTH + 1;

/// Longest byte string stored directly before its footer. Longer ones are split into words of
/// this size.
pub const SHORT_BYTES_MAX: usize = 4;
