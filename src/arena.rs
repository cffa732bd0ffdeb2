//! Append-only byte arena.
//!
//! The arena is a list of whole, immutable codes laid end to end in one global byte-address space.
//! A code's address is the global index of its last byte (its footer). Codes are never split,
//! merged, or rewritten, so a snapshot of the arena only needs to truncate the chunk list: the
//! chunk contents are shared by reference.

use std::sync::Arc;

use crate::{
    error::{Error, Result},
    Address,
};

/// One stored code, along with the arena length right after it was appended.
#[derive(Clone, Debug)]
pub struct Chunk {
    code: Arc<[u8]>,
    end: Address,
}

impl Chunk {
    /// The stored code.
    pub fn code(&self) -> &Arc<[u8]> {
        &self.code
    }

    /// The address of this chunk: the global index of its footer byte.
    pub fn address(&self) -> Address {
        self.end - 1
    }

    fn start(&self) -> Address {
        self.end - self.code.len() as Address
    }

    fn contains(&self, byte_index: Address) -> bool {
        byte_index >= self.start() && byte_index < self.end
    }
}

#[derive(Clone, Debug, Default)]
pub struct Arena {
    chunks: Vec<Chunk>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of bytes stored.
    pub fn byte_len(&self) -> Address {
        self.chunks.last().map_or(0, |c| c.end)
    }

    /// Number of stored codes.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Append a code, returning its address. Empty codes are rejected.
    pub fn append(&mut self, code: impl Into<Arc<[u8]>>) -> Result<Address> {
        let code = code.into();
        if code.is_empty() {
            return Err(Error::EmptyCode);
        }
        let end = self.byte_len() + code.len() as Address;
        self.chunks.push(Chunk { code, end });
        Ok(end - 1)
    }

    /// Find the index of the chunk covering a global byte index.
    fn chunk_index(&self, byte_index: Address) -> Option<usize> {
        let last = self.chunks.len().checked_sub(1)?;
        // Lookups are heavily biased towards the oldest and the newest codes.
        if self.chunks[0].contains(byte_index) {
            return Some(0);
        }
        if self.chunks[last].contains(byte_index) {
            return Some(last);
        }
        if byte_index >= self.chunks[last].end {
            return None;
        }
        let index = self.chunks.partition_point(|c| c.end <= byte_index);
        (index < self.chunks.len()).then_some(index)
    }

    /// Get the whole code whose byte range covers `address`.
    pub fn get_code(&self, address: Address) -> Result<&Arc<[u8]>> {
        self.chunk_index(address)
            .map(|index| &self.chunks[index].code)
            .ok_or(Error::AddressNotFound(address))
    }

    /// Get the code whose footer is at exactly `address`.
    pub fn code_at(&self, address: Address) -> Result<&Arc<[u8]>> {
        self.chunk_index(address)
            .map(|index| &self.chunks[index])
            .filter(|chunk| chunk.address() == address)
            .map(|chunk| &chunk.code)
            .ok_or(Error::AddressNotFound(address))
    }

    /// Get a single byte by global index. Meant for debugging and inspection.
    pub fn byte_at(&self, byte_index: Address) -> Option<u8> {
        let chunk = &self.chunks[self.chunk_index(byte_index)?];
        chunk
            .code
            .get((byte_index - chunk.start()) as usize)
            .copied()
    }

    /// Make a view of the arena that ends with the chunk covering `address`. Chunk contents are
    /// shared, not copied.
    pub fn clone_at(&self, address: Address) -> Result<Arena> {
        let index = self
            .chunk_index(address)
            .ok_or(Error::AddressNotFound(address))?;
        Ok(Arena {
            chunks: self.chunks[..=index].to_vec(),
        })
    }

    /// Iterate over the stored chunks, oldest first.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }
}
