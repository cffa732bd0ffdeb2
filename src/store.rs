//! An arena paired with the trie that indexes it.
//!
//! The store is the only place codes get appended, so every stored code has exactly one address
//! and the trie always agrees with the arena. It is single-writer: callers must serialize
//! `append` calls. Readers that need a stable view of an older state take a snapshot with
//! [`Store::clone_at`]; the snapshot and the original share chunk bytes and trie nodes, but evolve
//! independently afterwards.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    arena::Arena,
    error::{Error, Result},
    trie::CodeTrie,
    Address,
};

#[derive(Clone, Debug, Default)]
pub struct Store {
    arena: Arena,
    trie: CodeTrie,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a code that isn't stored yet, returning its new address.
    pub fn append(&mut self, code: impl Into<Arc<[u8]>>) -> Result<Address> {
        let code: Arc<[u8]> = code.into();
        if code.is_empty() {
            return Err(Error::EmptyCode);
        }
        if self.trie.get(&code).is_some() {
            return Err(Error::DuplicateCode);
        }
        let address = self.arena.append(Arc::clone(&code))?;
        self.trie.set(code, address)?;
        trace!(address, len = self.arena.byte_len(), "appended code");
        Ok(address)
    }

    /// Find the address a code was stored at.
    pub fn address_of(&self, code: &[u8]) -> Option<Address> {
        self.trie.get(code)
    }

    /// Get the code whose byte range covers `address`.
    pub fn get_code(&self, address: Address) -> Result<&[u8]> {
        self.arena.get_code(address).map(|code| &code[..])
    }

    /// Get the code stored at exactly `address`, the index of its footer byte.
    pub fn code_at(&self, address: Address) -> Result<&[u8]> {
        self.arena.code_at(address).map(|code| &code[..])
    }

    /// Get a single byte by global index. Meant for debugging.
    pub fn byte_at(&self, byte_index: Address) -> Option<u8> {
        self.arena.byte_at(byte_index)
    }

    /// Total bytes stored. The next code appended ends at `byte_len() + code.len() - 1`.
    pub fn byte_len(&self) -> Address {
        self.arena.byte_len()
    }

    /// Number of stored codes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn trie(&self) -> &CodeTrie {
        &self.trie
    }

    /// Snapshot the store as it was right after the code covering `address` was appended.
    pub fn clone_at(&self, address: Address) -> Result<Store> {
        let arena = self.arena.clone_at(address)?;
        let trie = self.trie.clone_at(arena.byte_len() - 1);
        debug!(address, chunks = arena.len(), "store snapshot");
        Ok(Store { arena, trie })
    }

    /// Snapshot the store at its current end.
    pub fn snapshot(&self) -> Store {
        self.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn append_and_lookup() {
        let mut store = Store::new();
        let codes: Vec<Vec<u8>> = vec![vec![0x00], vec![0xff, 0xf0], vec![0xff], vec![0xf0]];
        let mut addresses = Vec::new();
        for code in codes.iter() {
            addresses.push(store.append(code.clone()).unwrap());
        }
        assert_eq!(addresses, vec![0, 2, 3, 4]);
        for (code, address) in codes.iter().zip(addresses.iter()) {
            assert_eq!(store.address_of(code), Some(*address));
            assert_eq!(store.get_code(*address).unwrap(), &code[..]);
        }
        assert_eq!(store.byte_at(1), Some(0xff));
        assert_eq!(store.get_code(1).unwrap(), &[0xff, 0xf0]);
        assert!(matches!(store.code_at(1), Err(Error::AddressNotFound(1))));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn rejects() {
        let mut store = Store::new();
        assert!(matches!(store.append(vec![]), Err(Error::EmptyCode)));
        store.append(vec![1u8, 2]).unwrap();
        assert!(matches!(
            store.append(vec![1u8, 2]),
            Err(Error::DuplicateCode)
        ));
        assert_eq!(store.byte_len(), 2);
        assert!(matches!(store.get_code(2), Err(Error::AddressNotFound(2))));
    }

    #[test]
    fn snapshots() {
        let mut store = Store::new();
        let a = store.append(vec![1u8, 1]).unwrap();
        let b = store.append(vec![2u8, 2, 2]).unwrap();
        let c = store.append(vec![3u8]).unwrap();

        let mut old = store.clone_at(b).unwrap();
        assert_eq!(old.address_of(&[1, 1]), Some(a));
        assert_eq!(old.address_of(&[2, 2, 2]), Some(b));
        assert_eq!(old.address_of(&[3]), None);
        assert!(old.get_code(c).is_err());

        // Both sides keep appending without seeing each other
        let d = old.append(vec![4u8, 4]).unwrap();
        assert_eq!(d, c + 1);
        assert_eq!(store.address_of(&[4, 4]), None);
        store.append(vec![5u8]).unwrap();
        assert_eq!(old.address_of(&[5]), None);
        assert_eq!(old.address_of(&[3]), None);

        // A mid-chunk address snapshots the whole chunk
        let mid = store.clone_at(b - 1).unwrap();
        assert_eq!(mid.address_of(&[2, 2, 2]), Some(b));

        let now = store.snapshot();
        assert_eq!(now.byte_len(), store.byte_len());
    }
}
