//! Bitwise prefix trie from codes to addresses.
//!
//! Each node holds one code and, usually, the address bound to it. A code that doesn't fully
//! match a node's code is routed to the branch keyed by the number of leading bits the two codes
//! share (counted from the node's offset). A new branch node starts comparing at the first byte
//! that differed, so later comparisons skip the prefix its ancestors already matched.
//!
//! Nodes are reference counted. [`CodeTrie::clone_at`] shares every subtree that holds no binding
//! newer than the requested address, and mutations copy a node only if a snapshot still
//! references it, so snapshots and the original never observe each other's writes.

use std::collections::{btree_map::Entry, BTreeMap};
use std::sync::Arc;

use crate::{
    error::{Error, Result},
    Address,
};

/// Count the leading bits two byte strings share, stopping at the end of the shorter one.
pub fn count_matching_bits(a: &[u8], b: &[u8]) -> usize {
    let mut bits = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = x ^ y;
        if diff != 0 {
            return bits + diff.leading_zeros() as usize;
        }
        bits += 8;
    }
    bits
}

#[derive(Clone, Debug, Default)]
struct Node {
    /// Bytes already matched by the ancestors of this node.
    offset: usize,
    /// Routing key. Only an empty root lacks one.
    code: Option<Arc<[u8]>>,
    address: Option<Address>,
    /// Upper bound on every address bound in this subtree.
    newest: Address,
    branches: BTreeMap<usize, Arc<Node>>,
}

enum Compare {
    Full,
    Partial { bits: usize, bytes: usize },
}

impl Node {
    fn leaf(offset: usize, code: Arc<[u8]>, address: Address) -> Self {
        Self {
            offset,
            code: Some(code),
            address: Some(address),
            newest: address,
            branches: BTreeMap::new(),
        }
    }

    fn compare(&self, code: &[u8]) -> Option<Compare> {
        let own = self.code.as_ref()?;
        let bits = count_matching_bits(
            code.get(self.offset..).unwrap_or_default(),
            own.get(self.offset..).unwrap_or_default(),
        );
        let bytes = self.offset + bits / 8;
        if bytes == code.len() && bytes == own.len() {
            Some(Compare::Full)
        } else {
            Some(Compare::Partial { bits, bytes })
        }
    }

    fn snapshot(node: &Arc<Node>, at: Address) -> Option<Arc<Node>> {
        if node.newest <= at {
            return Some(Arc::clone(node));
        }
        let branches: BTreeMap<usize, Arc<Node>> = node
            .branches
            .iter()
            .filter_map(|(bits, branch)| Node::snapshot(branch, at).map(|b| (*bits, b)))
            .collect();
        let address = node.address.filter(|a| *a <= at);
        if address.is_none() && branches.is_empty() {
            return None;
        }
        let newest = branches
            .values()
            .map(|b| b.newest)
            .chain(address)
            .max()
            .unwrap_or(0);
        Some(Arc::new(Node {
            offset: node.offset,
            code: node.code.clone(),
            address,
            newest,
            branches,
        }))
    }
}

/// Maps codes to the addresses they were stored at.
#[derive(Clone, Debug, Default)]
pub struct CodeTrie {
    root: Arc<Node>,
}

impl CodeTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the address bound to `code`.
    pub fn get(&self, code: &[u8]) -> Option<Address> {
        let mut node = &self.root;
        loop {
            match node.compare(code)? {
                Compare::Full => return node.address,
                Compare::Partial { bits, .. } => node = node.branches.get(&bits)?,
            }
        }
    }

    /// Bind `code` to `address`. Binding a code that already has an address is an error.
    pub fn set(&mut self, code: impl Into<Arc<[u8]>>, address: Address) -> Result<()> {
        let code = code.into();
        let mut node = Arc::make_mut(&mut self.root);
        loop {
            let compare = match node.compare(&code) {
                Some(compare) => compare,
                None => {
                    node.code = Some(code);
                    node.address = Some(address);
                    node.newest = node.newest.max(address);
                    return Ok(());
                }
            };
            match compare {
                Compare::Full => {
                    if node.address.is_some() {
                        return Err(Error::DuplicateCode);
                    }
                    node.address = Some(address);
                    node.newest = node.newest.max(address);
                    return Ok(());
                }
                Compare::Partial { bits, bytes } => {
                    node.newest = node.newest.max(address);
                    match node.branches.entry(bits) {
                        Entry::Occupied(branch) => node = Arc::make_mut(branch.into_mut()),
                        Entry::Vacant(slot) => {
                            slot.insert(Arc::new(Node::leaf(bytes, code, address)));
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Remove the binding for `code`. The node stays in place as a routing key, so codes stored
    /// below it remain reachable.
    pub fn delete(&mut self, code: &[u8]) -> Result<Address> {
        // Check first, so a failed delete doesn't copy nodes shared with a snapshot.
        if self.get(code).is_none() {
            return Err(Error::UnknownBranch);
        }
        let mut node = Arc::make_mut(&mut self.root);
        loop {
            match node.compare(code).ok_or(Error::UnknownBranch)? {
                Compare::Full => return node.address.take().ok_or(Error::UnknownBranch),
                Compare::Partial { bits, .. } => {
                    let branch = node.branches.get_mut(&bits).ok_or(Error::UnknownBranch)?;
                    node = Arc::make_mut(branch);
                }
            }
        }
    }

    /// Make an independent trie holding only the bindings at or before `address`.
    pub fn clone_at(&self, address: Address) -> CodeTrie {
        let root = Node::snapshot(&self.root, address).unwrap_or_default();
        tracing::debug!(address, "trie snapshot");
        CodeTrie { root }
    }

    /// True if no code has ever been routed through this trie.
    pub fn is_empty(&self) -> bool {
        self.root.code.is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matching_bits() {
        assert_eq!(count_matching_bits(&[0xff, 0xff], &[0xff, 0xff, 0xff]), 16);
        assert_eq!(count_matching_bits(&[0xff, 0xff, 0xff], &[0xff, 0xff]), 16);
        assert_eq!(count_matching_bits(&[0xff, 0xff], &[0xff, 0b1101_1111]), 10);
        assert_eq!(count_matching_bits(&[0xff, 0xff], &[0xff]), 8);
        assert_eq!(
            count_matching_bits(&[0b1110_1111, 0xff], &[0xff, 0b1101_1111]),
            3
        );
        assert_eq!(
            count_matching_bits(&[0b1110_1111, 0xff], &[0b0111_1111, 0b1101_1111]),
            0
        );
        assert_eq!(count_matching_bits(&[], &[0b0111_1111, 0b1101_1111]), 0);
        assert_eq!(count_matching_bits(&[], &[]), 0);
    }

    fn sample() -> (CodeTrie, Vec<(Vec<u8>, Address)>) {
        let cases = vec![
            (vec![0x00], 100),
            (vec![0xff, 0xf0], 200),
            (vec![0xff], 300),
            (vec![0xf0], 400),
            (vec![0xff, 0xff, 0xff], 500),
        ];
        let mut trie = CodeTrie::new();
        for (code, address) in cases.iter() {
            trie.set(code.clone(), *address).unwrap();
        }
        (trie, cases)
    }

    #[test]
    fn set_and_get() {
        let (trie, cases) = sample();
        for (code, address) in cases.iter() {
            assert_eq!(trie.get(code), Some(*address));
        }
        assert_eq!(trie.get(&[0xff, 0xff]), None);
        assert_eq!(trie.get(&[0x01]), None);
        assert_eq!(trie.get(&[]), None);
        assert_eq!(CodeTrie::new().get(&[0x00]), None);
    }

    #[test]
    fn single_assignment() {
        let (mut trie, _) = sample();
        assert!(matches!(
            trie.set(vec![0xff], 999),
            Err(Error::DuplicateCode)
        ));
        assert_eq!(trie.get(&[0xff]), Some(300));
    }

    #[test]
    fn delete() {
        let (mut trie, _) = sample();
        assert_eq!(trie.delete(&[0xff, 0xff, 0xff]).unwrap(), 500);
        assert_eq!(trie.get(&[0xff, 0xff, 0xff]), None);
        assert!(matches!(
            trie.delete(&[0xff, 0xff, 0xff]),
            Err(Error::UnknownBranch)
        ));
        assert!(matches!(trie.delete(&[0x12]), Err(Error::UnknownBranch)));

        // Deleting an interior node keeps everything below it reachable
        assert_eq!(trie.delete(&[0x00]).unwrap(), 100);
        assert_eq!(trie.get(&[0x00]), None);
        assert_eq!(trie.get(&[0xff, 0xf0]), Some(200));
        assert_eq!(trie.get(&[0xff]), Some(300));
        assert_eq!(trie.get(&[0xf0]), Some(400));

        // And the code can be bound again
        trie.set(vec![0x00], 600).unwrap();
        assert_eq!(trie.get(&[0x00]), Some(600));
    }

    #[test]
    fn clone_at() {
        let (mut trie, _) = sample();
        trie.delete(&[0xff, 0xff, 0xff]).unwrap();

        let mut cloned = trie.clone_at(300);
        assert_eq!(cloned.get(&[0x00]), Some(100));
        assert_eq!(cloned.get(&[0xff, 0xf0]), Some(200));
        assert_eq!(cloned.get(&[0xff]), Some(300));
        assert_eq!(cloned.get(&[0xf0]), None);
        assert_eq!(cloned.get(&[0xff, 0xff, 0xff]), None);

        cloned.set(vec![0xff, 0xff, 0xff], 600).unwrap();
        assert_eq!(cloned.get(&[0xff, 0xff, 0xff]), Some(600));
        assert_eq!(trie.get(&[0xff, 0xff, 0xff]), None);

        trie.set(vec![0x0f], 700).unwrap();
        assert_eq!(trie.get(&[0x0f]), Some(700));
        assert_eq!(cloned.get(&[0x0f]), None);
        assert_eq!(trie.get(&[0xf0]), Some(400));
    }

    #[test]
    fn clone_keeps_older_bindings_below_newer_nodes() {
        let mut trie = CodeTrie::new();
        trie.set(vec![0x10], 50).unwrap();
        trie.set(vec![0x20], 90).unwrap();
        trie.set(vec![0x28], 10).unwrap();

        let cloned = trie.clone_at(60);
        assert_eq!(cloned.get(&[0x10]), Some(50));
        assert_eq!(cloned.get(&[0x20]), None);
        assert_eq!(cloned.get(&[0x28]), Some(10));

        let empty = trie.clone_at(5);
        assert!(empty.is_empty());
        assert_eq!(empty.get(&[0x28]), None);
    }

    #[test]
    fn clone_shares_old_subtrees() {
        let (trie, _) = sample();
        let cloned = trie.clone_at(500);
        assert!(Arc::ptr_eq(&trie.root, &cloned.root));
    }

    #[test]
    fn prefixes_are_distinct() {
        let mut trie = CodeTrie::new();
        let codes: Vec<Vec<u8>> = (0..8).map(|n| vec![0xab; n + 1]).collect();
        for (i, code) in codes.iter().enumerate() {
            trie.set(code.clone(), i as Address).unwrap();
        }
        for (i, code) in codes.iter().enumerate() {
            assert_eq!(trie.get(code), Some(i as Address));
        }
    }
}
