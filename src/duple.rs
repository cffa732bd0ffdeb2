//! Balanced pair trees.
//!
//! Sequences of any length are stored as trees of two-part nodes, so the codec never needs a
//! variable number of parts. A sequence of `n > 2` items is split after the largest power of two
//! that is at most `n - 1`: the left side is always a perfect tree, and the right side holds
//! whatever is left over.

use crate::{
    error::{Error, Result},
    value::Value,
};

/// One side of a [`Duple`].
#[derive(Clone, Debug, PartialEq)]
pub enum Side<T> {
    Leaf(T),
    Node(Box<Duple<T>>),
}

/// A binary node pairing two sides.
#[derive(Clone, Debug, PartialEq)]
pub struct Duple<T> {
    pub left: Side<T>,
    pub right: Side<T>,
}

impl<T> Duple<T> {
    pub fn new(left: T, right: T) -> Self {
        Self {
            left: Side::Leaf(left),
            right: Side::Leaf(right),
        }
    }

    /// Build the balanced tree for a sequence. Needs at least 2 items.
    pub fn balanced(mut items: Vec<T>) -> Result<Self> {
        let len = items.len();
        if len < 2 {
            return Err(Error::SequenceTooShort(len));
        }
        if len == 2 {
            let right = items.pop();
            let left = items.pop();
            return match (left, right) {
                (Some(left), Some(right)) => Ok(Self::new(left, right)),
                _ => Err(Error::SequenceTooShort(len)),
            };
        }
        let split = split_point(len);
        let mut rest = items.split_off(split);
        let left = Side::Node(Box::new(Self::balanced(items)?));
        let right = if rest.len() == 1 {
            match rest.pop() {
                Some(item) => Side::Leaf(item),
                None => return Err(Error::SequenceTooShort(0)),
            }
        } else {
            Side::Node(Box::new(Self::balanced(rest)?))
        };
        Ok(Self { left, right })
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    /// Always false: a duple holds at least two leaves.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Recover the sequence, in order.
    pub fn flatten(self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<T>) {
        self.left.flatten_into(out);
        self.right.flatten_into(out);
    }
}

impl<T> Side<T> {
    fn len(&self) -> usize {
        match self {
            Side::Leaf(_) => 1,
            Side::Node(node) => node.len(),
        }
    }

    fn flatten_into(self, out: &mut Vec<T>) {
        match self {
            Side::Leaf(item) => out.push(item),
            Side::Node(node) => node.flatten_into(out),
        }
    }
}

/// Where a sequence of `len >= 2` items splits: the largest power of two at most `len - 1`.
fn split_point(len: usize) -> usize {
    let below = len - 1;
    1 << (usize::BITS - 1 - below.leading_zeros())
}

impl From<Duple<Value>> for Value {
    fn from(duple: Duple<Value>) -> Self {
        Value::duple(duple.left, duple.right)
    }
}

impl From<Side<Value>> for Value {
    fn from(side: Side<Value>) -> Self {
        match side {
            Side::Leaf(value) => value,
            Side::Node(node) => (*node).into(),
        }
    }
}

/// Flatten a decoded tree of [`Value::Duple`] nodes. Every non-duple value is a leaf.
pub fn flatten_value(tree: Value) -> Vec<Value> {
    let mut out = Vec::new();
    flatten_value_into(tree, &mut out);
    out
}

fn flatten_value_into(tree: Value, out: &mut Vec<Value>) {
    match tree {
        Value::Duple(left, right) => {
            flatten_value_into(*left, out);
            flatten_value_into(*right, out);
        }
        leaf => out.push(leaf),
    }
}

/// Check that a decoded tree has exactly the shape [`Duple::balanced`] gives its leaves. Any
/// duple that `is_leaf` rejects is a tree node; anything else that isn't a leaf fails the check.
pub fn is_balanced<F>(tree: &Value, is_leaf: F) -> bool
where
    F: Fn(&Value) -> bool + Copy,
{
    let len = count_leaves(tree, is_leaf);
    len >= 2 && has_shape(tree, len, is_leaf)
}

fn count_leaves<F>(tree: &Value, is_leaf: F) -> usize
where
    F: Fn(&Value) -> bool + Copy,
{
    match tree {
        Value::Duple(left, right) if !is_leaf(tree) => {
            count_leaves(left, is_leaf) + count_leaves(right, is_leaf)
        }
        _ => 1,
    }
}

fn has_shape<F>(tree: &Value, len: usize, is_leaf: F) -> bool
where
    F: Fn(&Value) -> bool + Copy,
{
    if len == 1 {
        return is_leaf(tree);
    }
    match tree {
        Value::Duple(left, right) if !is_leaf(tree) => {
            let split = split_point(len);
            has_shape(left, split, is_leaf) && has_shape(right, len - split, is_leaf)
        }
        _ => false,
    }
}

/// Flatten a decoded tree whose leaves are all pairs, such as object entries. A pair leaf is a
/// duple whose left side is not itself a duple. Fails on any leaf that isn't a pair.
pub fn flatten_pairs(tree: Value) -> Result<Vec<(Value, Value)>> {
    let mut out = Vec::new();
    flatten_pairs_into(tree, &mut out)?;
    Ok(out)
}

fn flatten_pairs_into(tree: Value, out: &mut Vec<(Value, Value)>) -> Result<()> {
    match tree {
        Value::Duple(left, right) => {
            if left.is_duple() {
                flatten_pairs_into(*left, out)?;
                flatten_pairs_into(*right, out)
            } else {
                out.push((*left, *right));
                Ok(())
            }
        }
        _ => Err(Error::NonFlattenableDuple),
    }
}
