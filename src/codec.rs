//! The composite codec.
//!
//! Encoding turns a [`Value`] into a code: the value's parts, each either inlined or replaced by
//! the address of an identical code already in the [`Store`], followed by one footer byte. Equal
//! values always resolve to equal codes within a store, so structure shared between values is
//! stored once.
//!
//! Decoding reads a code backwards. The footer gives the type and the option of every part; an
//! address part is exactly `option` bytes wide, and an inline part is measured by recursively
//! reading the footer just before it. See [`crate::format`] for the byte layout.

use std::fmt;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use tracing::trace;

use crate::{
    address::{address_width, decode_address, encode_address},
    duple::{flatten_pairs, flatten_value, is_balanced, Duple, Side},
    error::{Error, Result},
    marker::{join_options, split_variant, CodecType, Registry},
    store::Store,
    value::{SparseArray, Value},
    Address, MAX_DEPTH, SHORT_BYTES_MAX,
};

/// Encoder and decoder for values, bound to a footer registry.
///
/// The codec itself holds no storage state. Every call takes the [`Store`] it should resolve
/// parts against, so one codec can serve any number of stores and snapshots.
#[derive(Clone, Debug, Default)]
pub struct Codec {
    registry: Arc<Registry>,
}

/// Things that end up as the leaves of a balanced tree.
enum Leaf<'a> {
    Value(&'a Value),
    Word(&'a [u8]),
    Entry(&'a str, &'a Value),
}

/// A part of a code, as read from its parent.
struct Part<'a> {
    /// The part's own code, either sliced out of the parent or fetched from the store.
    code: &'a [u8],
    address: Option<Address>,
    /// Position in the parent code just past the part's last byte.
    end: usize,
}

/// Longest sequence that can be written with explicit indices.
const MAX_SEQUENCE_LEN: usize = u32::MAX as usize;

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        Err(Error::ParseLimit(format!(
            "Code nesting deeper than {} parts",
            MAX_DEPTH
        )))
    } else {
        Ok(())
    }
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a shared registry.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode a value, appending any part that must be stored by address to `store`.
    pub fn encode(&self, store: &mut Store, value: &Value) -> Result<Vec<u8>> {
        self.encode_at(store, value, 0)
    }

    /// Encode a value wrapped as a variable: the root-level unit callers store and name.
    pub fn encode_variable(&self, store: &mut Store, value: &Value) -> Result<Vec<u8>> {
        let child = self.encode_at(store, value, 1)?;
        self.wrap(store, CodecType::Variable, child)
    }

    /// Decode a complete code. Every byte must belong to it.
    pub fn decode(&self, store: &Store, code: &[u8]) -> Result<Value> {
        let width = self.width(code)?;
        if width != code.len() {
            return Err(Error::BadEncode(format!(
                "Code is {} bytes long, but its parts only cover {}",
                code.len(),
                width
            )));
        }
        self.decode_at(store, code, 0)
    }

    /// Decode a code that must be a variable, returning the value it wraps.
    pub fn decode_variable(&self, store: &Store, code: &[u8]) -> Result<Value> {
        let (ty, _) = self.read_footer(code)?;
        if ty != CodecType::Variable {
            return Err(Error::BadEncode(format!(
                "Expected a variable, got a {} code",
                ty.name()
            )));
        }
        self.decode(store, code)
    }

    /// Number of bytes at the end of `code` that belong to the code ending there.
    pub fn width(&self, code: &[u8]) -> Result<usize> {
        self.width_at(code, 0)
    }

    /// Break a code down into its type, parts, and decoded value, recursively.
    pub fn inspect(&self, store: &Store, code: &[u8]) -> Result<Inspection> {
        // Same checks as decode, so a report is never produced for something decode rejects
        self.decode(store, code)?;
        self.inspect_at(store, code, 0)
    }

    fn read_footer(&self, code: &[u8]) -> Result<(CodecType, u8)> {
        match code.last() {
            Some(footer) => self.registry.lookup(*footer),
            None => Err(Error::MalformedCode {
                step: "read footer",
                actual: 0,
                expected: 1,
            }),
        }
    }

    fn encode_at(&self, store: &mut Store, value: &Value, depth: usize) -> Result<Vec<u8>> {
        check_depth(depth)?;
        match value {
            Value::Undefined => Ok(vec![self.registry.footer(CodecType::Undefined, 0)]),
            Value::Null => Ok(vec![self.registry.footer(CodecType::Null, 0)]),
            Value::Bool(false) => Ok(vec![self.registry.footer(CodecType::False, 0)]),
            Value::Bool(true) => Ok(vec![self.registry.footer(CodecType::True, 0)]),
            Value::Bytes(bytes) => self.encode_bytes(store, bytes, depth),
            Value::Str(s) => {
                let child = self.encode_bytes(store, s.as_bytes(), depth + 1)?;
                self.wrap(store, CodecType::Str, child)
            }
            Value::Number(n) => self.encode_float(store, CodecType::Number, *n, depth),
            Value::Date(n) => self.encode_float(store, CodecType::Date, *n, depth),
            Value::Duple(left, right) => {
                let mut code = Vec::new();
                let left = self.encode_at(store, left, depth + 1)?;
                let left = self.push_part(store, &mut code, left)?;
                let right = self.encode_at(store, right, depth + 1)?;
                let right = self.push_part(store, &mut code, right)?;
                code.push(
                    self.registry
                        .footer(CodecType::Duple, join_options(&[left, right])),
                );
                Ok(code)
            }
            Value::Array(items) => self.encode_sequence(store, items.iter().collect(), depth),
            Value::Sparse(sparse) => {
                if sparse.is_dense() {
                    let items = sparse.iter().map(|(_, v)| v).collect();
                    self.encode_sequence(store, items, depth)
                } else {
                    self.encode_indexed(store, sparse.len(), sparse.iter(), depth)
                }
            }
            Value::Object(entries) => {
                if entries.is_empty() {
                    return Ok(vec![self.registry.footer(CodecType::EmptyObject, 0)]);
                }
                let leaves = entries
                    .iter()
                    .map(|(k, v)| Leaf::Entry(k.as_str(), v))
                    .collect();
                self.encode_entries(store, leaves, depth)
            }
        }
    }

    fn encode_bytes(&self, store: &mut Store, bytes: &[u8], depth: usize) -> Result<Vec<u8>> {
        check_depth(depth)?;
        if bytes.len() <= SHORT_BYTES_MAX {
            let mut code = Vec::with_capacity(bytes.len() + 1);
            code.extend_from_slice(bytes);
            code.push(self.registry.footer(CodecType::ShortBytes, bytes.len() as u8));
            return Ok(code);
        }
        let words = bytes.chunks(SHORT_BYTES_MAX).map(Leaf::Word).collect();
        let child = self.encode_tree(store, Duple::balanced(words)?, depth + 1)?;
        self.wrap(store, CodecType::LongBytes, child)
    }

    fn encode_float(
        &self,
        store: &mut Store,
        ty: CodecType,
        n: f64,
        depth: usize,
    ) -> Result<Vec<u8>> {
        let mut raw = [0u8; 8];
        LittleEndian::write_f64(&mut raw, n);
        let child = self.encode_bytes(store, &raw, depth + 1)?;
        self.wrap(store, ty, child)
    }

    fn encode_sequence(
        &self,
        store: &mut Store,
        items: Vec<&Value>,
        depth: usize,
    ) -> Result<Vec<u8>> {
        // A pair tree can't tell a Duple element from the tree's own nodes, so those sequences
        // keep their indices explicitly.
        if items.len() < 2 || items.iter().any(|v| v.is_duple()) {
            let len = items.len();
            return self.encode_indexed(store, len, items.into_iter().enumerate(), depth);
        }
        let leaves = items.into_iter().map(Leaf::Value).collect();
        let child = self.encode_tree(store, Duple::balanced(leaves)?, depth + 1)?;
        self.wrap(store, CodecType::Array, child)
    }

    /// Encode an object code from one or more entries.
    fn encode_entries(
        &self,
        store: &mut Store,
        mut leaves: Vec<Leaf>,
        depth: usize,
    ) -> Result<Vec<u8>> {
        let child = if leaves.len() == 1 {
            match leaves.pop() {
                Some(leaf) => self.encode_leaf(store, leaf, depth + 1)?,
                None => return Err(Error::SequenceTooShort(0)),
            }
        } else {
            self.encode_tree(store, Duple::balanced(leaves)?, depth + 1)?
        };
        self.wrap(store, CodecType::Object, child)
    }

    /// Encode a sequence as an object of its present items keyed by index, plus its length.
    fn encode_indexed<'a>(
        &self,
        store: &mut Store,
        len: usize,
        items: impl Iterator<Item = (usize, &'a Value)>,
        depth: usize,
    ) -> Result<Vec<u8>> {
        if len > MAX_SEQUENCE_LEN {
            return Err(Error::UnsupportedValue(format!(
                "Sequence length {} is over the limit of {}",
                len, MAX_SEQUENCE_LEN
            )));
        }
        let items: Vec<(String, &Value)> = items.map(|(i, v)| (i.to_string(), v)).collect();
        let length = Value::Number(len as f64);
        let mut leaves: Vec<Leaf> = items.iter().map(|(k, v)| Leaf::Entry(k, v)).collect();
        leaves.push(Leaf::Entry("length", &length));
        let child = self.encode_entries(store, leaves, depth + 1)?;
        self.wrap(store, CodecType::SparseArray, child)
    }

    fn encode_tree(&self, store: &mut Store, tree: Duple<Leaf>, depth: usize) -> Result<Vec<u8>> {
        check_depth(depth)?;
        let mut code = Vec::new();
        let left = self.encode_side(store, tree.left, depth + 1)?;
        let left = self.push_part(store, &mut code, left)?;
        let right = self.encode_side(store, tree.right, depth + 1)?;
        let right = self.push_part(store, &mut code, right)?;
        code.push(
            self.registry
                .footer(CodecType::Duple, join_options(&[left, right])),
        );
        Ok(code)
    }

    fn encode_side(&self, store: &mut Store, side: Side<Leaf>, depth: usize) -> Result<Vec<u8>> {
        match side {
            Side::Leaf(leaf) => self.encode_leaf(store, leaf, depth),
            Side::Node(node) => self.encode_tree(store, *node, depth),
        }
    }

    fn encode_leaf(&self, store: &mut Store, leaf: Leaf, depth: usize) -> Result<Vec<u8>> {
        match leaf {
            Leaf::Value(value) => self.encode_at(store, value, depth),
            Leaf::Word(word) => self.encode_bytes(store, word, depth),
            Leaf::Entry(key, value) => {
                check_depth(depth)?;
                let mut code = Vec::new();
                let key = self.encode_key(store, key, depth + 1)?;
                let key = self.push_part(store, &mut code, key)?;
                let value = self.encode_at(store, value, depth + 1)?;
                let value = self.push_part(store, &mut code, value)?;
                code.push(
                    self.registry
                        .footer(CodecType::Duple, join_options(&[key, value])),
                );
                Ok(code)
            }
        }
    }

    fn encode_key(&self, store: &mut Store, key: &str, depth: usize) -> Result<Vec<u8>> {
        check_depth(depth)?;
        let child = self.encode_bytes(store, key.as_bytes(), depth + 1)?;
        self.wrap(store, CodecType::Str, child)
    }

    /// Make a single-part code.
    fn wrap(&self, store: &mut Store, ty: CodecType, child: Vec<u8>) -> Result<Vec<u8>> {
        let mut code = Vec::with_capacity(child.len().min(SHORT_BYTES_MAX) + 1);
        let option = self.push_part(store, &mut code, child)?;
        code.push(self.registry.footer(ty, option));
        Ok(code)
    }

    /// Add a part to a code under construction, returning the part's option.
    ///
    /// A code the store already holds is referenced by address. Otherwise the code is inlined if
    /// it's no longer than the address it would get, and stored and referenced if it's longer.
    fn push_part(&self, store: &mut Store, buf: &mut Vec<u8>, child: Vec<u8>) -> Result<u8> {
        let address = match store.address_of(&child) {
            Some(address) => {
                trace!(address, "part already stored");
                address
            }
            None => {
                let next = store.byte_len() + child.len() as Address - 1;
                if child.len() <= address_width(next)? {
                    trace!(len = child.len(), "inlined part");
                    buf.extend_from_slice(&child);
                    return Ok(0);
                }
                let address = store.append(child)?;
                trace!(address, "stored part");
                address
            }
        };
        let width = encode_address(buf, address)?;
        Ok(width as u8)
    }

    fn width_at(&self, code: &[u8], depth: usize) -> Result<usize> {
        check_depth(depth)?;
        let (ty, variant) = self.read_footer(code)?;
        let width = if ty == CodecType::ShortBytes {
            variant as usize + 1
        } else {
            let mut end = code.len() - 1;
            for option in split_variant(variant, ty.slots()).into_iter().rev() {
                let part = if option == 0 {
                    self.width_at(&code[..end], depth + 1)?
                } else {
                    option as usize
                };
                if part > end {
                    return Err(Error::MalformedCode {
                        step: "measure part",
                        actual: end,
                        expected: part,
                    });
                }
                end -= part;
            }
            code.len() - end
        };
        if width > code.len() {
            return Err(Error::MalformedCode {
                step: "measure code",
                actual: code.len(),
                expected: width,
            });
        }
        Ok(width)
    }

    /// Read the parts of a code with at least one slot, first part first.
    fn read_parts<'a>(
        &self,
        store: &'a Store,
        code: &'a [u8],
        ty: CodecType,
        variant: u8,
        depth: usize,
    ) -> Result<Vec<Part<'a>>> {
        let options = split_variant(variant, ty.slots());
        let mut parts = Vec::with_capacity(options.len());
        let mut end = code.len().saturating_sub(1);
        for option in options.into_iter().rev() {
            let width = if option == 0 {
                self.width_at(&code[..end], depth + 1)?
            } else {
                option as usize
            };
            if width > end {
                return Err(Error::MalformedCode {
                    step: "read part",
                    actual: end,
                    expected: width,
                });
            }
            let bytes = &code[end - width..end];
            let part = if option == 0 {
                Part {
                    code: bytes,
                    address: None,
                    end,
                }
            } else {
                let address = decode_address(bytes)?;
                Part {
                    code: store.code_at(address)?,
                    address: Some(address),
                    end,
                }
            };
            parts.push(part);
            end -= width;
        }
        parts.reverse();
        Ok(parts)
    }

    fn decode_at(&self, store: &Store, code: &[u8], depth: usize) -> Result<Value> {
        check_depth(depth)?;
        let (ty, variant) = self.read_footer(code)?;
        let value = match ty {
            CodecType::Undefined => Value::Undefined,
            CodecType::Null => Value::Null,
            CodecType::False => Value::Bool(false),
            CodecType::True => Value::Bool(true),
            CodecType::EmptyObject => Value::Object(Vec::new()),
            CodecType::ShortBytes => {
                let len = variant as usize;
                let body = &code[..code.len() - 1];
                if len > body.len() {
                    return Err(Error::MalformedCode {
                        step: "read short bytes",
                        actual: body.len(),
                        expected: len,
                    });
                }
                Value::Bytes(body[body.len() - len..].to_vec())
            }
            CodecType::Duple => {
                let parts = self.read_parts(store, code, ty, variant, depth)?;
                let mut parts = parts.into_iter();
                let (left, right) = match (parts.next(), parts.next()) {
                    (Some(left), Some(right)) => (left, right),
                    _ => return Err(Error::BadEncode("Duple needs two parts".into())),
                };
                let left = self.decode_at(store, left.code, depth + 1)?;
                let right = self.decode_at(store, right.code, depth + 1)?;
                Value::duple(left, right)
            }
            CodecType::Variable if depth > 0 => {
                return Err(Error::BadEncode(
                    "A variable can only be the outermost code".into(),
                ))
            }
            _ => {
                let parts = self.read_parts(store, code, ty, variant, depth)?;
                let part = parts
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::BadEncode(format!("{} needs a part", ty.name())))?;
                let child = self.decode_at(store, part.code, depth + 1)?;
                self.unwrap_child(ty, child)?
            }
        };
        Ok(value)
    }

    /// Turn the decoded part of a single-part code into the value it stands for.
    fn unwrap_child(&self, ty: CodecType, child: Value) -> Result<Value> {
        let mismatch = |child: &Value| {
            Error::BadEncode(format!(
                "A {} code can't hold a {} part",
                ty.name(),
                child.name()
            ))
        };
        Ok(match ty {
            CodecType::Variable => child,
            CodecType::LongBytes => {
                if !is_balanced(&child, |v| matches!(v, Value::Bytes(_))) {
                    return Err(Error::BadEncode(
                        "Long bytes aren't a balanced tree of words".into(),
                    ));
                }
                let words = flatten_value(child);
                let last = words.len() - 1;
                let mut bytes = Vec::with_capacity(words.len() * SHORT_BYTES_MAX);
                for (i, word) in words.into_iter().enumerate() {
                    let word = match word {
                        Value::Bytes(word) => word,
                        other => return Err(mismatch(&other)),
                    };
                    let canonical = if i == last {
                        (1..=SHORT_BYTES_MAX).contains(&word.len())
                    } else {
                        word.len() == SHORT_BYTES_MAX
                    };
                    if !canonical {
                        return Err(Error::BadEncode(format!(
                            "Word {} of a long byte code holds {} bytes",
                            i,
                            word.len()
                        )));
                    }
                    bytes.extend_from_slice(&word);
                }
                Value::Bytes(bytes)
            }
            CodecType::Str => match child {
                Value::Bytes(bytes) => Value::Str(
                    String::from_utf8(bytes)
                        .map_err(|e| Error::BadEncode(format!("String isn't UTF-8: {}", e)))?,
                ),
                other => return Err(mismatch(&other)),
            },
            CodecType::Number | CodecType::Date => {
                let n = match child {
                    Value::Bytes(ref bytes) if bytes.len() == 8 => LittleEndian::read_f64(bytes),
                    other => return Err(mismatch(&other)),
                };
                if ty == CodecType::Number {
                    Value::Number(n)
                } else {
                    Value::Date(n)
                }
            }
            CodecType::Array => {
                if !child.is_duple() {
                    return Err(mismatch(&child));
                }
                if !is_balanced(&child, |v| !v.is_duple()) {
                    return Err(Error::BadEncode("Array isn't a balanced tree".into()));
                }
                Value::Array(flatten_value(child))
            }
            CodecType::SparseArray => match child {
                Value::Object(entries) => unindex(entries)?,
                other => return Err(mismatch(&other)),
            },
            CodecType::Object => {
                let is_pair = |v: &Value| matches!(v, Value::Duple(key, _) if !key.is_duple());
                if !is_pair(&child) && !is_balanced(&child, is_pair) {
                    return Err(Error::BadEncode(
                        "Object isn't a balanced tree of entries".into(),
                    ));
                }
                let entries = flatten_pairs(child)?
                    .into_iter()
                    .map(|(key, value)| match key {
                        Value::Str(key) => Ok((key, value)),
                        other => Err(Error::BadEncode(format!(
                            "Object keys must be strings, got {}",
                            other.name()
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Value::Object(entries)
            }
            _ => return Err(mismatch(&child)),
        })
    }

    fn inspect_at(&self, store: &Store, code: &[u8], depth: usize) -> Result<Inspection> {
        let (ty, variant) = self.read_footer(code)?;
        let value = self.decode_at(store, code, depth)?;
        let width = self.width_at(code, depth)?;
        let parts = if ty.slots() == 0 {
            Vec::new()
        } else {
            self.read_parts(store, code, ty, variant, depth)?
                .into_iter()
                .map(|part| {
                    Ok(PartInspection {
                        address: part.address,
                        end: part.end,
                        inspection: self.inspect_at(store, part.code, depth + 1)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Inspection {
            type_name: ty.name(),
            base_footer: self.registry.base_footer(ty),
            variant,
            footer: self.registry.footer(ty, variant),
            width,
            value,
            parts,
        })
    }
}

/// Rebuild a sequence from its indexed form: present indices in ascending order, then the length.
fn unindex(mut entries: Vec<(String, Value)>) -> Result<Value> {
    let len = match entries.pop() {
        Some((key, Value::Number(n))) if key == "length" => {
            // Only a whole, non-negative length survives the round trip through usize bit for bit
            let len = n as usize;
            if len > MAX_SEQUENCE_LEN || (len as f64).to_bits() != n.to_bits() {
                return Err(Error::BadEncode(format!("Invalid sequence length {}", n)));
            }
            len
        }
        _ => {
            return Err(Error::BadEncode(
                "Indexed sequence doesn't end with its length".into(),
            ))
        }
    };
    let mut sparse = SparseArray::new(len);
    let mut last = None;
    for (key, value) in entries {
        let index = key
            .parse::<usize>()
            .ok()
            .filter(|index| index.to_string() == key)
            .ok_or_else(|| Error::BadEncode(format!("Invalid sequence index {:?}", key)))?;
        if index >= len {
            return Err(Error::BadEncode(format!(
                "Sequence index {} is past its length {}",
                index, len
            )));
        }
        if last.map_or(false, |last| index <= last) {
            return Err(Error::BadEncode(format!(
                "Sequence index {} is out of order",
                index
            )));
        }
        last = Some(index);
        sparse.insert(index, value)?;
    }
    match sparse.into_dense() {
        Ok(items) => {
            if items.len() >= 2 && !items.iter().any(Value::is_duple) {
                return Err(Error::BadEncode(
                    "A full sequence without duples must be an array code".into(),
                ));
            }
            Ok(Value::Array(items))
        }
        Err(sparse) => Ok(Value::Sparse(sparse)),
    }
}

/// A structural report on a code.
#[derive(Clone, Debug, Serialize)]
pub struct Inspection {
    pub type_name: &'static str,
    pub base_footer: u8,
    pub variant: u8,
    pub footer: u8,
    /// Bytes of the parent this code occupies when inlined.
    pub width: usize,
    pub value: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<PartInspection>,
}

/// One part of an inspected code.
#[derive(Clone, Debug, Serialize)]
pub struct PartInspection {
    /// Set if the part was stored by address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Position in the parent just past this part.
    pub end: usize,
    #[serde(flatten)]
    pub inspection: Inspection,
}

impl Inspection {
    fn write_indented(&self, f: &mut fmt::Formatter, indent: usize) -> fmt::Result {
        writeln!(
            f,
            "{} footer={} (base {} + {}) width={} value={}",
            self.type_name, self.footer, self.base_footer, self.variant, self.width, self.value
        )?;
        for part in self.parts.iter() {
            write!(f, "{:width$}", "", width = indent + 2)?;
            match part.address {
                Some(address) => write!(f, "[..{}] @{}: ", part.end, address)?,
                None => write!(f, "[..{}] inline: ", part.end)?,
            }
            part.inspection.write_indented(f, indent + 2)?;
        }
        Ok(())
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
