use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>().prop_map(Value::Number),
        any::<u64>().prop_map(|bits| Value::Date(f64::from_bits(bits))),
        prop::collection::vec(any::<u8>(), 0..40).prop_map(Value::Bytes),
        ".{0,24}".prop_map(Value::Str),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Value::duple(l, r)),
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            (
                prop::collection::btree_map(0usize..12, inner.clone(), 0..6),
                0usize..4
            )
                .prop_map(|(items, extra)| {
                    let len = items.keys().last().map_or(0, |k| k + 1) + extra;
                    let mut sparse = SparseArray::new(len);
                    for (i, v) in items {
                        sparse.insert(i, v).unwrap();
                    }
                    // A sparse array without holes comes back as a plain array
                    match sparse.into_dense() {
                        Ok(items) => Value::Array(items),
                        Err(sparse) => Value::Sparse(sparse),
                    }
                }),
            prop::collection::vec(("[a-z]{0,6}", inner), 0..6).prop_map(Value::Object),
        ]
    })
}

// A small alphabet, so codes share prefixes often.
fn code_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    let byte = prop_oneof![Just(0x00u8), Just(0xf0), Just(0xff), any::<u8>()];
    prop::collection::vec(byte, 1..=5)
}

#[derive(Clone, Debug)]
enum Op {
    Set(Vec<u8>),
    Delete(Vec<u8>),
    Get(Vec<u8>),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let code = code_strategy();
    let op = prop_oneof![
        50 => code.clone().prop_map(Op::Set),
        20 => code.clone().prop_map(Op::Delete),
        30 => code.prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=400)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_value_round_trip(value in value_strategy()) {
        let codec = Codec::new();
        let mut store = Store::new();
        let code = codec.encode(&mut store, &value).unwrap();
        prop_assert_eq!(codec.width(&code).unwrap(), code.len());
        prop_assert_eq!(codec.decode(&store, &code).unwrap(), value.clone());

        let len = store.byte_len();
        prop_assert_eq!(codec.encode(&mut store, &value).unwrap(), code);
        prop_assert_eq!(store.byte_len(), len);
    }

    #[test]
    fn prop_values_share_a_store(values in prop::collection::vec(value_strategy(), 1..8)) {
        let codec = Codec::new();
        let mut store = Store::new();
        let codes: Vec<Vec<u8>> = values
            .iter()
            .map(|v| codec.encode(&mut store, v).unwrap())
            .collect();
        for (value, code) in values.iter().zip(codes.iter()) {
            prop_assert_eq!(&codec.decode(&store, code).unwrap(), value);
        }
    }

    #[test]
    fn prop_trie_matches_map(ops in ops_strategy()) {
        let mut trie = CodeTrie::new();
        let mut model: BTreeMap<Vec<u8>, Address> = BTreeMap::new();
        let mut next: Address = 0;

        for op in ops {
            match op {
                Op::Set(code) => {
                    let res = trie.set(code.clone(), next);
                    if model.contains_key(&code) {
                        prop_assert!(matches!(res, Err(Error::DuplicateCode)));
                    } else {
                        prop_assert!(res.is_ok());
                        model.insert(code, next);
                    }
                    next += 1;
                }
                Op::Delete(code) => {
                    let res = trie.delete(&code);
                    match model.remove(&code) {
                        Some(address) => prop_assert_eq!(res.ok(), Some(address)),
                        None => prop_assert!(res.is_err()),
                    }
                }
                Op::Get(code) => {
                    prop_assert_eq!(trie.get(&code), model.get(&code).copied());
                }
            }
        }

        for (code, address) in model.iter() {
            prop_assert_eq!(trie.get(code), Some(*address));
        }
    }

    #[test]
    fn prop_trie_snapshots(
        codes in prop::collection::vec(code_strategy(), 1..60),
        cut in any::<prop::sample::Index>(),
    ) {
        let mut trie = CodeTrie::new();
        let mut model: BTreeMap<Vec<u8>, Address> = BTreeMap::new();
        for (i, code) in codes.iter().enumerate() {
            if !model.contains_key(code) {
                trie.set(code.clone(), i as Address).unwrap();
                model.insert(code.clone(), i as Address);
            }
        }

        let at = cut.index(codes.len()) as Address;
        let mut snapshot = trie.clone_at(at);
        for (code, address) in model.iter() {
            prop_assert_eq!(snapshot.get(code), (*address <= at).then_some(*address));
        }

        // Longer than any generated code, so never already bound
        let fresh = vec![0xaa; 7];
        snapshot.set(fresh.clone(), 1000).unwrap();
        prop_assert_eq!(trie.get(&fresh), None);

        for code in model.keys() {
            trie.delete(code).unwrap();
        }
        for (code, address) in model.iter() {
            prop_assert_eq!(snapshot.get(code), (*address <= at).then_some(*address));
        }
        prop_assert_eq!(snapshot.get(&fresh), Some(1000));
    }

    #[test]
    fn prop_decode_arbitrary_bytes(code in prop::collection::vec(any::<u8>(), 0..64)) {
        let codec = Codec::new();
        let mut store = Store::new();
        codec
            .encode(&mut store, &Value::from("a few stored parts to point into"))
            .unwrap();
        // Any outcome is fine, as long as it doesn't panic
        let _ = codec.decode(&store, &code);
        let _ = codec.inspect(&store, &code);
    }
}
