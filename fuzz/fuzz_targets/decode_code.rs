#![no_main]
use libfuzzer_sys::fuzz_target;
use turtle_pack::{Codec, Store, Value};

fuzz_target!(|data: &[u8]| {
    let codec = Codec::new();
    let mut store = Store::new();
    let _ = codec.encode(&mut store, &Value::from("seed text, stored in a few parts"));
    let _ = codec.decode(&store, data);
});
