/*!

Byte layout of codes, registry version 1.

# Codes

A code is a byte string whose last byte is its footer. Everything before the footer is the
code's parts, laid out first part first. Codes are read from the end: the footer says how many
parts there are and how each one is stored, which is enough to find where every part starts.

```text
+=========+=========+-----+========+----------+
| Part 0  | Part 1  | ... | Part N |  Footer  |
+=========+=========+-----+========+----------+
```

# Footers

Each type owns a contiguous range of footer bytes, handed out in this order. A type with `k`
parts owns `5^k` footers; the offset of a footer within its type's range is the *variant*. Short
byte strings are the exception: their variant is their length.

| Footers | Type         | Parts | Meaning                                            |
| --      | --           | --    | --                                                 |
| 0       | undefined    | 0     |                                                    |
| 1       | null         | 0     |                                                    |
| 2       | false        | 0     |                                                    |
| 3       | true         | 0     |                                                    |
| 4-8     | bytes_short  | 0     | 0-4 raw bytes precede the footer                   |
| 9-13    | bytes_long   | 1     | Pair tree of 4-byte words                          |
| 14-38   | duple        | 2     | Ordered pair                                       |
| 39-43   | variable     | 1     | Any code, marked as a root-level stored unit       |
| 44-48   | string       | 1     | The UTF-8 bytes, as a byte string code             |
| 49-53   | number       | 1     | 8-byte little-endian IEEE 754 double               |
| 54-58   | date         | 1     | Like number, in milliseconds since the Unix epoch  |
| 59-63   | array        | 1     | Pair tree of 2 or more items                       |
| 64-68   | sparse_array | 1     | Object of index keys plus a `length` entry         |
| 69      | empty_object | 0     |                                                    |
| 70-74   | object       | 1     | A key-value duple, or a pair tree of them          |

Footers 75-255 are unassigned and always rejected.

# Part Options

Every part slot has an option from 0 to 4. For a duple the variant is
`5 * left_option + right_option`; single-part types use the option as the variant.

- Option 0: the part's code is inlined. Its length is found by reading its own footer.
- Option 1-4: the part is an address of exactly that many bytes, least significant byte first,
	in its shortest form. Address 0 is `0x00`; no other address ends in a zero byte.

An encoder picks the option for each part in order, left part first:

1. If the store already holds the part's code, use its address.
2. Otherwise, if the code is no longer than the address it would be stored at, inline it.
3. Otherwise, append it to the store and use its new address.

Since stored codes are found by step 1 forever after, and the address width only grows, the same
value always yields the same code within one store.

# Pair Trees

Sequences are stored as balanced trees of duples. A sequence of 2 items is a single duple. A
longer sequence of `n` items is split after the largest power of two that is at most `n - 1`; each
half becomes a subtree, and a half with a single item is that item itself.

```text
[a, b, c, d, e]  ->  ((a, b), (c, d)), e
[a, b, c]        ->  (a, b), c
```

Arrays that contain duples, and arrays of fewer than two items, are stored as `sparse_array`
instead, since a duple element is indistinguishable from the tree's own nodes. So are arrays with
holes. The `sparse_array` part is an object whose keys are the decimal indices of the present
items, ascending, followed by a final `length` entry holding a number.

# Objects

Each entry is a duple of a string code and the value's code. An object with a single entry holds
that duple directly; larger objects hold a pair tree of entries, in insertion order. Since every
internal tree node has a duple on its left and every entry has a string there, the entries can
always be recovered.

# Width

The width of a code is how many bytes at the end of a buffer it covers: 1 for types without parts,
the length plus one for short byte strings, and otherwise the footer plus the width of every part.
A complete code's width equals its length. Decoders reject anything else, along with unassigned
footers, parts that run past the start of the buffer, addresses that aren't the footer byte of a
stored code, and nesting deeper than [`MAX_DEPTH`](crate::MAX_DEPTH).

# Canonical Forms

Decoders accept only the layouts an encoder produces, apart from whether a part is inlined or
stored:

- Long byte strings are split into 4-byte words, with only the last word allowed to be shorter.
- Every pair tree has exactly the shape described above.
- A `sparse_array` object ends with its `length`, a whole non-negative number, and every other key
	is an index written without signs or leading zeros, ascending. If it has no holes and no duple
	items, it must be an `array` instead.
- A `variable` code only ever wraps a whole code; it can't be a part.

*/
