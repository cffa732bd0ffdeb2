//! Address parts.
//!
//! An address embedded in a code is written least-significant byte first, using the fewest bytes
//! that can hold it. Address 0 takes a single zero byte. The width of an address part doubles as
//! the part's option number, so widths run from 1 to [`MAX_ADDRESS_WIDTH`].

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    error::{Error, Result},
    Address, MAX_ADDRESS_WIDTH,
};

/// Number of bytes needed to write `address` as a part. Fails if it needs more than
/// [`MAX_ADDRESS_WIDTH`] bytes.
pub fn address_width(address: Address) -> Result<usize> {
    let significant = (64 - address.leading_zeros() as usize + 7) / 8;
    let width = significant.max(1);
    if width > MAX_ADDRESS_WIDTH {
        return Err(Error::AddressOverflow(address));
    }
    Ok(width)
}

/// Append the shortest encoding of `address` to `buf`, returning the width used.
pub fn encode_address(buf: &mut Vec<u8>, address: Address) -> Result<usize> {
    let width = address_width(address)?;
    let mut raw = [0u8; 8];
    LittleEndian::write_u64(&mut raw, address);
    buf.extend_from_slice(&raw[..width]);
    Ok(width)
}

/// Read an address part. The whole slice is the part; it must be the shortest encoding of its
/// value.
pub fn decode_address(bytes: &[u8]) -> Result<Address> {
    if bytes.is_empty() || bytes.len() > MAX_ADDRESS_WIDTH {
        return Err(Error::BadEncode(format!(
            "Address part must be 1-{} bytes, got {}",
            MAX_ADDRESS_WIDTH,
            bytes.len()
        )));
    }
    if bytes.len() > 1 && bytes[bytes.len() - 1] == 0 {
        return Err(Error::BadEncode(format!(
            "Got {}-byte address {:x?}. This is not the shortest encoding.",
            bytes.len(),
            bytes
        )));
    }
    Ok(LittleEndian::read_uint(bytes, bytes.len()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn edge_cases() -> Vec<(Address, Vec<u8>)> {
        vec![
            (0, vec![0x00]),
            (1, vec![0x01]),
            (0xff, vec![0xff]),
            (0x100, vec![0x00, 0x01]),
            (0x1234, vec![0x34, 0x12]),
            (0xffff, vec![0xff, 0xff]),
            (0x10000, vec![0x00, 0x00, 0x01]),
            (0xffffff, vec![0xff, 0xff, 0xff]),
            (0x1000000, vec![0x00, 0x00, 0x00, 0x01]),
            (0xffffffff, vec![0xff, 0xff, 0xff, 0xff]),
        ]
    }

    #[test]
    fn shortest_widths() {
        for (address, expected) in edge_cases() {
            let mut enc = Vec::new();
            let width = encode_address(&mut enc, address).unwrap();
            assert_eq!(enc, expected, "encoding {:#x}", address);
            assert_eq!(width, expected.len());
            assert_eq!(address_width(address).unwrap(), width);
            assert_eq!(decode_address(&enc).unwrap(), address);
        }
    }

    #[test]
    fn too_wide() {
        let mut enc = Vec::new();
        match encode_address(&mut enc, 0x1_0000_0000) {
            Err(Error::AddressOverflow(a)) => assert_eq!(a, 0x1_0000_0000),
            other => panic!("Expected overflow, got {:?}", other),
        }
        assert!(enc.is_empty());
        assert!(decode_address(&[1, 2, 3, 4, 5]).is_err());
        assert!(decode_address(&[]).is_err());
    }

    #[test]
    fn not_shortest() {
        let test_cases = vec![vec![0x00, 0x00], vec![0x12, 0x00], vec![0xff, 0xff, 0x00]];
        for case in test_cases {
            let err = decode_address(&case).unwrap_err();
            if let Error::BadEncode(_) = err {
            } else {
                panic!("Was expecting a different error class for this");
            }
        }
    }
}
