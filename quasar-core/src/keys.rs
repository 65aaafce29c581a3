//! Key and address encodings
//!
//! - hex: lowercase on encode, case-insensitive on decode
//! - 8-bit <-> 5-bit regrouping used by bech32 data parts
//! - NIP-19 `npub` / `nsec` strings

use crate::error::{Error, Result};
use bech32::{Bech32, Hrp};

const NPUB_HRP: &str = "npub";
const NSEC_HRP: &str = "nsec";

/// Encode bytes as lowercase hex
pub fn hex_encode<T: AsRef<[u8]>>(data: T) -> String {
    hex::encode(data)
}

/// Decode hex in either case
pub fn hex_decode(data: &str) -> Result<Vec<u8>> {
    hex::decode(data).map_err(|e| Error::InvalidHex(format!("{}: {}", e, data)))
}

/// Regroup a stream of `from`-bit values into `to`-bit values.
///
/// With `pad` the final partial group is zero-filled. Without it the leftover
/// bits must be fewer than `from` and all zero, otherwise
/// [`Error::InvalidPadding`] is returned.
pub fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>> {
    if !(1..=8).contains(&from) || !(1..=8).contains(&to) {
        return Err(Error::InvalidData(format!(
            "cannot regroup {}-bit values into {}-bit values",
            from, to
        )));
    }

    let max_value: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        let value = u32::from(value);
        if value >> from != 0 {
            return Err(Error::InvalidData(format!(
                "value {} does not fit in {} bits",
                value, from
            )));
        }
        acc = ((acc << from) | value) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return Err(Error::InvalidPadding);
    }

    Ok(out)
}

/// Split bytes into 5-bit groups, zero-padding the last group
pub fn to_base32(data: &[u8]) -> Vec<u8> {
    // 8 -> 5 with padding accepts every byte value
    convert_bits(data, 8, 5, true).unwrap_or_default()
}

/// Pack 5-bit groups back into bytes
pub fn from_base32(data: &[u8]) -> Result<Vec<u8>> {
    convert_bits(data, 5, 8, false)
}

/// Encode a 32-byte public key as `npub1...`
pub fn to_npub(public_key: &[u8; 32]) -> Result<String> {
    encode_bech32(NPUB_HRP, public_key)
}

/// Decode `npub1...` into a 32-byte public key
pub fn from_npub(npub: &str) -> Result<[u8; 32]> {
    decode_bech32(NPUB_HRP, npub)
}

/// Encode a 32-byte secret key as `nsec1...`
pub fn to_nsec(secret_key: &[u8; 32]) -> Result<String> {
    encode_bech32(NSEC_HRP, secret_key)
}

/// Decode `nsec1...` into a 32-byte secret key
pub fn from_nsec(nsec: &str) -> Result<[u8; 32]> {
    decode_bech32(NSEC_HRP, nsec)
}

fn encode_bech32(hrp: &str, data: &[u8; 32]) -> Result<String> {
    let hrp = Hrp::parse(hrp).map_err(|e| Error::Bech32(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| Error::Bech32(e.to_string()))
}

fn decode_bech32(expected_hrp: &str, encoded: &str) -> Result<[u8; 32]> {
    let expected = Hrp::parse(expected_hrp).map_err(|e| Error::Bech32(e.to_string()))?;
    let (hrp, data) = bech32::decode(encoded).map_err(|e| Error::Bech32(e.to_string()))?;

    if hrp != expected {
        return Err(Error::Bech32(format!(
            "expected prefix {}, got {}",
            expected_hrp, hrp
        )));
    }

    data.try_into().map_err(|data: Vec<u8>| {
        Error::Bech32(format!("expected 32 bytes, got {}", data.len()))
    })
}
