//! Minimal Solidity ABI codec for the record contract.
//!
//! Only what the contract needs: `uint256` words and dynamic `string`s,
//! head/tail encoded. Decoding is bounds-checked throughout; a malformed
//! return is a `Decode` error, never a panic.

use ledger_api::{LedgerError, LedgerRecord};

const WORD: usize = 32;

/// `storeData(string,string,string)`
pub const STORE_DATA: [u8; 4] = [0xd4, 0x00, 0x1e, 0xf2];
/// `getRecord(uint256)`
pub const GET_RECORD: [u8; 4] = [0x03, 0xe9, 0xe6, 0x09];
/// `getTotalRecords()`
pub const GET_TOTAL_RECORDS: [u8; 4] = [0x0a, 0xea, 0xcb, 0x5e];
/// `DataStored(uint256,string,string,string)` event topic.
pub const DATA_STORED_TOPIC: &str =
    "c27557253cfa793c3de4beda3cf3aad78548fbff6f148459c5d4e26e97d6e258";

// ═══════════════════════════════════════════════════════════════
//  Encode
// ═══════════════════════════════════════════════════════════════

fn uint_word(v: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&v.to_be_bytes());
    word
}

fn padded_len(n: usize) -> usize {
    n.div_ceil(WORD) * WORD
}

/// Calldata for a function taking only `string` arguments.
pub fn encode_strings_call(selector: [u8; 4], args: &[&str]) -> Vec<u8> {
    let head_len = args.len() * WORD;
    let tail_len: usize = args.iter().map(|s| WORD + padded_len(s.len())).sum();

    let mut out = Vec::with_capacity(4 + head_len + tail_len);
    out.extend_from_slice(&selector);

    let mut offset = head_len;
    for s in args {
        out.extend_from_slice(&uint_word(offset as u64));
        offset += WORD + padded_len(s.len());
    }
    for s in args {
        out.extend_from_slice(&uint_word(s.len() as u64));
        out.extend_from_slice(s.as_bytes());
        out.resize(out.len() + padded_len(s.len()) - s.len(), 0);
    }
    out
}

/// Calldata for a function taking a single `uint256`.
pub fn encode_uint_call(selector: [u8; 4], arg: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD);
    out.extend_from_slice(&selector);
    out.extend_from_slice(&uint_word(arg));
    out
}

// ═══════════════════════════════════════════════════════════════
//  Decode
// ═══════════════════════════════════════════════════════════════

fn word_at(data: &[u8], pos: usize) -> Result<&[u8], LedgerError> {
    pos.checked_add(WORD)
        .and_then(|end| data.get(pos..end))
        .ok_or_else(|| LedgerError::decode(format!("ABI: word at {pos} past end ({} bytes)", data.len())))
}

/// `uint256` at byte position `pos`, narrowed to u64.
pub fn decode_uint(data: &[u8], pos: usize) -> Result<u64, LedgerError> {
    let word = word_at(data, pos)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(LedgerError::decode("ABI: uint256 does not fit in 64 bits"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(buf))
}

fn decode_usize(data: &[u8], pos: usize) -> Result<usize, LedgerError> {
    usize::try_from(decode_uint(data, pos)?).map_err(|_| LedgerError::decode("ABI: offset overflow"))
}

/// Dynamic `string` whose offset lives in head slot `slot`.
pub fn decode_string(data: &[u8], slot: usize) -> Result<String, LedgerError> {
    let offset = decode_usize(data, slot * WORD)?;
    let len = decode_usize(data, offset)?;
    let start = offset + WORD;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| LedgerError::decode(format!("ABI: string of {len} bytes past end")))?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// `(uint256, string, string, string)`: the shape of both the
/// `getRecord` return and the `DataStored` event data.
pub fn decode_record(data: &[u8]) -> Result<LedgerRecord, LedgerError> {
    Ok(LedgerRecord {
        timestamp: decode_uint(data, 0)?,
        source_id: decode_string(data, 1)?,
        category: decode_string(data, 2)?,
        value: decode_string(data, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Return data as a node would produce it for `(ts, a, b, c)`.
    fn record_return(ts: u64, fields: [&str; 3]) -> Vec<u8> {
        let strings = encode_strings_call([0; 4], &fields);
        let mut out = uint_word(ts).to_vec();
        // Re-base the three string offsets by one extra head word.
        for slot in 0..3 {
            let off = decode_uint(&strings[4..], slot * WORD).unwrap() + WORD as u64;
            out.extend_from_slice(&uint_word(off));
        }
        out.extend_from_slice(&strings[4 + 3 * WORD..]);
        out
    }

    #[test]
    fn store_data_calldata_layout() {
        let data = encode_strings_call(STORE_DATA, &["TEST001", "Temperature", "22.5°C"]);
        assert_eq!(&data[..4], &STORE_DATA);
        let body = &data[4..];
        assert_eq!(body.len() % WORD, 0);
        // Offsets: 3 head words, then each string takes len word + one data word.
        assert_eq!(decode_uint(body, 0).unwrap(), 96);
        assert_eq!(decode_uint(body, 32).unwrap(), 160);
        assert_eq!(decode_uint(body, 64).unwrap(), 224);
        assert_eq!(decode_string(body, 2).unwrap(), "22.5°C");
    }

    #[test]
    fn empty_string_takes_only_length_word() {
        let data = encode_strings_call(STORE_DATA, &["", "x"]);
        let body = &data[4..];
        assert_eq!(decode_uint(body, 32).unwrap(), 64 + 32);
        assert_eq!(decode_string(body, 0).unwrap(), "");
        assert_eq!(decode_string(body, 1).unwrap(), "x");
    }

    #[test]
    fn uint_call_is_selector_plus_word() {
        let data = encode_uint_call(GET_RECORD, 7);
        assert_eq!(data.len(), 36);
        assert_eq!(decode_uint(&data[4..], 0).unwrap(), 7);
    }

    #[test]
    fn decodes_record_tuple() {
        let data = record_return(1_718_000_000, ["D1", "Humidity", "55%"]);
        let rec = decode_record(&data).unwrap();
        assert_eq!(rec.timestamp, 1_718_000_000);
        assert_eq!(rec.source_id, "D1");
        assert_eq!(rec.category, "Humidity");
        assert_eq!(rec.value, "55%");
    }

    #[test]
    fn truncated_return_is_decode_error() {
        let data = record_return(1, ["a", "b", "c"]);
        let err = decode_record(&data[..data.len() - 40]).unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));
    }

    #[test]
    fn oversized_uint_is_rejected() {
        let mut word = [0u8; WORD];
        word[0] = 1;
        assert!(decode_uint(&word, 0).is_err());
    }
}
