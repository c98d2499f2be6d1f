//! Minimal ABI encoding for the flow and market contracts.
//!
//! Only the handful of calls the payment path needs are supported:
//! `submit((uint256,bytes,(bytes32,uint256)[]))`, `market()`,
//! `pricePerSector()` and decoding of `Error(string)` revert payloads.

use alloy_primitives::{Address, Bytes, U256, keccak256};
use vellum_core::SubmissionDescriptor;

const WORD: usize = 32;

pub const SUBMIT_SIGNATURE: &str = "submit((uint256,bytes,(bytes32,uint256)[]))";
pub const MARKET_SIGNATURE: &str = "market()";
pub const PRICE_PER_SECTOR_SIGNATURE: &str = "pricePerSector()";

/// Selector of the standard `Error(string)` revert payload.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// First four bytes of the keccak hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn push_u256(out: &mut Vec<u8>, value: U256) {
    out.extend_from_slice(&value.to_be_bytes::<WORD>());
}

fn push_usize(out: &mut Vec<u8>, value: usize) {
    push_u256(out, U256::from(value));
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Calldata for `flow.submit(submission)`.
pub fn encode_submit(submission: &SubmissionDescriptor) -> Bytes {
    let tag = submission.tag();
    let nodes = submission.nodes();

    // Tuple head: length, offset(tag), offset(nodes).
    let head_len = 3 * WORD;
    let tag_len = WORD + padded_len(tag.len());

    let mut out = Vec::with_capacity(4 + WORD + head_len + tag_len + WORD + nodes.len() * 2 * WORD);
    out.extend_from_slice(&selector(SUBMIT_SIGNATURE));

    // The only argument is a dynamic tuple, so the call head is its offset.
    push_usize(&mut out, WORD);

    push_u256(&mut out, U256::from(submission.length()));
    push_usize(&mut out, head_len);
    push_usize(&mut out, head_len + tag_len);

    push_usize(&mut out, tag.len());
    out.extend_from_slice(tag);
    out.resize(out.len() + padded_len(tag.len()) - tag.len(), 0);

    push_usize(&mut out, nodes.len());
    for node in nodes {
        out.extend_from_slice(node.root.as_bytes());
        push_u256(&mut out, U256::from(node.height));
    }

    Bytes::from(out)
}

/// Calldata for `flow.market()`.
pub fn encode_market() -> Bytes {
    Bytes::copy_from_slice(&selector(MARKET_SIGNATURE))
}

/// Calldata for `market.pricePerSector()`.
pub fn encode_price_per_sector() -> Bytes {
    Bytes::copy_from_slice(&selector(PRICE_PER_SECTOR_SIGNATURE))
}

/// Decode a single `uint256` return value.
pub fn decode_u256(data: &[u8]) -> Option<U256> {
    if data.len() < WORD {
        return None;
    }
    Some(U256::from_be_slice(&data[..WORD]))
}

/// Decode a single `address` return value. The upper 12 bytes must be zero.
pub fn decode_address(data: &[u8]) -> Option<Address> {
    if data.len() < WORD || data[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_slice(&data[12..WORD]))
}

/// Decode the message of an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
    let offset = usize::try_from(decode_u256(body)?).ok()?;
    let len_word = body.get(offset..offset.checked_add(WORD)?)?;
    let len = usize::try_from(decode_u256(len_word)?).ok()?;
    let start = offset + WORD;
    let message = body.get(start..start.checked_add(len)?)?;
    Some(String::from_utf8_lossy(message).into_owned())
}
