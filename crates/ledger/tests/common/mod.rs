#![allow(dead_code)]

use alloy_primitives::{Address, B256, U256, hex};
use httpmock::Method::POST;
use httpmock::{Mock, MockServer};
use serde_json::{Value, json};
use std::net::TcpListener;
use vellum_core::NetworkProfile;
use vellum_ledger::abi;

pub const CHAIN_ID: u64 = 31337;
pub const MARKET: Address = Address::repeat_byte(0x4d);
pub const SENDER: Address = Address::repeat_byte(0x5e);

pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

pub fn profile_for(server: &MockServer) -> NetworkProfile {
    NetworkProfile::local("primary", &server.url("/"), "http://127.0.0.1:5678")
}

pub fn tx_hash() -> B256 {
    B256::repeat_byte(0xaa)
}

pub fn word(value: U256) -> String {
    format!("0x{}", hex::encode(value.to_be_bytes::<32>()))
}

pub fn address_word(address: Address) -> String {
    format!("0x{}{}", "00".repeat(12), hex::encode(address))
}

pub fn selector_hex(signature: &str) -> String {
    hex::encode(abi::selector(signature))
}

pub fn revert_payload(reason: &str) -> String {
    let mut out = abi::ERROR_STRING_SELECTOR.to_vec();
    out.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
    out.extend_from_slice(&U256::from(reason.len()).to_be_bytes::<32>());
    let mut msg = reason.as_bytes().to_vec();
    msg.resize(reason.len().div_ceil(32) * 32, 0);
    out.extend_from_slice(&msg);
    format!("0x{}", hex::encode(out))
}

/// Mock one JSON-RPC method, optionally narrowed by a body fragment.
pub fn mock_rpc<'a>(
    server: &'a MockServer,
    method: &str,
    body_fragment: Option<&str>,
    response: Value,
) -> Mock<'a> {
    let method_fragment = format!("\"method\":\"{method}\"");
    let body_fragment = body_fragment.map(str::to_string);
    server.mock(|when, then| {
        let mut when = when.method(POST).body_contains(method_fragment.as_str());
        if let Some(fragment) = body_fragment.as_deref() {
            when = when.body_contains(fragment);
        }
        let _ = when;
        then.status(200).json_body(response.clone());
    })
}

pub fn ok(result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result })
}

pub fn rpc_error(code: i64, message: &str, data: Option<&str>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = json!(data);
    }
    json!({ "jsonrpc": "2.0", "id": 1, "error": error })
}

/// Market and price lookups with `price` wei per sector.
pub fn mock_pricing(server: &MockServer, price: u64) {
    mock_rpc(
        server,
        "eth_call",
        Some(&selector_hex(abi::MARKET_SIGNATURE)),
        ok(json!(address_word(MARKET))),
    );
    mock_rpc(
        server,
        "eth_call",
        Some(&selector_hex(abi::PRICE_PER_SECTOR_SIGNATURE)),
        ok(json!(word(U256::from(price)))),
    );
}

pub fn mock_gas(server: &MockServer, gas_price: u64, estimate: Option<u64>) {
    mock_rpc(server, "eth_gasPrice", None, ok(json!(format!("{gas_price:#x}"))));
    let estimate = match estimate {
        Some(limit) => ok(json!(format!("{limit:#x}"))),
        None => rpc_error(3, "execution reverted", None),
    };
    mock_rpc(server, "eth_estimateGas", None, estimate);
}

/// Chain id, nonce and a node-signed send returning [`tx_hash`].
pub fn mock_send(server: &MockServer) {
    mock_rpc(server, "eth_chainId", None, ok(json!(format!("{CHAIN_ID:#x}"))));
    mock_rpc(server, "eth_getTransactionCount", None, ok(json!("0x7")));
    mock_rpc(server, "eth_sendTransaction", None, ok(json!(tx_hash())));
}

pub fn receipt(status: bool) -> Value {
    ok(json!({
        "transactionHash": tx_hash(),
        "blockNumber": "0x10",
        "gasUsed": "0x5208",
        "status": if status { "0x1" } else { "0x0" },
    }))
}
