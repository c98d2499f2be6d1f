//! Ledger client trait and JSON-RPC implementation.

use crate::error::{LedgerError, LedgerResult};
use crate::signer::UnsignedTransaction;
use alloy_primitives::{Address, B256, Bytes, U256, hex};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::instrument;

/// A read-only contract call or gas simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: Option<U256>,
    pub data: Bytes,
}

impl CallRequest {
    pub fn new(to: Address, data: Bytes) -> Self {
        Self {
            from: None,
            to,
            value: None,
            data,
        }
    }

    fn to_json(&self) -> Value {
        let mut obj = json!({
            "to": self.to,
            "data": self.data,
        });
        if let Some(from) = self.from {
            obj["from"] = json!(from);
        }
        if let Some(value) = self.value {
            obj["value"] = json!(quantity(value));
        }
        obj
    }
}

impl From<&UnsignedTransaction> for CallRequest {
    fn from(tx: &UnsignedTransaction) -> Self {
        Self {
            from: Some(tx.from),
            to: tx.to,
            value: Some(tx.value),
            data: tx.input.clone(),
        }
    }
}

/// The subset of a transaction receipt the payment path inspects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub status: bool,
}

/// Access to a ledger node.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Endpoint used for log and error context.
    fn endpoint(&self) -> &str;

    async fn chain_id(&self) -> LedgerResult<u64>;

    /// Execute a call without creating a transaction. `block` of `None` means latest.
    async fn call(&self, call: &CallRequest, block: Option<u64>) -> LedgerResult<Bytes>;

    async fn estimate_gas(&self, call: &CallRequest) -> LedgerResult<u64>;

    async fn gas_price(&self) -> LedgerResult<U256>;

    /// Pending nonce for `address`.
    async fn transaction_count(&self, address: Address) -> LedgerResult<u64>;

    async fn send_raw_transaction(&self, raw: &Bytes) -> LedgerResult<B256>;

    /// Submit a transaction for the node to sign with an unlocked account.
    async fn send_transaction(&self, tx: &UnsignedTransaction) -> LedgerResult<B256>;

    /// Receipt for a mined transaction, `None` while pending.
    async fn transaction_receipt(&self, tx_hash: B256) -> LedgerResult<Option<RpcReceipt>>;
}

/// Ledger client speaking Ethereum JSON-RPC over HTTP.
pub struct JsonRpcLedger {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcLedger {
    /// Create a client with a per-request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> LedgerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    fn unavailable(&self, reason: impl Into<String>) -> LedgerError {
        LedgerError::ProviderUnavailable {
            endpoint: self.endpoint.clone(),
            reason: reason.into(),
        }
    }

    async fn request(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unavailable(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.unavailable(format!("{method}: HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.unavailable(format!("{method}: {e}")))?;
        let parsed: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| LedgerError::ambiguous(format!("{method}: malformed response: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(LedgerError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
                data: error.data.as_ref().and_then(revert_data),
            });
        }

        parsed
            .result
            .ok_or_else(|| LedgerError::ambiguous(format!("{method}: response has no result")))
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn chain_id(&self) -> LedgerResult<u64> {
        let value = self.request("eth_chainId", json!([])).await?;
        parse_u64("eth_chainId", &value)
    }

    #[instrument(skip(self, call), fields(endpoint = %self.endpoint, to = %call.to))]
    async fn call(&self, call: &CallRequest, block: Option<u64>) -> LedgerResult<Bytes> {
        let block = block.map_or_else(|| json!("latest"), |n| json!(format!("{n:#x}")));
        let value = self.request("eth_call", json!([call.to_json(), block])).await?;
        parse_bytes("eth_call", &value)
    }

    #[instrument(skip(self, call), fields(endpoint = %self.endpoint, to = %call.to))]
    async fn estimate_gas(&self, call: &CallRequest) -> LedgerResult<u64> {
        let value = self
            .request("eth_estimateGas", json!([call.to_json()]))
            .await?;
        parse_u64("eth_estimateGas", &value)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn gas_price(&self) -> LedgerResult<U256> {
        let value = self.request("eth_gasPrice", json!([])).await?;
        parse_u256("eth_gasPrice", &value)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn transaction_count(&self, address: Address) -> LedgerResult<u64> {
        let value = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_u64("eth_getTransactionCount", &value)
    }

    #[instrument(skip(self, raw), fields(endpoint = %self.endpoint, len = raw.len()))]
    async fn send_raw_transaction(&self, raw: &Bytes) -> LedgerResult<B256> {
        let value = self
            .request("eth_sendRawTransaction", json!([raw]))
            .await?;
        parse_b256("eth_sendRawTransaction", &value)
    }

    #[instrument(skip(self, tx), fields(endpoint = %self.endpoint, from = %tx.from, nonce = tx.nonce))]
    async fn send_transaction(&self, tx: &UnsignedTransaction) -> LedgerResult<B256> {
        let params = json!([{
            "from": tx.from,
            "to": tx.to,
            "value": quantity(tx.value),
            "data": tx.input,
            "gas": format!("{:#x}", tx.gas_limit),
            "gasPrice": quantity(tx.gas_price),
            "nonce": format!("{:#x}", tx.nonce),
            "chainId": format!("{:#x}", tx.chain_id),
        }]);
        let value = self.request("eth_sendTransaction", params).await?;
        parse_b256("eth_sendTransaction", &value)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn transaction_receipt(&self, tx_hash: B256) -> LedgerResult<Option<RpcReceipt>> {
        let value = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await;
        let value = match value {
            Ok(Value::Null) => return Ok(None),
            // Some nodes answer a pending receipt with a missing result.
            Err(LedgerError::AmbiguousLedgerFault { reason, .. })
                if reason.ends_with("response has no result") =>
            {
                return Ok(None);
            }
            other => other?,
        };
        parse_receipt(&value).map(Some)
    }
}

/// Format a U256 as a JSON-RPC quantity.
fn quantity(value: U256) -> String {
    format!("{value:#x}")
}

fn as_hex_str<'a>(method: &str, value: &'a Value) -> LedgerResult<&'a str> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("0x"))
        .ok_or_else(|| LedgerError::ambiguous(format!("{method}: expected hex string, got {value}")))
}

pub(crate) fn parse_u64(method: &str, value: &Value) -> LedgerResult<u64> {
    let digits = as_hex_str(method, value)?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::ambiguous(format!("{method}: invalid quantity: {e}")))
}

pub(crate) fn parse_u256(method: &str, value: &Value) -> LedgerResult<U256> {
    let digits = as_hex_str(method, value)?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::ambiguous(format!("{method}: invalid quantity: {e}")))
}

fn parse_bytes(method: &str, value: &Value) -> LedgerResult<Bytes> {
    let digits = as_hex_str(method, value)?;
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| LedgerError::ambiguous(format!("{method}: invalid hex data: {e}")))
}

fn parse_b256(method: &str, value: &Value) -> LedgerResult<B256> {
    let bytes = parse_bytes(method, value)?;
    if bytes.len() != 32 {
        return Err(LedgerError::ambiguous(format!(
            "{method}: expected 32-byte hash, got {} bytes",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

fn parse_receipt(value: &Value) -> LedgerResult<RpcReceipt> {
    const METHOD: &str = "eth_getTransactionReceipt";
    let field = |name: &str| {
        value
            .get(name)
            .ok_or_else(|| LedgerError::ambiguous(format!("{METHOD}: receipt missing {name}")))
    };

    let status = match field("status")?.as_str() {
        Some("0x1") => true,
        Some("0x0") => false,
        other => {
            return Err(LedgerError::ambiguous(format!(
                "{METHOD}: unexpected receipt status {other:?}"
            )));
        }
    };

    Ok(RpcReceipt {
        transaction_hash: parse_b256(METHOD, field("transactionHash")?)?,
        block_number: parse_u64(METHOD, field("blockNumber")?)?,
        gas_used: parse_u64(METHOD, field("gasUsed")?)?,
        status,
    })
}

/// Extract revert bytes from the `data` member of a JSON-RPC error.
///
/// Nodes put it either directly in `data` or in `data.data`.
fn revert_data(data: &Value) -> Option<Bytes> {
    let s = match data {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .ok()
        .map(Bytes::from)
}
