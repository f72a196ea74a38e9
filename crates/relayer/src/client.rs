//! Thin JSON-RPC clients implementing the chain ports.
//!
//! These adapters keep the engine free of wire concerns: the side
//! client speaks the EVM-style `eth_*` surface of the side chain, the
//! hub client speaks the hub node's storage-query and vote-submission
//! methods.

mod hub;
mod side;

pub use hub::{
    HubRpcClient,
    Signer,
};
pub use side::SideRpcClient;

use anyhow::anyhow;
use primitive_types::{
    H160,
    H256,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

struct JsonRpc {
    http: reqwest::Client,
    url: Url,
}

impl JsonRpc {
    fn new(url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    async fn call<T>(&self, method: &str, params: serde_json::Value) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
    {
        #[derive(serde::Deserialize)]
        struct Reply {
            #[serde(default)]
            result: serde_json::Value,
            #[serde(default)]
            error: Option<RpcError>,
        }

        #[derive(serde::Deserialize, Debug)]
        struct RpcError {
            code: i64,
            message: String,
        }

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let reply: Reply = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = reply.error {
            return Err(anyhow!("rpc error {}: {}", err.code, err.message));
        }
        Ok(serde_json::from_value(reply.result)?)
    }
}

fn strip_0x(raw: &str) -> &str {
    raw.strip_prefix("0x").unwrap_or(raw)
}

fn parse_h160(raw: &str) -> anyhow::Result<H160> {
    let bytes = hex::decode(strip_0x(raw))?;
    if bytes.len() != 20 {
        return Err(anyhow!("expected 20-byte address, got {} bytes", bytes.len()));
    }
    Ok(H160::from_slice(&bytes))
}

fn parse_h256(raw: &str) -> anyhow::Result<H256> {
    let bytes = hex::decode(strip_0x(raw))?;
    if bytes.len() != 32 {
        return Err(anyhow!("expected 32-byte hash, got {} bytes", bytes.len()));
    }
    Ok(H256::from_slice(&bytes))
}

fn parse_quantity(raw: &str) -> anyhow::Result<u64> {
    Ok(u64::from_str_radix(strip_0x(raw), 16)?)
}
