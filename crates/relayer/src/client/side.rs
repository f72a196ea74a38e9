//! Side-chain endpoint client.

use super::{
    parse_h160,
    parse_h256,
    parse_quantity,
    strip_0x,
    JsonRpc,
};
use crate::{
    event::CrossChainEvent,
    ports::SideChainClient,
};
use async_trait::async_trait;
use primitive_types::H160;
use serde_json::json;
use url::Url;

/// Topic 0 of the bridge contract's deposit log, as deployed.
const DEPOSIT_TOPIC: &str =
    "0x8f2ef3ad2eea22978fa60b977d2832af27c994647a6db2b787e6261b31d2b0bb";

/// One side-chain RPC endpoint. The engine holds several of these and
/// picks one per polling cycle.
pub struct SideRpcClient {
    rpc: JsonRpc,
    bridge_contract: H160,
}

impl SideRpcClient {
    /// Client for the endpoint at `url`, filtering logs down to
    /// `bridge_contract` deposits.
    pub fn new(url: Url, bridge_contract: H160) -> Self {
        Self {
            rpc: JsonRpc::new(url),
            bridge_contract,
        }
    }
}

#[async_trait]
impl SideChainClient for SideRpcClient {
    async fn current_height(&self) -> anyhow::Result<u64> {
        let height: String = self.rpc.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&height)
    }

    async fn events_at(&self, height: u64) -> anyhow::Result<Vec<CrossChainEvent>> {
        let block = format!("{height:#x}");
        let filter = json!([{
            "fromBlock": block,
            "toBlock": block,
            "address": format!("{:#x}", self.bridge_contract),
            "topics": [DEPOSIT_TOPIC],
        }]);
        let logs: Vec<RawLog> = self.rpc.call("eth_getLogs", filter).await?;
        Ok(decodable_events(height, &logs))
    }
}

/// A log that does not decode is dropped on its own; the rest of the
/// block still relays and the height is never retried for it.
fn decodable_events(height: u64, logs: &[RawLog]) -> Vec<CrossChainEvent> {
    logs.iter()
        .filter_map(|log| match log.to_event() {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!(
                    height,
                    tx_hash = %log.transaction_hash,
                    "dropping undecodable deposit log: {err:#}"
                );
                None
            }
        })
        .collect()
}

#[derive(serde::Deserialize, Debug)]
struct RawLog {
    address: String,
    data: String,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
}

impl RawLog {
    fn to_event(&self) -> anyhow::Result<CrossChainEvent> {
        let contract = parse_h160(&self.address)?;
        let tx_hash = parse_h256(&self.transaction_hash)?;
        let data = hex::decode(strip_0x(&self.data))?;
        CrossChainEvent::decode(contract, tx_hash, &data)
    }
}
