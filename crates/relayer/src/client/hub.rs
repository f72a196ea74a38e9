//! Hub-chain client: done-marker queries and signed vote submission.

use super::{
    parse_h256,
    JsonRpc,
};
use crate::ports::{
    HubClient,
    TxHandle,
};
use anyhow::{
    anyhow,
    Context,
};
use async_trait::async_trait;
use ed25519_dalek::{
    Signer as _,
    SigningKey,
};
use serde_json::json;
use std::path::Path;
use url::Url;

/// Hub-side address of the native cross-chain manager contract whose
/// storage holds the "done" markers.
const CROSS_CHAIN_MANAGER: &str = "0x0000000000000000000000000000000000000009";

/// Prefix of a "done" marker storage key.
const DONE_TX_PREFIX: &[u8] = b"done_tx";

/// Ed25519 key the voter signs vote transactions with.
pub struct Signer {
    key: SigningKey,
}

// The secret half stays out of logs and error chains.
impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("public", &self.public_hex())
            .finish()
    }
}

impl Signer {
    /// Load the signer from a 32-byte hex seed file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read wallet file {}", path.as_ref().display()))?;
        let bytes = hex::decode(raw.trim()).context("wallet file is not hex")?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| anyhow!("expected a 32-byte seed, got {}", bytes.len()))?;
        Ok(Self::from_seed(seed))
    }

    /// Signer over a raw 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Hex-encoded public key, the voter's identity on the hub.
    pub fn public_hex(&self) -> String {
        hex::encode(self.key.verifying_key().to_bytes())
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.key.sign(message).to_bytes()
    }
}

/// Client submitting votes to a hub node.
pub struct HubRpcClient {
    rpc: JsonRpc,
    signer: Signer,
}

impl HubRpcClient {
    /// Client for the hub node at `url`, voting as `signer`.
    pub fn new(url: Url, signer: Signer) -> Self {
        Self {
            rpc: JsonRpc::new(url),
            signer,
        }
    }
}

/// Storage key of the "done" marker for one transfer:
/// prefix, then the 8-byte little-endian side chain id, then the
/// cross-chain id bytes.
fn done_key(side_chain_id: u64, cross_chain_id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(DONE_TX_PREFIX.len() + 8 + cross_chain_id.len());
    key.extend_from_slice(DONE_TX_PREFIX);
    key.extend_from_slice(&side_chain_id.to_le_bytes());
    key.extend_from_slice(cross_chain_id);
    key
}

/// Message the voter signs: binds chain id, height, and payload so the
/// hub can attribute and replay-check the vote.
fn vote_digest(side_chain_id: u64, payload: &[u8], height: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(16 + payload.len());
    message.extend_from_slice(&side_chain_id.to_le_bytes());
    message.extend_from_slice(&height.to_le_bytes());
    message.extend_from_slice(payload);
    message
}

#[async_trait]
impl HubClient for HubRpcClient {
    async fn already_finalized(
        &self,
        side_chain_id: u64,
        cross_chain_id: &[u8],
    ) -> anyhow::Result<bool> {
        let key = hex::encode(done_key(side_chain_id, cross_chain_id));
        let raw: Option<String> = self
            .rpc
            .call("getstorage", json!([CROSS_CHAIN_MANAGER, key]))
            .await?;
        Ok(raw.is_some_and(|value| !value.is_empty()))
    }

    async fn submit_vote(
        &self,
        side_chain_id: u64,
        payload: &[u8],
        height: u64,
    ) -> anyhow::Result<TxHandle> {
        let signature = self.signer.sign(&vote_digest(side_chain_id, payload, height));
        let tx_hash: String = self
            .rpc
            .call(
                "submitvote",
                json!([{
                    "side_chain_id": side_chain_id,
                    "height": height,
                    "payload": hex::encode(payload),
                    "signer": self.signer.public_hex(),
                    "signature": hex::encode(signature),
                }]),
            )
            .await?;
        parse_h256(&tx_hash)
    }
}
