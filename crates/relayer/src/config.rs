//! Voter configuration, loaded from a JSON file by the binary.

use primitive_types::H160;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    path::PathBuf,
    time::Duration,
};
use url::Url;

/// Number of most-recent side-chain blocks treated as not yet safe to
/// relay from. Guards against an endpoint momentarily reporting an
/// un-finalized head.
pub const CONFIRMATIONS: u64 = 1;

/// Configuration settings for the voter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Hub chain connection settings.
    pub hub: HubConfig,
    /// Side chain connection settings.
    pub side: SideConfig,
    /// Directory holding the relay-height checkpoint database.
    pub checkpoint_path: PathBuf,
    /// Target contract methods that are allowed to be relayed.
    pub whitelist_methods: Vec<String>,
    /// When greater than zero, unconditionally replaces the persisted
    /// relay height for this run.
    #[serde(default)]
    pub force_relay_height: u64,
    /// Fixed period of the polling loop.
    #[serde(skip, default = "Config::default_poll_interval")]
    pub poll_interval: Duration,
    /// Pause between retries of a failed per-height event fetch.
    #[serde(skip, default = "Config::default_retry_interval")]
    pub retry_interval: Duration,
}

/// Hub chain connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HubConfig {
    /// RPC endpoint of the hub node receiving vote transactions.
    pub endpoint: Url,
    /// Path to the voter's signer key file (32-byte hex ed25519 seed).
    pub wallet_file: PathBuf,
}

/// Side chain connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SideConfig {
    /// Numeric identifier of the side chain as registered on the hub.
    pub side_chain_id: u64,
    /// Address of the bridge contract emitting deposit events.
    pub bridge_contract: H160,
    /// Pool of equivalent side-chain RPC endpoints.
    pub endpoints: Vec<Url>,
}

#[allow(missing_docs)]
impl Config {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

    fn default_poll_interval() -> Duration {
        Self::DEFAULT_POLL_INTERVAL
    }

    fn default_retry_interval() -> Duration {
        Self::DEFAULT_RETRY_INTERVAL
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub: HubConfig {
                endpoint: Url::parse("http://127.0.0.1:20336").expect("valid url"),
                wallet_file: "voter.key".into(),
            },
            side: SideConfig {
                side_chain_id: 0,
                bridge_contract: H160::zero(),
                endpoints: vec![],
            },
            checkpoint_path: "voter-db".into(),
            whitelist_methods: vec![],
            force_relay_height: 0,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            retry_interval: Self::DEFAULT_RETRY_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_round_trips() {
        let raw = r#"{
            "hub": {
                "endpoint": "http://hub.example:20336",
                "wallet_file": "signer.key"
            },
            "side": {
                "side_chain_id": 9,
                "bridge_contract": "0x03e4538018285e1c03ccce2f92c9538c87606911",
                "endpoints": ["http://side-a.example:8545", "http://side-b.example:8545"]
            },
            "checkpoint_path": "voter-db",
            "whitelist_methods": ["unlock"]
        }"#;

        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.side.side_chain_id, 9);
        assert_eq!(config.side.endpoints.len(), 2);
        assert_eq!(config.whitelist_methods, vec!["unlock".to_string()]);
        // Absent override means "use the persisted checkpoint".
        assert_eq!(config.force_relay_height, 0);
        assert_eq!(config.poll_interval, Config::DEFAULT_POLL_INTERVAL);
    }
}
