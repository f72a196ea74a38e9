//! Ports used by the relay engine to access the outside world.

use crate::event::CrossChainEvent;
use async_trait::async_trait;
use primitive_types::H256;

/// Reference to a vote transaction accepted for broadcast on the hub
/// chain. Usable for logging only; a returned handle means "submitted",
/// not "confirmed".
pub type TxHandle = H256;

/// One equivalent side-chain RPC endpoint.
#[async_trait]
pub trait SideChainClient: Send + Sync {
    /// Best-effort head height of the side chain as reported by this
    /// endpoint.
    async fn current_height(&self) -> anyhow::Result<u64>;

    /// All bridge deposit events emitted in the exact block at `height`.
    /// A block without deposits yields an empty vec, not an error.
    async fn events_at(&self, height: u64) -> anyhow::Result<Vec<CrossChainEvent>>;
}

/// Client submitting votes to the hub consensus chain.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Whether a "done" marker exists on the hub for this transfer.
    async fn already_finalized(
        &self,
        side_chain_id: u64,
        cross_chain_id: &[u8],
    ) -> anyhow::Result<bool>;

    /// Construct, sign, and broadcast a vote transaction importing the
    /// outer-chain transfer observed at `height`.
    async fn submit_vote(
        &self,
        side_chain_id: u64,
        payload: &[u8],
        height: u64,
    ) -> anyhow::Result<TxHandle>;
}

/// Owns the durable copy of the relay cursor. Single writer; the engine
/// is the only process expected to touch the slot.
pub trait CheckpointStore: Send + Sync {
    /// Last persisted next-height-to-relay. 0 when never set.
    fn relay_height(&self) -> u64;

    /// Durably persist the cursor. `Ok` guarantees the value survives a
    /// process restart.
    fn set_relay_height(&mut self, height: u64) -> Result<(), crate::storage::Error>;
}
