//! # run
//! This module handles the logic for a single iteration of the polling
//! loop.

use super::state::{
    self,
    ChainLocal,
    SourceRemote,
    SyncGap,
};
use crate::storage;
use async_trait::async_trait;


#[async_trait]
pub trait RelayerData: SourceRemote + ChainLocal {
    /// Relay every height in the gap in strictly increasing order,
    /// advancing the in-memory cursor after each fully handled height.
    /// Errors only on cancellation; transient fetch failures are
    /// retried internally.
    async fn relay_gap(&mut self, gap: &SyncGap) -> anyhow::Result<()>;

    /// Persist the in-memory cursor to the checkpoint store.
    fn persist_checkpoint(&mut self) -> Result<(), storage::Error>;
}

/// A single iteration of the run loop.
pub async fn run<R>(relayer: &mut R) -> anyhow::Result<()>
where
    R: RelayerData + Send + Sync,
{
    // Build the side chain state for this cycle.
    let state = state::build(relayer).await?;

    // Check if we need to relay.
    if let Some(gap) = state.needs_to_sync() {
        relayer.relay_gap(&gap).await?;

        // A failed write keeps the in-memory cursor; the next
        // successful persistence carries it forward.
        if let Err(err) = relayer.persist_checkpoint() {
            tracing::warn!("failed to persist relay checkpoint: {err}");
        }
    }

    Ok(())
}
