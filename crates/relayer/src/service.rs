//! Polling task that drives the relay engine, and the handle used to
//! observe and stop it.

use crate::{
    config::{
        Config,
        CONFIRMATIONS,
    },
    event::{
        CrossChainEvent,
        TxParams,
    },
    ports::{
        CheckpointStore,
        HubClient,
        SideChainClient,
    },
    storage,
};
use anyhow::anyhow;
use async_trait::async_trait;
use rand::{
    rngs::StdRng,
    Rng,
    SeedableRng,
};
use std::collections::HashSet;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use self::{
    run::RelayerData,
    state::{
        ChainLocal,
        SourceRemote,
        SyncGap,
    },
};

mod run;
mod state;

#[cfg(test)]
mod test;

type RelayHeight = watch::Receiver<u64>;
type NotifyRelayHeight = watch::Sender<u64>;

/// Handle for interacting with the spawned relay task.
pub struct RelayerHandle {
    relay_height: RelayHeight,
    cancel: CancellationToken,
    join_handle: tokio::task::JoinHandle<()>,
}

/// The relay engine task. Owns the in-memory cursor and the chain
/// client handles for its lifetime.
struct Relayer<S, D, C> {
    /// Pool of equivalent side-chain endpoints.
    endpoints: Vec<S>,
    /// Endpoint chosen for the current polling cycle.
    active: usize,
    hub: D,
    store: C,
    config: Config,
    /// Permitted target-contract methods, materialized once.
    whitelist: HashSet<String>,
    /// Next side-chain height not yet fully relayed.
    cursor: u64,
    relay_height: NotifyRelayHeight,
    cancel: CancellationToken,
    rng: StdRng,
}

impl RelayerHandle {
    /// Start the relay engine on a background task.
    ///
    /// The cursor starts from the persisted checkpoint, unless
    /// `config.force_relay_height` is greater than zero, which
    /// unconditionally replaces it for this run.
    pub fn start<S, D, C>(
        endpoints: Vec<S>,
        hub: D,
        store: C,
        config: Config,
    ) -> anyhow::Result<Self>
    where
        S: SideChainClient + 'static,
        D: HubClient + 'static,
        C: CheckpointStore + 'static,
    {
        Self::start_inner(endpoints, hub, store, config, StdRng::from_entropy())
    }

    /// Start a relay engine with a seeded endpoint-selection generator.
    #[cfg(test)]
    pub fn start_with_rng<S, D, C>(
        endpoints: Vec<S>,
        hub: D,
        store: C,
        config: Config,
        rng: StdRng,
    ) -> anyhow::Result<Self>
    where
        S: SideChainClient + 'static,
        D: HubClient + 'static,
        C: CheckpointStore + 'static,
    {
        Self::start_inner(endpoints, hub, store, config, rng)
    }

    fn start_inner<S, D, C>(
        endpoints: Vec<S>,
        hub: D,
        store: C,
        config: Config,
        rng: StdRng,
    ) -> anyhow::Result<Self>
    where
        S: SideChainClient + 'static,
        D: HubClient + 'static,
        C: CheckpointStore + 'static,
    {
        let cancel = CancellationToken::new();
        let relayer = Relayer::new(endpoints, hub, store, config, cancel.clone(), rng)?;
        let relay_height = relayer.relay_height.subscribe();
        let join_handle = tokio::task::spawn(relayer.run());
        Ok(Self {
            relay_height,
            cancel,
            join_handle,
        })
    }

    /// The engine's in-memory cursor: the next side-chain height not
    /// yet fully relayed.
    pub fn relay_height(&self) -> u64 {
        *self.relay_height.borrow()
    }

    /// Yields until the in-memory cursor reaches `height`.
    ///
    /// Completion means every height below `height` had its events
    /// submitted (or dropped with a logged reason); it does not mean
    /// the checkpoint was persisted yet.
    pub async fn await_reached(&self, height: u64) -> anyhow::Result<()> {
        let mut rx = self.relay_height.clone();
        while *rx.borrow_and_update() < height {
            rx.changed().await?;
        }
        Ok(())
    }

    /// Check if the relay task is still running.
    pub fn is_running(&self) -> bool {
        !self.join_handle.is_finished()
    }

    /// Gracefully stop the relay task. The persisted checkpoint is left
    /// at its last successfully persisted value.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.cancel.cancel();
        self.join_handle.await?;
        Ok(())
    }
}

impl<S, D, C> Relayer<S, D, C>
where
    S: SideChainClient,
    D: HubClient,
    C: CheckpointStore,
{
    fn new(
        endpoints: Vec<S>,
        hub: D,
        store: C,
        config: Config,
        cancel: CancellationToken,
        rng: StdRng,
    ) -> anyhow::Result<Self> {
        if endpoints.is_empty() {
            return Err(anyhow!(
                "tried to start the relayer without side chain endpoints"
            ));
        }

        let whitelist = config.whitelist_methods.iter().cloned().collect();
        let persisted = store.relay_height();
        let cursor = if config.force_relay_height > 0 {
            config.force_relay_height
        } else {
            persisted
        };
        let (relay_height, _) = watch::channel(cursor);

        Ok(Self {
            endpoints,
            active: 0,
            hub,
            store,
            config,
            whitelist,
            cursor,
            relay_height,
            cancel,
            rng,
        })
    }

    /// The polling loop. One timer tick, one cycle.
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.active = self.rng.gen_range(0..self.endpoints.len());
            if let Err(err) = run::run(&mut self).await {
                if self.cancel.is_cancelled() {
                    break;
                }
                // Covers head-query failures; the cursor is untouched
                // and the next tick retries.
                tracing::warn!("relay cycle failed: {err:#}");
            }
        }

        tracing::info!("relayer stopped");
    }

    fn source(&self) -> &S {
        &self.endpoints[self.active]
    }

    /// Retry the height until its events are fetched and handled,
    /// bounded only by cancellation. A height is never skipped on
    /// transient failure.
    async fn relay_height_events(&mut self, height: u64) -> anyhow::Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(anyhow!("relayer received a stop signal"));
            }

            tracing::info!(height, "handling side chain height");
            match self.source().events_at(height).await {
                Ok(events) => {
                    self.process_events(height, events).await;
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(height, "failed to fetch deposit events: {err:#}");
                    self.retry_pause().await?;
                }
            }
        }
    }

    async fn retry_pause(&self) -> anyhow::Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(anyhow!("relayer received a stop signal"))
            }
            _ = tokio::time::sleep(self.config.retry_interval) => Ok(()),
        }
    }

    /// Run every event at `height` through the relay pipeline, in the
    /// order the side chain emitted them. Per-event failures are
    /// logged drops; they never abort the height.
    async fn process_events(&self, height: u64, events: Vec<CrossChainEvent>) {
        let side_chain_id = self.config.side.side_chain_id;
        let mut empty = true;

        for event in events {
            if event.contract != self.config.side.bridge_contract {
                tracing::warn!(
                    height,
                    contract = %event.contract,
                    expected = %self.config.side.bridge_contract,
                    "event source contract invalid"
                );
                continue;
            }

            let params = match TxParams::decode(&event.payload) {
                Ok(params) => params,
                Err(err) => {
                    tracing::warn!(
                        height,
                        tx_hash = %event.tx_hash,
                        "undecodable deposit payload: {err:#}"
                    );
                    continue;
                }
            };

            if !self.whitelist.contains(&params.method) {
                tracing::warn!(height, method = %params.method, "target contract method invalid");
                continue;
            }

            empty = false;
            let finalized = match self
                .hub
                .already_finalized(side_chain_id, &params.cross_chain_id)
                .await
            {
                Ok(done) => done,
                Err(err) => {
                    // The hub rejects duplicates anyway; submit rather
                    // than drop when the marker cannot be read.
                    tracing::warn!(
                        height,
                        "done-marker query failed, assuming not finalized: {err:#}"
                    );
                    false
                }
            };
            if finalized {
                tracing::info!(
                    height,
                    ccid = %hex::encode(&params.cross_chain_id),
                    tx_hash = %event.tx_hash,
                    "deposit already finalized on the hub"
                );
                continue;
            }

            // Fire and forget: a submission error is logged and the
            // height still advances.
            match self
                .hub
                .submit_vote(side_chain_id, &event.payload, height)
                .await
            {
                Ok(hub_tx) => tracing::info!(
                    height,
                    hub_tx = %hub_tx,
                    tx_hash = %event.tx_hash,
                    "vote submitted to the hub chain"
                ),
                Err(err) => tracing::error!(
                    height,
                    tx_hash = %event.tx_hash,
                    "vote submission failed: {err:#}"
                ),
            }
        }

        tracing::debug!(height, empty, "side chain height handled");
    }
}

#[async_trait]
impl<S, D, C> RelayerData for Relayer<S, D, C>
where
    S: SideChainClient,
    D: HubClient,
    C: CheckpointStore,
{
    async fn relay_gap(&mut self, gap: &SyncGap) -> anyhow::Result<()> {
        for height in gap.oldest()..=gap.latest() {
            self.relay_height_events(height).await?;
            self.cursor = height.saturating_add(1);
            self.relay_height.send_replace(self.cursor);
        }
        Ok(())
    }

    fn persist_checkpoint(&mut self) -> Result<(), storage::Error> {
        self.store.set_relay_height(self.cursor)
    }
}

#[async_trait]
impl<S, D, C> SourceRemote for Relayer<S, D, C>
where
    S: SideChainClient,
    D: HubClient,
    C: CheckpointStore,
{
    async fn current(&self) -> anyhow::Result<u64> {
        self.source().current_height().await
    }

    fn finalization_period(&self) -> u64 {
        CONFIRMATIONS
    }
}

impl<S, D, C> ChainLocal for Relayer<S, D, C>
where
    S: SideChainClient,
    D: HubClient,
    C: CheckpointStore,
{
    fn next_height(&self) -> u64 {
        self.cursor
    }
}
