//! Type safe state building for one polling cycle.

use async_trait::async_trait;
use std::ops::RangeInclusive;


/// Heights as seen from the active side-chain endpoint this cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainState {
    /// One past the newest height considered safe to relay.
    safe_frontier: u64,
    /// Next height the engine has not yet fully relayed.
    next: u64,
}

#[async_trait]
pub trait SourceRemote {
    /// Head height reported by the active side-chain endpoint.
    async fn current(&self) -> anyhow::Result<u64>;

    /// Blocks held back from the head before they are relayed.
    fn finalization_period(&self) -> u64;
}

pub trait ChainLocal {
    /// The engine's in-memory cursor.
    fn next_height(&self) -> u64;
}

/// Build the side-chain state for this cycle.
pub async fn build<T>(t: &T) -> anyhow::Result<ChainState>
where
    T: SourceRemote + ChainLocal + ?Sized,
{
    Ok(ChainState {
        safe_frontier: t.current().await?.saturating_sub(t.finalization_period()),
        next: t.next_height(),
    })
}

impl ChainState {
    /// The heights that must be relayed this cycle, oldest first.
    /// `None` when the cursor has reached the safe frontier.
    pub fn needs_to_sync(&self) -> Option<SyncGap> {
        (self.next < self.safe_frontier)
            .then(|| SyncGap::new(self.next, self.safe_frontier - 1))
    }
}

/// An inclusive range of side-chain heights that needs relaying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncGap {
    oldest: u64,
    latest: u64,
}

impl SyncGap {
    pub(crate) fn new(oldest: u64, latest: u64) -> Self {
        debug_assert!(oldest <= latest);
        Self { oldest, latest }
    }

    /// Oldest unrelayed height.
    pub fn oldest(&self) -> u64 {
        self.oldest
    }

    /// Newest height that is safe to relay.
    pub fn latest(&self) -> u64 {
        self.latest
    }
}

impl From<SyncGap> for RangeInclusive<u64> {
    fn from(gap: SyncGap) -> Self {
        gap.oldest..=gap.latest
    }
}
