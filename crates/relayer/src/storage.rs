//! Durable relay-height checkpoint.
//!
//! A single value under a fixed key in a fixed tree, stored as an
//! 8-byte little-endian integer. Absence of the key means height 0.

use crate::ports::CheckpointStore;
use std::path::Path;

const RELAY_TREE: &[u8] = b"relay";
const RELAY_HEIGHT_KEY: &[u8] = b"relay_height";

/// Checkpoint persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying database rejected the read or write.
    #[error("checkpoint database error: {0}")]
    Database(#[from] sled::Error),
}

/// Sled-backed checkpoint store.
pub struct SledCheckpoint {
    tree: sled::Tree,
}

impl SledCheckpoint {
    /// Open (or create) the checkpoint database under `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let db = sled::open(path)?;
        let tree = db.open_tree(RELAY_TREE)?;
        Ok(Self { tree })
    }
}

impl CheckpointStore for SledCheckpoint {
    fn relay_height(&self) -> u64 {
        match self.tree.get(RELAY_HEIGHT_KEY) {
            Ok(Some(raw)) => match raw.as_ref().try_into() {
                Ok(bytes) => u64::from_le_bytes(bytes),
                Err(_) => {
                    tracing::warn!(
                        len = raw.len(),
                        "relay height checkpoint is not 8 bytes, treating as unset"
                    );
                    0
                }
            },
            Ok(None) => 0,
            Err(err) => {
                tracing::warn!("failed to read relay height checkpoint: {err}");
                0
            }
        }
    }

    fn set_relay_height(&mut self, height: u64) -> Result<(), Error> {
        self.tree
            .insert(RELAY_HEIGHT_KEY, height.to_le_bytes().to_vec())?;
        // A successful return must survive a crash.
        self.tree.flush()?;
        Ok(())
    }
}
