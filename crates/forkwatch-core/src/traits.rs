// crates/forkwatch-core/src/traits.rs

use async_trait::async_trait;

use crate::error::ForkwatchError;
use crate::types::{StakeVersionInterval, VersionSample, VoteInfo};

/// Trait for the chain-data collaborator.
///
/// Implemented by forkwatch-chain (JSON-RPC client and the in-memory
/// stub). The monitor assumes the source is authoritative and internally
/// consistent; it does not reconcile forks or validate blocks.
#[async_trait]
pub trait ChainData: Send + Sync {
    /// Hash and height of the current best block.
    async fn best_block(&self) -> Result<(String, i64), ForkwatchError>;

    /// Hash of the block at the given height.
    async fn block_hash(&self, height: i64) -> Result<String, ForkwatchError>;

    /// Per-block version samples for `count` blocks ending at `hash`,
    /// ordered newest-first (`[0]` is the block at `hash`).
    async fn stake_versions(
        &self,
        hash: &str,
        count: i64,
    ) -> Result<Vec<VersionSample>, ForkwatchError>;

    /// Summaries of the most recent `count` stake version intervals,
    /// ordered newest-first.
    async fn stake_version_intervals(
        &self,
        count: i64,
    ) -> Result<Vec<StakeVersionInterval>, ForkwatchError>;

    /// Agenda definitions for one stake version. Returns `Ok(None)` when
    /// the source does not recognize the version (a normal condition
    /// while walking the version range), `Err` on transport failure.
    async fn vote_info(&self, version: u32) -> Result<Option<VoteInfo>, ForkwatchError>;
}
