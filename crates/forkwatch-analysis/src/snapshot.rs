// crates/forkwatch-analysis/src/snapshot.rs
//
// Snapshot builder and the atomically-swapped snapshot handle.
//
// One analysis pass fetches everything it needs from the chain-data
// source and derives a complete `UpgradeSnapshot`. A pass either fully
// succeeds or is fully discarded; the handle keeps the previous snapshot
// on failure (stale-but-consistent over partially-updated).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use forkwatch_core::{
    ChainData, ChainParams, ForkwatchError, Network, StakeVersionInterval, VoteBits,
};

use crate::agenda::{voting_window, Agenda};
use crate::block_version::{analyze, BlockVersionSummary};
use crate::intervals::{
    IntervalProgress, IntervalSeries, StakeVersionIntervals, StakeVersionSummary,
};
use crate::state::{derive_phase, UpgradePhase};
use crate::window::{rolling_version_counts, RollingWindow};

/// Number of recent intervals shown in the interval chart.
const CHART_INTERVALS: usize = 4;

/// The complete result of one analysis pass. Rebuilt from scratch on
/// every new-block notification and swapped in whole; readers never see
/// a partially-updated snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeSnapshot {
    /// Network the snapshot describes.
    pub network: Network,
    /// Best block height at the time of the pass.
    pub height: i64,
    /// Rolling block-version window tally (chart data).
    pub block_versions: RollingWindow,
    /// Block-version rollover result.
    pub block_version: BlockVersionSummary,
    /// Stake-version rollover result.
    pub stake_version: StakeVersionSummary,
    /// Progress of the current (still filling) stake version interval.
    pub interval_progress: IntervalProgress,
    /// Per-version counts over the recent intervals (chart data).
    pub interval_series: IntervalSeries,
    /// Every stake version interval, oldest first.
    pub intervals: Vec<StakeVersionInterval>,
    /// Agendas with locally-counted votes, across all vote versions up
    /// to the first not-yet-upgraded one.
    pub agendas: Vec<Agenda>,
    /// Interpreted upgrade phase flags.
    pub phase: UpgradePhase,
    /// When this pass completed.
    pub updated_at: DateTime<Utc>,
}

/// Run one full analysis pass against the chain-data source.
pub async fn build_snapshot(
    client: &dyn ChainData,
    params: &ChainParams,
) -> Result<UpgradeSnapshot, ForkwatchError> {
    let (hash, height) = client.best_block().await?;
    tracing::debug!(height, %hash, "starting analysis pass");

    // Twice the window length so the oldest window position still has a
    // full look-back behind it.
    let window_len = params.block_upgrade_window as usize;
    let samples = client
        .stake_versions(&hash, params.block_upgrade_window * 2)
        .await?;
    let block_versions = rolling_version_counts(&samples, window_len)?;
    let block_version = analyze(&block_versions, params.block_reject_threshold);

    let stake_version_current = samples
        .first()
        .map(|s| s.stake_version)
        .ok_or_else(|| ForkwatchError::InvalidState("empty sample set".to_string()))?;

    // Missed votes so far in the current stake version interval reduce
    // the number of votes the rollover can still draw on.
    let blocks_into_interval = if height > params.stake_validation_height {
        (height - params.stake_validation_height) % params.stake_version_interval
    } else {
        0
    };
    let mut missed_votes = 0i64;
    if blocks_into_interval > 0 {
        let interval_samples = client.stake_versions(&hash, blocks_into_interval).await?;
        for sample in &interval_samples {
            missed_votes += (params.tickets_per_block - sample.votes.len() as i64).max(0);
        }
    }

    let total_svis = if height > params.stake_validation_height {
        1 + (height - params.stake_validation_height) / params.stake_version_interval
    } else {
        1
    };
    let raw_intervals = client.stake_version_intervals(total_svis).await?;
    if raw_intervals.is_empty() {
        return Err(ForkwatchError::DataSource(
            "stake version interval query returned no intervals".to_string(),
        ));
    }
    let svis = StakeVersionIntervals::from_raw(raw_intervals, params.latest_vote_version);

    let interval_progress = svis.interval_progress(missed_votes, params);
    let stake_version =
        svis.analyze_stake_versions(stake_version_current, interval_progress.window_vote_total);
    let interval_series = svis.interval_series(CHART_INTERVALS);

    let agendas = agendas_for_versions(client, &svis, height, params).await?;
    let phase = derive_phase(&agendas, block_version.success, stake_version.success);

    Ok(UpgradeSnapshot {
        network: params.network,
        height,
        block_versions,
        block_version,
        stake_version,
        interval_progress,
        interval_series,
        intervals: svis.intervals,
        agendas,
        phase,
        updated_at: Utc::now(),
    })
}

/// Walk the vote versions from 0 to the network maximum, collecting
/// agendas. The walk stops at the first version whose upgrade has not
/// occurred (or whose voting window is in the future): later versions
/// cannot have meaningful voting data yet. Versions the source does not
/// recognize are skipped.
async fn agendas_for_versions(
    client: &dyn ChainData,
    svis: &StakeVersionIntervals,
    current_height: i64,
    params: &ChainParams,
) -> Result<Vec<Agenda>, ForkwatchError> {
    let mut all_agendas = Vec::new();

    for version in 0..=svis.max_vote_version {
        let Some(info) = client.vote_info(version).await? else {
            continue;
        };
        let mut agendas: Vec<Agenda> = info
            .agendas
            .iter()
            .map(|a| Agenda::from_info(a, info.vote_version, info.quorum))
            .collect();

        let Some((_, upgrade_svi)) = svis.find_upgrade_svi(version, params) else {
            tracing::info!(version, "upgrade to stake version has not happened");
            all_agendas.append(&mut agendas);
            break;
        };
        let upgrade_height = upgrade_svi.end_height;
        tracing::info!(version, upgrade_height, "stake version upgrade found");

        let (voting_start, voting_end) = voting_window(upgrade_height, params);
        for agenda in &mut agendas {
            agenda.start_height = Some(voting_start);
            agenda.end_height = Some(voting_end);
        }

        if voting_start > current_height {
            tracing::info!(version, voting_start, "voting is in the future, not counting");
            all_agendas.append(&mut agendas);
            break;
        }

        // When voting is still ongoing, only count up to the tip.
        let count_end = voting_end.min(current_height);
        let last_hash = client.block_hash(count_end).await?;
        let vote_samples = client
            .stake_versions(&last_hash, count_end - voting_start + 1)
            .await?;
        let votes: Vec<VoteBits> = vote_samples
            .iter()
            .flat_map(|s| s.votes.iter().copied())
            .collect();

        for agenda in &mut agendas {
            tracing::debug!(
                agenda = %agenda.id,
                voting_start,
                count_end,
                "counting votes"
            );
            agenda.count_votes(&votes);
        }

        all_agendas.append(&mut agendas);
    }

    Ok(all_agendas)
}

/// Shared handle to the latest snapshot.
///
/// The snapshot is replaced in a single write (whole-`Arc` swap), so any
/// number of concurrent readers either see the previous complete
/// snapshot or the new complete one. `None` until the first successful
/// pass.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Option<Arc<UpgradeSnapshot>>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest fully-built snapshot, or `None` before the first
    /// successful pass.
    pub async fn current(&self) -> Option<Arc<UpgradeSnapshot>> {
        self.inner.read().await.clone()
    }

    /// Swap in a newly built snapshot.
    pub async fn publish(&self, snapshot: UpgradeSnapshot) {
        *self.inner.write().await = Some(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forkwatch_core::{VersionSample, VoteInfo};

    /// A source that fails every call, for pass-abort behavior.
    struct DownChain;

    #[async_trait]
    impl ChainData for DownChain {
        async fn best_block(&self) -> Result<(String, i64), ForkwatchError> {
            Err(ForkwatchError::DataSource("connection refused".to_string()))
        }

        async fn block_hash(&self, _height: i64) -> Result<String, ForkwatchError> {
            Err(ForkwatchError::DataSource("connection refused".to_string()))
        }

        async fn stake_versions(
            &self,
            _hash: &str,
            _count: i64,
        ) -> Result<Vec<VersionSample>, ForkwatchError> {
            Err(ForkwatchError::DataSource("connection refused".to_string()))
        }

        async fn stake_version_intervals(
            &self,
            _count: i64,
        ) -> Result<Vec<StakeVersionInterval>, ForkwatchError> {
            Err(ForkwatchError::DataSource("connection refused".to_string()))
        }

        async fn vote_info(&self, _version: u32) -> Result<Option<VoteInfo>, ForkwatchError> {
            Err(ForkwatchError::DataSource("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_handle_starts_uninitialized() {
        let handle = SnapshotHandle::new();
        assert!(handle.current().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_pass_propagates_error() {
        let params = ChainParams::testnet();
        let err = build_snapshot(&DownChain, &params).await.unwrap_err();
        assert!(matches!(err, ForkwatchError::DataSource(_)));
    }
}
