// crates/forkwatch-daemon/tests/integration.rs
//
// End-to-end tests: full analysis passes over the deterministic stub
// chain, snapshot publication, and failure behavior.

use std::sync::Arc;

use async_trait::async_trait;

use forkwatch_analysis::{build_snapshot, SnapshotHandle};
use forkwatch_chain::StubChain;
use forkwatch_core::{
    ChainData, ChainParams, ForkwatchError, StakeVersionInterval, VersionSample, VoteInfo,
};

#[tokio::test]
async fn test_full_pass_over_stub_chain() {
    let params = ChainParams::testnet();
    let chain = StubChain::demo(&params);
    let snapshot = build_snapshot(&chain, &params).await.unwrap();

    assert_eq!(snapshot.network, params.network);
    assert_eq!(snapshot.height, chain.best_height());

    // The tip window is entirely on the new block version.
    assert_eq!(snapshot.block_versions.positions.len() as i64, params.block_upgrade_window);
    assert_eq!(snapshot.block_version.current, 5);
    assert!(snapshot.block_version.success);

    // The stake rollover to v5 happened in the third full interval, so
    // the current stake version is already the most popular one.
    assert_eq!(snapshot.stake_version.current, 5);
    assert!(snapshot.stake_version.success);

    // The newest interval is still filling.
    let newest = snapshot.intervals.last().unwrap();
    assert!(newest.end_height - newest.start_height < params.stake_version_interval);
    assert_eq!(newest.end_height, snapshot.height);
}

#[tokio::test]
async fn test_agenda_tally_over_stub_chain() {
    let params = ChainParams::testnet();
    let chain = StubChain::demo(&params);
    let snapshot = build_snapshot(&chain, &params).await.unwrap();

    // One agenda, mid-vote, counted from the voting window start up to
    // the tip. The stub casts 3 yes / 1 no / 1 abstain per block.
    assert_eq!(snapshot.agendas.len(), 1);
    let agenda = &snapshot.agendas[0];
    assert_eq!(agenda.id, "demoagenda");
    assert!(agenda.voting_started());

    let voting_start = agenda.start_height.unwrap();
    let blocks_counted = snapshot.height - voting_start + 1;
    let total = blocks_counted * params.tickets_per_block;
    assert_eq!(agenda.total_votes(), total);
    assert_eq!(agenda.yes_votes(), total / 5 * 3);
    assert_eq!(agenda.no_votes(), total / 5);
    assert_eq!(agenda.abstain_votes(), total / 5);

    // 4/5 of all votes are non-abstain, far beyond the quorum.
    assert!(agenda.quorum_met());
    assert!((agenda.quorum_progress() - 1.0).abs() < 1e-10);

    // 3 yes out of 4 non-abstain votes per block.
    let approval = agenda.approval_rating().unwrap();
    assert!((approval - 75.0).abs() < 1e-10);
}

#[tokio::test]
async fn test_snapshot_handle_swap() {
    let params = ChainParams::testnet();
    let chain = StubChain::demo(&params);
    let handle = SnapshotHandle::new();
    assert!(handle.current().await.is_none());

    let snapshot = build_snapshot(&chain, &params).await.unwrap();
    let height = snapshot.height;
    handle.publish(snapshot).await;

    let current = handle.current().await.unwrap();
    assert_eq!(current.height, height);
}

/// A source that fails every call.
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
async fn test_failed_pass_keeps_previous_snapshot() {
    let params = ChainParams::testnet();
    let chain = StubChain::demo(&params);
    let handle = SnapshotHandle::new();

    let good = build_snapshot(&chain, &params).await.unwrap();
    let height = good.height;
    handle.publish(good).await;

    // A later pass against a dead source fails and publishes nothing.
    let result = build_snapshot(&DownChain, &params).await;
    assert!(result.is_err());

    let current = handle.current().await.unwrap();
    assert_eq!(current.height, height);
}

#[tokio::test]
async fn test_pass_is_deterministic() {
    let params = ChainParams::testnet();
    let chain = Arc::new(StubChain::demo(&params));

    let a = build_snapshot(chain.as_ref(), &params).await.unwrap();
    let b = build_snapshot(chain.as_ref(), &params).await.unwrap();

    assert_eq!(a.height, b.height);
    assert_eq!(a.block_version.current, b.block_version.current);
    assert_eq!(a.agendas.len(), b.agendas.len());
    assert_eq!(a.agendas[0].total_votes(), b.agendas[0].total_votes());
}
