// crates/forkwatch-daemon/src/updater.rs
//
// Drives analysis passes: one immediately at startup, then one per new
// best block delivered by the chain poller. A failed pass keeps the
// previously published snapshot in place.

use std::sync::Arc;

use tokio::sync::mpsc;

use forkwatch_analysis::{build_snapshot, SnapshotHandle};
use forkwatch_core::{ChainData, ChainParams};

/// Run one analysis pass and publish the result.
pub async fn run_pass(client: &dyn ChainData, params: &ChainParams, handle: &SnapshotHandle) {
    match build_snapshot(client, params).await {
        Ok(snapshot) => {
            tracing::info!(
                height = snapshot.height,
                block_version = snapshot.block_version.current,
                stake_version = snapshot.stake_version.current,
                upgrading = snapshot.phase.is_upgrading,
                "analysis pass complete"
            );
            handle.publish(snapshot).await;
        }
        Err(e) => {
            tracing::warn!("analysis pass failed, keeping previous snapshot: {}", e);
        }
    }
}

/// Run passes until shutdown: an initial one, then one per notified
/// block height. Returns when the height channel closes or on ctrl-c.
pub async fn run_update_loop(
    client: Arc<dyn ChainData>,
    params: ChainParams,
    handle: SnapshotHandle,
    mut heights: mpsc::Receiver<i64>,
) {
    run_pass(client.as_ref(), &params, &handle).await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                return;
            }
            height = heights.recv() => {
                match height {
                    Some(height) => {
                        tracing::debug!(height, "running pass for new block");
                        run_pass(client.as_ref(), &params, &handle).await;
                    }
                    None => {
                        tracing::info!("block notification channel closed");
                        return;
                    }
                }
            }
        }
    }
}
