// crates/forkwatch-chain/src/notify.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use forkwatch_core::ChainData;

/// Poll the data source for new best blocks and push each new height
/// into `tx`. Runs until the receiving side is dropped.
///
/// A full channel means the consumer is still processing an earlier
/// height; the notification is dropped because the next poll will
/// deliver an equal or higher one anyway.
pub async fn watch_best_blocks(
    client: Arc<dyn ChainData>,
    poll_interval: Duration,
    tx: mpsc::Sender<i64>,
) {
    let mut last_height: Option<i64> = None;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            return;
        }
        let height = match client.best_block().await {
            Ok((_, height)) => height,
            Err(err) => {
                warn!(error = %err, "best block poll failed");
                continue;
            }
        };
        if last_height == Some(height) {
            continue;
        }
        last_height = Some(height);
        match tx.try_send(height) {
            Ok(()) => debug!(height, "new best block"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(height, "consumer busy, dropping block notification")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubChain;
    use forkwatch_core::ChainParams;

    #[tokio::test]
    async fn test_poller_emits_initial_height_and_stops_on_close() {
        let chain = Arc::new(StubChain::demo(&ChainParams::testnet()));
        let best = chain.best_height();
        let (tx, mut rx) = mpsc::channel(16);
        let handle = tokio::spawn(watch_best_blocks(
            chain,
            Duration::from_millis(1),
            tx,
        ));

        let height = rx.recv().await.unwrap();
        assert_eq!(height, best);

        // A static chain never produces a second notification.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        drop(rx);
        handle.await.unwrap();
    }
}
