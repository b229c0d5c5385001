// crates/forkwatch-analysis/src/window.rs
//
// Rolling block-version window tally.
//
// Given per-block version samples ordered newest-first, computes the
// count of each distinct block version inside a sliding window, for a
// series of window start positions. Positions are emitted oldest-first
// so consumers can plot a left-to-right time series.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use forkwatch_core::{ForkwatchError, VersionSample};

/// Version counts at one window position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowPosition {
    /// Height of the newest block in this window.
    pub height: i64,
    /// Count per block version inside the window. Every block in the
    /// window contributes to exactly one bucket, so the counts always
    /// sum to the window length.
    pub counts: BTreeMap<i32, u32>,
}

/// The full sliding tally: one `WindowPosition` per start position,
/// ordered oldest to newest. Rebuilt from scratch on every analysis
/// pass; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingWindow {
    /// Window length in blocks.
    pub window_len: usize,
    /// Window positions, oldest first. The last entry is the tip window.
    pub positions: Vec<WindowPosition>,
}

impl RollingWindow {
    /// Counts at the most recent window position.
    pub fn tip_counts(&self) -> &BTreeMap<i32, u32> {
        // rolling_version_counts always emits at least one position.
        &self.positions[self.positions.len() - 1].counts
    }

    /// Every distinct version observed at any position.
    pub fn versions_seen(&self) -> Vec<i32> {
        let mut seen: Vec<i32> = self
            .positions
            .iter()
            .flat_map(|p| p.counts.keys().copied())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen
    }

    /// Heights of the window positions, oldest first (chart x-axis).
    pub fn heights(&self) -> Vec<i64> {
        self.positions.iter().map(|p| p.height).collect()
    }
}

/// Compute the rolling version tally over `samples` (newest-first).
///
/// The scan starts at the midpoint of the sample list and walks toward
/// index 0: position `i` covers `samples[i..i + window_len]`, so the
/// oldest window is computed first and the tip window (`i == 0`) last.
/// Requires at least `2 × window_len` samples so the oldest position
/// still has a full look-back window behind it.
pub fn rolling_version_counts(
    samples: &[VersionSample],
    window_len: usize,
) -> Result<RollingWindow, ForkwatchError> {
    if window_len == 0 {
        return Err(ForkwatchError::InvalidState(
            "window length must be positive".to_string(),
        ));
    }
    if samples.len() < window_len * 2 {
        return Err(ForkwatchError::InsufficientData {
            needed: window_len * 2,
            got: samples.len(),
        });
    }

    let mut positions = Vec::with_capacity(samples.len() / 2);
    for i in (0..samples.len() / 2).rev() {
        let mut counts: BTreeMap<i32, u32> = BTreeMap::new();
        for sample in &samples[i..i + window_len] {
            *counts.entry(sample.block_version).or_insert(0) += 1;
        }
        positions.push(WindowPosition {
            height: samples[i].height,
            counts,
        });
    }

    Ok(RollingWindow {
        window_len,
        positions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_samples(versions_newest_first: &[i32]) -> Vec<VersionSample> {
        let top = versions_newest_first.len() as i64;
        versions_newest_first
            .iter()
            .enumerate()
            .map(|(i, &v)| VersionSample {
                height: top - i as i64,
                block_version: v,
                stake_version: 0,
                votes: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn test_rejects_short_input() {
        let samples = make_samples(&[2, 2, 1]);
        let err = rolling_version_counts(&samples, 2).unwrap_err();
        match err {
            ForkwatchError::InsufficientData { needed, got } => {
                assert_eq!(needed, 4);
                assert_eq!(got, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_window_completeness() {
        // Every position's counts must sum to the window length.
        let samples = make_samples(&[3, 3, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1]);
        for window_len in [2usize, 3, 4, 6] {
            let window = rolling_version_counts(&samples, window_len).unwrap();
            for pos in &window.positions {
                let total: u32 = pos.counts.values().sum();
                assert_eq!(total as usize, window_len);
            }
        }
    }

    #[test]
    fn test_positions_ordered_oldest_first() {
        let samples = make_samples(&[2, 2, 2, 1, 1, 1, 1, 1]);
        let window = rolling_version_counts(&samples, 4).unwrap();
        assert_eq!(window.positions.len(), 4);
        let heights = window.heights();
        let mut sorted = heights.clone();
        sorted.sort_unstable();
        assert_eq!(heights, sorted);
    }

    #[test]
    fn test_tip_window_counts() {
        // Scenario: window 4, newest-first [v2,v2,v2,v1,v1,v1,v1,v1].
        // Tip window is [v2,v2,v2,v1].
        let samples = make_samples(&[2, 2, 2, 1, 1, 1, 1, 1]);
        let window = rolling_version_counts(&samples, 4).unwrap();
        let tip = window.tip_counts();
        assert_eq!(tip.get(&2), Some(&3));
        assert_eq!(tip.get(&1), Some(&1));

        // Oldest position covers samples[3..7] = [v1,v1,v1,v1].
        let oldest = &window.positions[0].counts;
        assert_eq!(oldest.get(&1), Some(&4));
        assert_eq!(oldest.get(&2), None);
    }

    #[test]
    fn test_versions_seen_across_positions() {
        let samples = make_samples(&[3, 2, 2, 1, 1, 1, 1, 1]);
        let window = rolling_version_counts(&samples, 4).unwrap();
        assert_eq!(window.versions_seen(), vec![1, 2, 3]);
    }
}
