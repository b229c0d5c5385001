// crates/forkwatch-analysis/src/block_version.rs
//
// Block-version rollover analysis over the rolling window.
//
// Determines the currently-enforced block version from the tip window:
// a version holding a reject-threshold supermajority at the tip is the
// current version. Without a supermajority, the oldest version ever
// observed in the window set is still authoritative.

use serde::{Deserialize, Serialize};

use crate::window::RollingWindow;

/// Outcome of block-version analysis for one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockVersionSummary {
    /// The currently-enforced block version.
    pub current: i32,
    /// Whether `current` reached the reject supermajority at the tip.
    pub success: bool,
    /// The most popular version at the tip other than `current`, if any.
    /// This is the "next" version whose adoption trend is being watched.
    pub most_popular_other: Option<i32>,
    /// Tip-window share of `most_popular_other`, as a percentage.
    pub most_popular_pct: f64,
}

/// Analyze the tip window against the reject threshold.
///
/// Popularity scans sort by count descending with ties broken by version
/// ascending, so the result is reproducible run to run. At most one
/// version can hold a supermajority within a single window, so checking
/// the top-sorted entry is sufficient.
pub fn analyze(window: &RollingWindow, reject_threshold: i64) -> BlockVersionSummary {
    let tip = window.tip_counts();

    let mut by_popularity: Vec<(i32, u32)> = tip.iter().map(|(&v, &c)| (v, c)).collect();
    by_popularity.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let (current, success) = match by_popularity.first() {
        Some(&(version, count)) if i64::from(count) >= reject_threshold => (version, true),
        _ => {
            // No rollover yet; the oldest version observed anywhere in
            // the window set is still authoritative.
            let minimum = window
                .versions_seen()
                .into_iter()
                .min()
                .unwrap_or_default();
            (minimum, false)
        }
    };

    let most_popular_other = by_popularity
        .iter()
        .find(|&&(version, _)| version != current)
        .copied();

    let most_popular_pct = most_popular_other.map_or(0.0, |(_, count)| {
        f64::from(count) / window.window_len as f64 * 100.0
    });

    BlockVersionSummary {
        current,
        success,
        most_popular_other: most_popular_other.map(|(version, _)| version),
        most_popular_pct,
    }
}
