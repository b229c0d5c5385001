// crates/forkwatch-analysis/src/intervals.rs
//
// Stake version interval (SVI) store and supermajority search.
//
// Holds the chronological list of fixed-length interval summaries and
// answers the questions "in which interval did version V reach its
// stake supermajority?" and "how is the current interval progressing?".

use serde::{Deserialize, Serialize};

use forkwatch_core::{ChainParams, Network, StakeVersionInterval};

/// Minimum votes a version must reach in some charted interval before it
/// is worth a chart series of its own.
const MIN_CHART_VOTES: u32 = 100;

/// Historical upgrade intervals that cannot be recovered by the generic
/// scan: on these networks the stake (PoS) threshold for the named
/// version was met before the companion block-version (PoW) rollover,
/// an ordering the interval records no longer expose. These entries are
/// finalized chain history and must be preserved verbatim when
/// targeting these networks.
///
/// Keyed `(network, version) -> interval index` (zero-based, oldest
/// interval first).
const UPGRADE_SVI_OVERRIDES: [(Network, u32, usize); 3] = [
    (Network::MainNet, 8, 261),
    (Network::TestNet, 8, 152),
    (Network::MainNet, 9, 312),
];

/// Chronological set of stake version intervals, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeVersionIntervals {
    /// Interval summaries, oldest first.
    pub intervals: Vec<StakeVersionInterval>,
    /// Highest vote version deployed on the target network.
    pub max_vote_version: u32,
}

/// Stake-version rollover summary derived from the newest interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeVersionSummary {
    /// Stake version observed in the best block's header.
    pub current: u32,
    /// True when no version newer than `current` is out-polling it.
    pub success: bool,
    /// Most popular non-current version in the newest interval, if any.
    pub most_popular: Option<u32>,
    /// Vote count of `most_popular` in the newest interval.
    pub most_popular_count: i64,
    /// `most_popular_count` as a percentage of the window vote total.
    pub most_popular_pct: f64,
}

/// Progress of the newest (still filling) interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalProgress {
    /// First block of the interval.
    pub start_height: i64,
    /// Last observed block of the interval so far.
    pub end_height: i64,
    /// Votes that were possible but not observed so far in the interval.
    pub missed_votes: i64,
    /// Possible votes in the interval, reduced by the misses observed.
    pub window_vote_total: i64,
    /// Votes still castable before the interval closes.
    pub votes_remaining: i64,
    /// Votes a version needs to exceed for the interval to roll over.
    pub required_votes: i64,
}

/// Per-version count series across the most recent intervals, shaped
/// for a grouped bar chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalSeries {
    /// One label per charted interval, oldest first; the last label is
    /// always "Current Interval".
    pub labels: Vec<String>,
    /// One row per version, ascending; `counts[i]` belongs to
    /// `labels[i]`.
    pub versions: Vec<VersionCounts>,
}

/// One version's counts across the charted intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCounts {
    pub version: u32,
    pub counts: Vec<u32>,
}

/// Integer-truncating supermajority threshold. This is a strict ratio
/// test and must match the network's consensus-defined ratio exactly;
/// it is never rounded up.
pub fn supermajority_threshold(total_votes: i64, params: &ChainParams) -> i64 {
    total_votes * params.stake_majority_multiplier / params.stake_majority_divisor
}

impl StakeVersionIntervals {
    /// Build the store from source data, which arrives newest-first.
    /// The list is reversed so the first element is the first SVI.
    pub fn from_raw(mut raw_newest_first: Vec<StakeVersionInterval>, max_vote_version: u32) -> Self {
        raw_newest_first.reverse();
        Self {
            intervals: raw_newest_first,
            max_vote_version,
        }
    }

    /// The newest interval, if any.
    pub fn newest(&self) -> Option<&StakeVersionInterval> {
        self.intervals.last()
    }

    /// Find the first interval in which `version` met the stake
    /// supermajority. Scans oldest to newest; incomplete intervals are
    /// skipped; the first match wins and later intervals never override
    /// it, so an upgrade is permanent even if support later drops.
    ///
    /// Returns the zero-based interval index alongside the interval.
    pub fn find_upgrade_svi(
        &self,
        version: u32,
        params: &ChainParams,
    ) -> Option<(usize, &StakeVersionInterval)> {
        if let Some(&(_, _, index)) = UPGRADE_SVI_OVERRIDES
            .iter()
            .find(|&&(net, ver, _)| net == params.network && ver == version)
        {
            match self.intervals.get(index) {
                Some(svi) => return Some((index, svi)),
                None => {
                    // Short history (stub or pruned source): the pinned
                    // interval is not present, fall back to the scan.
                    tracing::warn!(
                        version,
                        index,
                        have = self.intervals.len(),
                        "pinned upgrade interval out of range, falling back to scan"
                    );
                }
            }
        }

        for (i, svi) in self.intervals.iter().enumerate() {
            if !svi.is_complete(params.stake_version_interval) {
                continue;
            }

            let total_votes = svi.total_votes();
            let version_votes = svi.version_votes(version);
            let threshold = supermajority_threshold(total_votes, params);
            if version_votes > threshold {
                tracing::info!(
                    version,
                    interval = i,
                    start = svi.start_height,
                    end = svi.end_height,
                    total_votes,
                    version_votes,
                    threshold,
                    "upgrade threshold met"
                );
                return Some((i, svi));
            }
        }
        None
    }

    /// Summarize stake-version rollover progress from the newest
    /// interval. `current` is the stake version of the best block's
    /// header; rollover has succeeded when no newer version out-polls
    /// it. Equal-count ties resolve to the lowest version.
    pub fn analyze_stake_versions(
        &self,
        current: u32,
        window_vote_total: i64,
    ) -> StakeVersionSummary {
        let mut most_popular: Option<(u32, u32)> = None;
        if let Some(newest) = self.newest() {
            let mut candidates: Vec<(u32, u32)> = newest
                .vote_counts
                .iter()
                .filter(|&(&version, _)| version != current)
                .map(|(&version, &count)| (version, count))
                .collect();
            candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            most_popular = candidates.first().copied();
        }

        let success = most_popular.map_or(true, |(version, _)| version <= current);
        let most_popular_count = most_popular.map_or(0, |(_, count)| i64::from(count));
        let most_popular_pct = if window_vote_total > 0 {
            most_popular_count as f64 / window_vote_total as f64 * 100.0
        } else {
            0.0
        };

        StakeVersionSummary {
            current,
            success,
            most_popular: most_popular.map(|(version, _)| version),
            most_popular_count,
            most_popular_pct,
        }
    }

    /// Progress of the newest interval, given the missed votes observed
    /// so far within it.
    pub fn interval_progress(&self, missed_votes: i64, params: &ChainParams) -> IntervalProgress {
        let (start_height, end_height) = self
            .newest()
            .map_or((0, 0), |svi| (svi.start_height, svi.end_height));
        let blocks_into = end_height - start_height;
        let window_vote_total =
            params.stake_version_interval * params.tickets_per_block - missed_votes;
        IntervalProgress {
            start_height,
            end_height,
            missed_votes,
            window_vote_total,
            votes_remaining: (params.stake_version_interval - blocks_into)
                * params.tickets_per_block,
            required_votes: supermajority_threshold(window_vote_total, params),
        }
    }

    /// Build the per-version chart series over the last `last_n`
    /// intervals. Versions that never exceed `MIN_CHART_VOTES` in any
    /// charted interval are dropped as noise.
    pub fn interval_series(&self, last_n: usize) -> IntervalSeries {
        let shown: &[StakeVersionInterval] = if self.intervals.len() > last_n {
            &self.intervals[self.intervals.len() - last_n..]
        } else {
            &self.intervals
        };

        let mut labels: Vec<String> = shown
            .iter()
            .map(|svi| format!("{} - {}", svi.start_height, svi.end_height))
            .collect();
        if let Some(last) = labels.last_mut() {
            *last = "Current Interval".to_string();
        }

        let mut versions: Vec<u32> = shown
            .iter()
            .flat_map(|svi| {
                svi.vote_counts
                    .iter()
                    .filter(|&(_, &count)| count > MIN_CHART_VOTES)
                    .map(|(&version, _)| version)
            })
            .collect();
        versions.sort_unstable();
        versions.dedup();

        let versions = versions
            .into_iter()
            .map(|version| VersionCounts {
                version,
                counts: shown
                    .iter()
                    .map(|svi| svi.vote_counts.get(&version).copied().unwrap_or(0))
                    .collect(),
            })
            .collect();

        IntervalSeries { labels, versions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn interval(start: i64, end: i64, counts: &[(u32, u32)]) -> StakeVersionInterval {
        StakeVersionInterval {
            start_height: start,
            end_height: end,
            vote_counts: counts.iter().copied().collect::<BTreeMap<u32, u32>>(),
        }
    }

    fn small_params() -> ChainParams {
        // Test-sized parameters; the ratio matches the real networks.
        ChainParams {
            stake_version_interval: 100,
            ..ChainParams::testnet()
        }
    }

    #[test]
    fn test_threshold_truncates() {
        let params = small_params();
        assert_eq!(supermajority_threshold(10, &params), 7); // not 7.5 rounded
        assert_eq!(supermajority_threshold(0, &params), 0);
        assert_eq!(supermajority_threshold(1000, &params), 750);
        // Non-decreasing in total votes.
        let mut last = 0;
        for total in 0..500 {
            let t = supermajority_threshold(total, &params);
            assert!(t >= last);
            last = t;
        }
    }

    #[test]
    fn test_from_raw_reverses_to_oldest_first() {
        let raw = vec![
            interval(200, 250, &[]),
            interval(100, 200, &[]),
            interval(0, 100, &[]),
        ];
        let svis = StakeVersionIntervals::from_raw(raw, 10);
        assert_eq!(svis.intervals[0].start_height, 0);
        assert_eq!(svis.newest().unwrap().start_height, 200);
    }

    #[test]
    fn test_first_matching_interval_wins() {
        let params = small_params();
        // Intervals 1 and 3 both satisfy the threshold for v5; the scan
        // must stop at interval 1. Upgrades are permanent.
        let svis = StakeVersionIntervals::from_raw(
            vec![
                interval(300, 400, &[(5, 400), (4, 100)]),
                interval(200, 300, &[(4, 400), (5, 100)]),
                interval(100, 200, &[(5, 450), (4, 50)]),
                interval(0, 100, &[(4, 500)]),
            ],
            10,
        );
        let (index, svi) = svis.find_upgrade_svi(5, &params).unwrap();
        assert_eq!(index, 1);
        assert_eq!(svi.start_height, 100);
    }

    #[test]
    fn test_incomplete_interval_is_skipped() {
        let params = small_params();
        // The middle interval would satisfy the threshold but is
        // incomplete, so it must be ignored entirely.
        let svis = StakeVersionIntervals::from_raw(
            vec![
                interval(150, 190, &[(5, 200)]),
                interval(0, 100, &[(4, 500)]),
            ],
            10,
        );
        assert!(svis.find_upgrade_svi(5, &params).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let params = small_params();
        // 750 of 1000 votes is exactly the threshold, not above it.
        let svis = StakeVersionIntervals::from_raw(
            vec![interval(0, 100, &[(5, 750), (4, 250)])],
            10,
        );
        assert!(svis.find_upgrade_svi(5, &params).is_none());

        let svis = StakeVersionIntervals::from_raw(
            vec![interval(0, 100, &[(5, 751), (4, 249)])],
            10,
        );
        assert!(svis.find_upgrade_svi(5, &params).is_some());
    }

    #[test]
    fn test_historical_override_mainnet_v9() {
        let params = ChainParams::mainnet();
        // 313 empty complete intervals; the generic scan would find
        // nothing, but mainnet v9 is pinned to interval 312.
        let raw: Vec<StakeVersionInterval> = (0..313)
            .rev()
            .map(|i| interval(i * 2016, (i + 1) * 2016, &[]))
            .collect();
        let svis = StakeVersionIntervals::from_raw(raw, 10);
        let (index, svi) = svis.find_upgrade_svi(9, &params).unwrap();
        assert_eq!(index, 312);
        assert_eq!(svi.start_height, 312 * 2016);
        // Testnet has no v9 override and no organic match.
        assert!(svis.find_upgrade_svi(9, &ChainParams::testnet()).is_none());
    }

    #[test]
    fn test_override_out_of_range_falls_back_to_scan() {
        let params = ChainParams::mainnet();
        // Only two intervals of history: the v8 override index (261) is
        // absent, but interval 1 organically satisfies the threshold.
        let svis = StakeVersionIntervals::from_raw(
            vec![
                interval(2016, 4032, &[(8, 9000), (7, 1000)]),
                interval(0, 2016, &[(7, 10000)]),
            ],
            10,
        );
        let (index, _) = svis.find_upgrade_svi(8, &params).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_stake_version_summary() {
        let svis = StakeVersionIntervals::from_raw(
            vec![interval(200, 250, &[(5, 400), (6, 100), (4, 50)])],
            10,
        );

        // v6 is newer than current v5 and out-polls nothing: v6 is the
        // most popular non-current version, so the rollover to v5 is
        // considered done only if v6 <= v5 — it is not.
        let summary = svis.analyze_stake_versions(5, 1000);
        assert_eq!(summary.most_popular, Some(6));
        assert_eq!(summary.most_popular_count, 100);
        assert!(!summary.success);
        assert!((summary.most_popular_pct - 10.0).abs() < 0.01);

        // With current v6, the best non-current version is older: done.
        let summary = svis.analyze_stake_versions(6, 1000);
        assert_eq!(summary.most_popular, Some(5));
        assert!(summary.success);
    }

    #[test]
    fn test_interval_progress() {
        let params = small_params();
        let svis =
            StakeVersionIntervals::from_raw(vec![interval(400, 440, &[(5, 190)])], 10);
        let progress = svis.interval_progress(10, &params);
        assert_eq!(progress.start_height, 400);
        assert_eq!(progress.end_height, 440);
        assert_eq!(progress.window_vote_total, 100 * 5 - 10);
        assert_eq!(progress.votes_remaining, (100 - 40) * 5);
        assert_eq!(progress.required_votes, 490 * 3 / 4);
    }

    #[test]
    fn test_interval_series_filters_minor_versions() {
        let svis = StakeVersionIntervals::from_raw(
            vec![
                interval(200, 250, &[(5, 400), (6, 30)]),
                interval(100, 200, &[(5, 450), (4, 150)]),
                interval(0, 100, &[(4, 500)]),
            ],
            10,
        );
        let series = svis.interval_series(4);
        assert_eq!(
            series.labels,
            vec!["0 - 100", "100 - 200", "Current Interval"]
        );
        // v6 never exceeds 100 votes and is dropped.
        let versions: Vec<u32> = series.versions.iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![4, 5]);
        let v4 = &series.versions[0];
        assert_eq!(v4.counts, vec![500, 150, 0]);
    }

    #[test]
    fn test_interval_series_limits_to_last_n() {
        let raw: Vec<StakeVersionInterval> = (0..6)
            .rev()
            .map(|i| interval(i * 100, (i + 1) * 100, &[(4, 500)]))
            .collect();
        let svis = StakeVersionIntervals::from_raw(raw, 10);
        let series = svis.interval_series(4);
        assert_eq!(series.labels.len(), 4);
        assert_eq!(series.labels[0], "200 - 300");
    }
}
