// crates/forkwatch-chain/src/stub.rs
//
// Deterministic in-memory `ChainData` implementation.
//
// Serves pre-built per-block samples and interval summaries the same way
// the node RPC does (newest-first, count-limited, hash-addressed). Used
// by the integration tests and by the daemon's --stub mode, which runs
// the full analysis pipeline without a node.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

use forkwatch_core::{
    AgendaInfo, AgendaStatus, ChainData, ChainParams, ChoiceInfo, ForkwatchError,
    StakeVersionInterval, VersionSample, VoteBits, VoteInfo,
};

/// Static chain-data source backed by in-memory vectors.
pub struct StubChain {
    /// Per-block samples, oldest first, heights contiguous.
    samples: Vec<VersionSample>,
    /// Interval summaries, oldest first.
    intervals: Vec<StakeVersionInterval>,
    /// Vote info per recognized stake version.
    vote_infos: HashMap<u32, VoteInfo>,
}

fn stub_hash(height: i64) -> String {
    format!("stub{height:010}")
}

fn parse_stub_hash(hash: &str) -> Result<i64, ForkwatchError> {
    hash.strip_prefix("stub")
        .and_then(|h| h.parse::<i64>().ok())
        .ok_or_else(|| ForkwatchError::DataSource(format!("unknown block hash {hash}")))
}

impl StubChain {
    /// Build a stub from prepared data. `samples` must be oldest-first
    /// with contiguous heights; `intervals` oldest-first.
    pub fn new(
        samples: Vec<VersionSample>,
        intervals: Vec<StakeVersionInterval>,
        vote_infos: Vec<VoteInfo>,
    ) -> Self {
        Self {
            samples,
            intervals,
            vote_infos: vote_infos
                .into_iter()
                .map(|info| (info.vote_version, info))
                .collect(),
        }
    }

    /// Height of the stub's best block.
    pub fn best_height(&self) -> i64 {
        self.samples.last().map_or(0, |s| s.height)
    }

    /// A canned mid-vote scenario for the given network parameters:
    /// the chain has rolled from version 4 to version 5, the stake
    /// supermajority for v5 was reached in the third interval, and one
    /// yes/no/abstain agenda is halfway through its voting window with
    /// a 3:1:1 yes/no/abstain vote pattern.
    pub fn demo(params: &ChainParams) -> Self {
        let interval = params.stake_version_interval;
        let svh = params.stake_validation_height;

        // v5 reaches its supermajority in the interval ending here.
        let upgrade_end = svh + 3 * interval;
        let mut voting_start = svh;
        while voting_start < upgrade_end {
            voting_start += params.rule_change_activation_interval;
        }
        let voting_end = voting_start + params.rule_change_activation_interval - 1;
        let best = voting_start + params.rule_change_activation_interval / 2;

        let version_at = |height: i64| -> u32 {
            if height > svh + 2 * interval {
                5
            } else {
                4
            }
        };

        // Per-block samples: five votes per block once stake voting has
        // begun, cycling yes/yes/yes/no/abstain.
        let vote_bits = [0x5u16, 0x5, 0x5, 0x3, 0x1];
        let samples: Vec<VersionSample> = (0..=best)
            .map(|height| {
                let version = version_at(height);
                let votes = if height > svh {
                    (0..params.tickets_per_block)
                        .map(|i| VoteBits {
                            version,
                            bits: vote_bits[((height + i) % 5) as usize],
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                VersionSample {
                    height,
                    block_version: version as i32,
                    stake_version: version,
                    votes,
                }
            })
            .collect();

        // Interval summaries consistent with the samples above.
        let full_intervals = (best - svh) / interval;
        let mut intervals_vec = Vec::new();
        for k in 0..=full_intervals {
            let start = svh + k * interval;
            let end = if k < full_intervals {
                start + interval
            } else {
                best
            };
            let mut vote_counts: BTreeMap<u32, u32> = BTreeMap::new();
            for height in (start + 1)..=end {
                if height > svh {
                    *vote_counts.entry(version_at(height)).or_insert(0) +=
                        params.tickets_per_block as u32;
                }
            }
            intervals_vec.push(StakeVersionInterval {
                start_height: start,
                end_height: end,
                vote_counts,
            });
        }

        let agenda = AgendaInfo {
            id: "demoagenda".to_string(),
            description: "demonstration rule change described in DCP-0001".to_string(),
            mask: 0x6,
            status: AgendaStatus::Started,
            quorum_progress: 0.0,
            start_time: 1_493_164_800,
            expire_time: 1_524_700_800,
            choices: vec![
                ChoiceInfo {
                    id: "abstain".to_string(),
                    description: "abstain voting for change".to_string(),
                    bits: 0x0,
                    is_abstain: true,
                    is_no: false,
                    count: 0,
                    progress: 0.0,
                },
                ChoiceInfo {
                    id: "no".to_string(),
                    description: "keep the existing rules".to_string(),
                    bits: 0x2,
                    is_abstain: false,
                    is_no: true,
                    count: 0,
                    progress: 0.0,
                },
                ChoiceInfo {
                    id: "yes".to_string(),
                    description: "change to the new rules".to_string(),
                    bits: 0x4,
                    is_abstain: false,
                    is_no: false,
                    count: 0,
                    progress: 0.0,
                },
            ],
        };

        let vote_info = VoteInfo {
            current_height: best,
            start_height: voting_start,
            end_height: voting_end,
            vote_version: 5,
            quorum: params.rule_change_activation_quorum as u32,
            total_votes: 0,
            agendas: vec![agenda],
        };

        Self::new(samples, intervals_vec, vec![vote_info])
    }

    fn sample_index(&self, height: i64) -> Result<usize, ForkwatchError> {
        let base = self
            .samples
            .first()
            .map(|s| s.height)
            .ok_or_else(|| ForkwatchError::DataSource("stub has no samples".to_string()))?;
        if height < base || height > self.best_height() {
            return Err(ForkwatchError::DataSource(format!(
                "height {height} outside stub range"
            )));
        }
        Ok((height - base) as usize)
    }
}

#[async_trait]
impl ChainData for StubChain {
    async fn best_block(&self) -> Result<(String, i64), ForkwatchError> {
        let height = self.best_height();
        Ok((stub_hash(height), height))
    }

    async fn block_hash(&self, height: i64) -> Result<String, ForkwatchError> {
        self.sample_index(height)?;
        Ok(stub_hash(height))
    }

    async fn stake_versions(
        &self,
        hash: &str,
        count: i64,
    ) -> Result<Vec<VersionSample>, ForkwatchError> {
        let height = parse_stub_hash(hash)?;
        let index = self.sample_index(height)?;
        let count = count as usize;
        if count == 0 || count > index + 1 {
            return Err(ForkwatchError::DataSource(format!(
                "insufficient stake version results: {count} requested, {} available",
                index + 1
            )));
        }
        let mut window = self.samples[index + 1 - count..=index].to_vec();
        window.reverse();
        Ok(window)
    }

    async fn stake_version_intervals(
        &self,
        count: i64,
    ) -> Result<Vec<StakeVersionInterval>, ForkwatchError> {
        let take = (count as usize).min(self.intervals.len());
        let mut newest_first = self.intervals[self.intervals.len() - take..].to_vec();
        newest_first.reverse();
        Ok(newest_first)
    }

    async fn vote_info(&self, version: u32) -> Result<Option<VoteInfo>, ForkwatchError> {
        Ok(self.vote_infos.get(&version).cloned())
    }
}
