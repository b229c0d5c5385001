// crates/forkwatch-core/src/types.rs
//
// Canonical data model for the upgrade monitor.
//
// Everything here is produced by the chain-data source and treated as
// immutable observed fact. The monitor summarizes this data; it never
// validates or mutates it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ForkwatchError;

/// One vote cast in a block: the voter's stake version and its choice bits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteBits {
    /// Stake version the voter signaled.
    pub version: u32,
    /// Raw vote bits; agenda choices are extracted via `bits & mask`.
    pub bits: u16,
}

/// One mined block's observed version data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSample {
    /// Block height.
    pub height: i64,
    /// Version the miner embedded in the block header.
    pub block_version: i32,
    /// Stake version embedded in the block header.
    pub stake_version: u32,
    /// Votes included in this block (up to tickets-per-block of them).
    pub votes: Vec<VoteBits>,
}

/// One fixed-length stake version interval: vote counts per stake version.
///
/// Counts are keyed in a `BTreeMap` so iteration order is always
/// version-ascending, keeping every popularity scan deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeVersionInterval {
    /// First block of the interval.
    pub start_height: i64,
    /// Last block of the interval (exclusive of the next interval's start).
    pub end_height: i64,
    /// Observed vote count per stake version within the interval.
    pub vote_counts: BTreeMap<u32, u32>,
}

impl StakeVersionInterval {
    /// Whether the interval spans exactly one full interval length. The
    /// newest interval is usually still filling and therefore incomplete.
    pub fn is_complete(&self, interval_length: i64) -> bool {
        self.end_height - self.start_height == interval_length
    }

    /// Total votes observed in the interval, across all versions.
    pub fn total_votes(&self) -> i64 {
        self.vote_counts.values().map(|&c| i64::from(c)).sum()
    }

    /// Votes observed for one specific version.
    pub fn version_votes(&self, version: u32) -> i64 {
        self.vote_counts.get(&version).map_or(0, |&c| i64::from(c))
    }
}

/// Lifecycle status of a governance agenda, as reported by the data
/// source. The source authoritatively determines lockedin/active
/// boundaries from chain-height rules this monitor does not re-derive.
///
///   Defined --> Started --> LockedIn --> Active
///                  |            |
///                  +--> Failed <+
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgendaStatus {
    /// Agenda exists but its voting window has not opened.
    Defined,
    /// Voting is in progress.
    Started,
    /// Vote passed; rules activate after one more activation interval.
    #[serde(rename = "lockedin")]
    LockedIn,
    /// Rules are active on the network.
    Active,
    /// Vote failed or expired without reaching approval.
    Failed,
}

impl fmt::Display for AgendaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgendaStatus::Defined => "defined",
            AgendaStatus::Started => "started",
            AgendaStatus::LockedIn => "lockedin",
            AgendaStatus::Active => "active",
            AgendaStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AgendaStatus {
    type Err = ForkwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defined" => Ok(AgendaStatus::Defined),
            "started" => Ok(AgendaStatus::Started),
            "lockedin" => Ok(AgendaStatus::LockedIn),
            "active" => Ok(AgendaStatus::Active),
            "failed" => Ok(AgendaStatus::Failed),
            other => Err(ForkwatchError::InvalidState(format!(
                "unknown agenda status {other}"
            ))),
        }
    }
}

/// One vote choice of an agenda, as defined by the data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceInfo {
    /// Choice identifier (e.g. "yes", "no", "abstain").
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Choice bit pattern under the agenda mask. Unique per agenda.
    pub bits: u16,
    /// Whether this is the reserved abstain pattern.
    pub is_abstain: bool,
    /// Whether this choice counts as a "no" vote.
    pub is_no: bool,
    /// Vote count the source has tallied for this choice.
    pub count: u32,
    /// The source's own progress ratio for this choice (0.0 - 1.0).
    pub progress: f64,
}

/// One governance agenda definition, as reported by the data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaInfo {
    /// Agenda identifier (e.g. "changeactivationheight").
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Bitmask isolating this agenda's bits within the vote bits.
    pub mask: u16,
    /// Lifecycle status, supplied (not computed) by the source.
    pub status: AgendaStatus,
    /// The source's quorum progress ratio (0.0 - 1.0).
    pub quorum_progress: f64,
    /// Unix timestamp at which the agenda becomes eligible for voting.
    pub start_time: u64,
    /// Unix timestamp at which the agenda expires.
    pub expire_time: u64,
    /// The agenda's mutually exclusive vote choices.
    pub choices: Vec<ChoiceInfo>,
}

/// Result of a vote-info query for one stake version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteInfo {
    /// Chain tip height at query time.
    pub current_height: i64,
    /// First block of the current rule-change interval.
    pub start_height: i64,
    /// Last block of the current rule-change interval.
    pub end_height: i64,
    /// The stake version this vote info describes.
    pub vote_version: u32,
    /// Quorum requirement, in non-abstain votes.
    pub quorum: u32,
    /// Total votes the source has observed in the interval.
    pub total_votes: u32,
    /// Agendas gated behind this vote version. May be empty; that is a
    /// valid state, not an error.
    pub agendas: Vec<AgendaInfo>,
}
