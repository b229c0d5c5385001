// crates/forkwatch-analysis/src/agenda.rs
//
// Per-agenda vote tallying and derived quorum/approval metrics.
//
// An agenda partitions the masked vote-bits space into mutually
// exclusive choices (plus the reserved abstain pattern). The tally
// classifies raw votes by `bits & mask == choice.bits`; a vote matching
// no choice indicates upstream data corruption and is dropped with a
// debug log, never failing the pass.

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use forkwatch_core::{AgendaInfo, AgendaStatus, ChainParams, VoteBits};

fn dcp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)DCP-?(\d{4})").expect("valid DCP regex"))
}

/// One vote choice of an agenda.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteChoice {
    pub id: String,
    pub description: String,
    /// Bit pattern under the agenda mask. Unique per agenda.
    pub bits: u16,
    /// The reserved abstain pattern (excluded from acting percentages).
    pub is_abstain: bool,
    /// Whether this choice counts against the agenda.
    pub is_no: bool,
}

/// A governance agenda with its locally-counted vote totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agenda {
    pub id: String,
    pub description: String,
    /// Lifecycle status, supplied by the data source and only
    /// interpreted here.
    pub status: AgendaStatus,
    /// Bitmask isolating this agenda's bits within the vote bits.
    pub mask: u16,
    /// Stake version this agenda is gated behind.
    pub vote_version: u32,
    /// Non-abstain votes required for the outcome to be valid.
    pub quorum_threshold: i64,
    /// When the agenda becomes eligible for voting.
    pub start_time: DateTime<Utc>,
    /// When the agenda expires.
    pub expire_time: DateTime<Utc>,
    /// First block of the voting window, once the gating stake version
    /// upgrade has occurred.
    pub start_height: Option<i64>,
    /// Last block of the voting window.
    pub end_height: Option<i64>,
    /// The agenda's mutually exclusive vote choices.
    pub choices: Vec<VoteChoice>,
    /// Locally counted votes per choice id. Keys are always a subset of
    /// the choice ids.
    pub vote_counts: BTreeMap<String, i64>,
}

impl Agenda {
    /// Build an agenda from the data source's definition. Vote counts
    /// start empty; they are filled by `count_votes` once the voting
    /// window is known.
    pub fn from_info(info: &AgendaInfo, vote_version: u32, quorum: u32) -> Self {
        Self {
            id: info.id.clone(),
            description: info.description.clone(),
            status: info.status,
            mask: info.mask,
            vote_version,
            quorum_threshold: i64::from(quorum),
            start_time: Utc
                .timestamp_opt(info.start_time as i64, 0)
                .single()
                .unwrap_or_default(),
            expire_time: Utc
                .timestamp_opt(info.expire_time as i64, 0)
                .single()
                .unwrap_or_default(),
            start_height: None,
            end_height: None,
            choices: info
                .choices
                .iter()
                .map(|c| VoteChoice {
                    id: c.id.clone(),
                    description: c.description.clone(),
                    bits: c.bits,
                    is_abstain: c.is_abstain,
                    is_no: c.is_no,
                })
                .collect(),
            vote_counts: BTreeMap::new(),
        }
    }

    /// Tally raw votes into per-choice counts. Only votes cast at this
    /// agenda's vote version are considered; each of those classifies
    /// into at most one choice via `bits & mask == choice.bits`.
    /// Replaces any previous counts.
    pub fn count_votes(&mut self, votes: &[VoteBits]) {
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for choice in &self.choices {
            counts.insert(choice.id.clone(), 0);
        }

        for vote in votes.iter().filter(|v| v.version == self.vote_version) {
            let masked = vote.bits & self.mask;
            match self.choices.iter().find(|c| c.bits == masked) {
                Some(choice) => {
                    // Choice ids are pre-seeded above.
                    if let Some(count) = counts.get_mut(&choice.id) {
                        *count += 1;
                    }
                }
                None => {
                    tracing::debug!(
                        agenda = %self.id,
                        bits = format_args!("{:#06x}", vote.bits),
                        mask = format_args!("{:#06x}", self.mask),
                        "vote bits match no choice, dropping"
                    );
                }
            }
        }

        self.vote_counts = counts;
        for (id, count) in &self.vote_counts {
            tracing::debug!(agenda = %self.id, choice = %id, count, "tallied");
        }
    }

    fn count_for(&self, choice_id: &str) -> i64 {
        self.vote_counts.get(choice_id).copied().unwrap_or(0)
    }

    /// Sum of votes for all abstain choices.
    pub fn abstain_votes(&self) -> i64 {
        self.choices
            .iter()
            .filter(|c| c.is_abstain)
            .map(|c| self.count_for(&c.id))
            .sum()
    }

    /// Sum of votes for all "no" choices.
    pub fn no_votes(&self) -> i64 {
        self.choices
            .iter()
            .filter(|c| c.is_no)
            .map(|c| self.count_for(&c.id))
            .sum()
    }

    /// Sum of votes for all approving choices.
    pub fn yes_votes(&self) -> i64 {
        self.choices
            .iter()
            .filter(|c| !c.is_abstain && !c.is_no)
            .map(|c| self.count_for(&c.id))
            .sum()
    }

    /// Acting (non-abstain) votes: the quorum-relevant total.
    pub fn total_non_abstain_votes(&self) -> i64 {
        self.yes_votes() + self.no_votes()
    }

    /// All votes cast against this agenda.
    pub fn total_votes(&self) -> i64 {
        self.total_non_abstain_votes() + self.abstain_votes()
    }

    /// Whether the non-abstain participation has reached the quorum.
    pub fn quorum_met(&self) -> bool {
        self.total_non_abstain_votes() >= self.quorum_threshold
    }

    /// Progress toward quorum, capped at 1.0.
    pub fn quorum_progress(&self) -> f64 {
        if self.quorum_threshold <= 0 {
            return 1.0;
        }
        (self.total_non_abstain_votes() as f64 / self.quorum_threshold as f64).min(1.0)
    }

    /// Yes votes as a share of acting votes, in percent. `None` while no
    /// acting votes exist ("no votes yet", never NaN).
    pub fn approval_rating(&self) -> Option<f64> {
        let acting = self.total_non_abstain_votes();
        if acting == 0 {
            return None;
        }
        Some(self.yes_votes() as f64 / acting as f64 * 100.0)
    }

    /// One choice's share of all votes cast, in percent.
    pub fn vote_percent(&self, choice_id: &str) -> Option<f64> {
        let total = self.total_votes();
        if total == 0 {
            return None;
        }
        Some(self.count_for(choice_id) as f64 / total as f64 * 100.0)
    }

    /// One choice's share of the acting (non-abstain) votes, in percent.
    /// Abstain is excluded from the denominator so the yes/no shares of
    /// a quorum-bound vote sum to 100.
    pub fn percent_of_acting(&self, choice_id: &str) -> Option<f64> {
        let acting = self.total_non_abstain_votes();
        if acting == 0 {
            return None;
        }
        Some(self.count_for(choice_id) as f64 / acting as f64 * 100.0)
    }

    /// One choice's share of the theoretical maximum number of votes in
    /// a full rule-change interval.
    pub fn vote_count_percentage(&self, choice_id: &str, params: &ChainParams) -> f64 {
        self.count_for(choice_id) as f64 / params.max_possible_votes() as f64 * 100.0
    }

    pub fn is_defined(&self) -> bool {
        self.status == AgendaStatus::Defined
    }

    pub fn is_started(&self) -> bool {
        self.status == AgendaStatus::Started
    }

    pub fn is_locked_in(&self) -> bool {
        self.status == AgendaStatus::LockedIn
    }

    pub fn is_active(&self) -> bool {
        self.status == AgendaStatus::Active
    }

    pub fn is_failed(&self) -> bool {
        self.status == AgendaStatus::Failed
    }

    /// True once the vote has started, regardless of outcome.
    pub fn voting_started(&self) -> bool {
        !self.is_defined()
    }

    /// First block of the lock-in period. `None` unless the vote passed.
    pub fn block_locked_in(&self) -> Option<i64> {
        if self.is_locked_in() || self.is_active() {
            self.end_height.map(|end| end + 1)
        } else {
            None
        }
    }

    /// First block with this agenda's rules active. `None` unless the
    /// vote passed.
    pub fn activation_block(&self, params: &ChainParams) -> Option<i64> {
        self.block_locked_in()
            .map(|locked_in| locked_in + params.rule_change_activation_interval)
    }

    /// Whether the agenda description references a DCP proposal.
    pub fn is_dcp(&self) -> bool {
        dcp_regex().is_match(&self.description)
    }

    /// The referenced DCP proposal number, with leading zeros intact.
    pub fn dcp_number(&self) -> Option<String> {
        dcp_regex()
            .captures(&self.description)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Derive the voting window for agendas gated behind an upgrade that
/// completed at `upgrade_height`: voting occupies the first rule-change
/// activation interval starting at or after that height, stepping from
/// the stake validation height.
pub fn voting_window(upgrade_height: i64, params: &ChainParams) -> (i64, i64) {
    let mut start = params.stake_validation_height;
    while start < upgrade_height {
        start += params.rule_change_activation_interval;
    }
    (start, start + params.rule_change_activation_interval - 1)
}
