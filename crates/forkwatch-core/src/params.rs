// crates/forkwatch-core/src/params.rs
//
// Consensus parameters for the supported networks.
//
// These values never change at runtime. They mirror the network's
// consensus rules exactly; the analysis crate only reads them, it never
// enforces them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ForkwatchError;

/// The public networks the monitor can target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Network {
    /// Production network.
    MainNet,
    /// Public test network (version 3).
    TestNet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::MainNet => write!(f, "mainnet"),
            Network::TestNet => write!(f, "testnet3"),
        }
    }
}

impl FromStr for Network {
    type Err = ForkwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::MainNet),
            "testnet" | "testnet3" => Ok(Network::TestNet),
            other => Err(ForkwatchError::InvalidState(format!(
                "unknown network {other}"
            ))),
        }
    }
}

/// Per-network consensus parameters relevant to upgrade voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParams {
    /// Which network these parameters describe.
    pub network: Network,
    /// Rolling block-version window length (blocks checked for rollover).
    pub block_upgrade_window: i64,
    /// Blocks within the window required to reject the old block version.
    pub block_reject_threshold: i64,
    /// Fixed length of one stake version interval, in blocks.
    pub stake_version_interval: i64,
    /// Height at which stake voting began.
    pub stake_validation_height: i64,
    /// Numerator of the stake supermajority ratio.
    pub stake_majority_multiplier: i64,
    /// Denominator of the stake supermajority ratio.
    pub stake_majority_divisor: i64,
    /// Length of one rule-change activation interval, in blocks.
    pub rule_change_activation_interval: i64,
    /// Non-abstain votes required for an agenda outcome to be valid.
    pub rule_change_activation_quorum: i64,
    /// Votes cast per block.
    pub tickets_per_block: i64,
    /// Highest vote version deployed on this network.
    pub latest_vote_version: u32,
}

impl ChainParams {
    /// Parameters for the production network.
    pub fn mainnet() -> Self {
        Self {
            network: Network::MainNet,
            block_upgrade_window: 1000,
            block_reject_threshold: 950,
            stake_version_interval: 2016,
            stake_validation_height: 4096,
            stake_majority_multiplier: 3,
            stake_majority_divisor: 4,
            rule_change_activation_interval: 8064,
            rule_change_activation_quorum: 4032,
            tickets_per_block: 5,
            latest_vote_version: 10,
        }
    }

    /// Parameters for the public test network.
    pub fn testnet() -> Self {
        Self {
            network: Network::TestNet,
            block_upgrade_window: 100,
            block_reject_threshold: 95,
            stake_version_interval: 144,
            stake_validation_height: 768,
            stake_majority_multiplier: 3,
            stake_majority_divisor: 4,
            rule_change_activation_interval: 5040,
            rule_change_activation_quorum: 2520,
            tickets_per_block: 5,
            latest_vote_version: 10,
        }
    }

    /// Look up parameters for a named network.
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::MainNet => Self::mainnet(),
            Network::TestNet => Self::testnet(),
        }
    }

    /// Block-version reject threshold expressed as a percentage of the window.
    pub fn block_reject_percentage(&self) -> f64 {
        self.block_reject_threshold as f64 / self.block_upgrade_window as f64 * 100.0
    }

    /// Stake supermajority ratio expressed as a percentage.
    pub fn stake_majority_percentage(&self) -> f64 {
        self.stake_majority_multiplier as f64 / self.stake_majority_divisor as f64 * 100.0
    }

    /// Quorum requirement as a percentage of the maximum possible votes.
    pub fn quorum_percentage(&self) -> f64 {
        self.rule_change_activation_quorum as f64 / self.max_possible_votes() as f64 * 100.0
    }

    /// Theoretical maximum number of votes in one rule-change interval.
    pub fn max_possible_votes(&self) -> i64 {
        self.rule_change_activation_interval * self.tickets_per_block
    }
}
