// crates/forkwatch-analysis/src/state.rs
//
// Upgrade phase derivation.
//
// Agenda lifecycle states come from the data source; this module only
// interprets them, combined with the block/stake rollover results, into
// the three top-level flags consumers display.

use serde::{Deserialize, Serialize};

use crate::agenda::Agenda;

/// The overall phase of the upgrade process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpgradePhase {
    /// True while either the block-version (PoW) or stake-version (PoS)
    /// rollover has not reached its supermajority.
    pub is_upgrading: bool,
    /// True when every agenda is locked in and none is active yet:
    /// voting has ceased and activation is imminent.
    pub pending_activation: bool,
    /// True when every agenda's rules are active.
    pub rules_activated: bool,
}

/// Derive the upgrade phase from agenda statuses and rollover results.
///
/// An empty agenda list is a valid state (the source reports no agendas
/// for the current vote version); both unanimity flags are false then
/// rather than vacuously true.
pub fn derive_phase(
    agendas: &[Agenda],
    block_version_success: bool,
    stake_version_success: bool,
) -> UpgradePhase {
    UpgradePhase {
        is_upgrading: !(block_version_success && stake_version_success),
        pending_activation: !agendas.is_empty() && agendas.iter().all(Agenda::is_locked_in),
        rules_activated: !agendas.is_empty() && agendas.iter().all(Agenda::is_active),
    }
}
