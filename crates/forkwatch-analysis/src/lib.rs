// crates/forkwatch-analysis/src/lib.rs
//
// forkwatch-analysis: the upgrade/voting analytics engine.
//
// This crate implements the rolling block-version window tally, the
// block-version rollover analyzer, the stake-version-interval store with
// its supermajority search (including hardcoded historical overrides),
// the per-agenda vote tally, the upgrade phase derivation, and the
// snapshot builder that assembles one full analysis pass over the
// `ChainData` boundary.

pub mod agenda;
pub mod block_version;
pub mod intervals;
pub mod snapshot;
pub mod state;
pub mod window;

pub use agenda::Agenda;
pub use block_version::BlockVersionSummary;
pub use intervals::{IntervalProgress, IntervalSeries, StakeVersionIntervals, StakeVersionSummary};
pub use snapshot::{build_snapshot, SnapshotHandle, UpgradeSnapshot};
pub use state::UpgradePhase;
pub use window::{rolling_version_counts, RollingWindow, WindowPosition};
