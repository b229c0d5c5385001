// crates/forkwatch-core/src/lib.rs
//
// forkwatch-core: Core types, chain parameters, and the chain-data trait
// boundary for the forkwatch upgrade monitor.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the canonical data structures, the error type, and the
// `ChainData` trait that abstracts the node RPC collaborator.

pub mod error;
pub mod params;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use forkwatch_core::VersionSample;`

pub use error::ForkwatchError;
pub use params::{ChainParams, Network};
pub use traits::ChainData;
pub use types::{
    AgendaInfo, AgendaStatus, ChoiceInfo, StakeVersionInterval, VersionSample, VoteBits, VoteInfo,
};
