// crates/forkwatch-chain/src/lib.rs
//
// forkwatch-chain: implementations of the `ChainData` boundary.
//
// Provides the JSON-RPC client that talks to a real node, a
// deterministic in-memory stub for tests and offline demo runs, and the
// poller that turns chain growth into new-block notifications.

pub mod notify;
pub mod rpc;
pub mod stub;

pub use notify::watch_best_blocks;
pub use rpc::{RpcClient, RpcConfig};
pub use stub::StubChain;
