// crates/forkwatch-chain/src/rpc.rs
//
// JSON-RPC client for the node's chain-data API.
//
// Speaks the node's legacy JSON-RPC 1.0 dialect over HTTP POST with
// basic auth. Wire structs mirror the node's lowercase field names and
// are converted into the core data model at the boundary.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use forkwatch_core::{
    AgendaInfo, AgendaStatus, ChainData, ChoiceInfo, ForkwatchError, StakeVersionInterval,
    VersionSample, VoteBits, VoteInfo,
};

/// Configuration for the node RPC connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Full endpoint URL (e.g. "http://127.0.0.1:19109").
    pub url: String,
    /// RPC username.
    pub username: String,
    /// RPC password.
    pub password: String,
}

/// JSON-RPC client implementing `ChainData` against a running node.
#[derive(Debug, Clone)]
pub struct RpcClient {
    config: RpcConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

// ---------------------------------------------------------------------------
// Wire types (node field names)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GetBestBlockResult {
    hash: String,
    height: i64,
}

#[derive(Debug, Deserialize)]
struct GetStakeVersionsResult {
    stakeversions: Vec<WireStakeVersion>,
}

#[derive(Debug, Deserialize)]
struct WireStakeVersion {
    height: i64,
    blockversion: i32,
    stakeversion: u32,
    #[serde(default)]
    votes: Vec<WireVote>,
}

#[derive(Debug, Deserialize)]
struct WireVote {
    version: u32,
    bits: u16,
}

#[derive(Debug, Deserialize)]
struct GetStakeVersionInfoResult {
    intervals: Vec<WireInterval>,
}

#[derive(Debug, Deserialize)]
struct WireInterval {
    startheight: i64,
    endheight: i64,
    #[serde(default)]
    voteversions: Vec<WireVersionCount>,
}

#[derive(Debug, Deserialize)]
struct WireVersionCount {
    version: u32,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct GetVoteInfoResult {
    currentheight: i64,
    startheight: i64,
    endheight: i64,
    voteversion: u32,
    quorum: u32,
    totalvotes: u32,
    #[serde(default)]
    agendas: Vec<WireAgenda>,
}

#[derive(Debug, Deserialize)]
struct WireAgenda {
    id: String,
    description: String,
    mask: u16,
    starttime: u64,
    expiretime: u64,
    status: String,
    quorumprogress: f64,
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    id: String,
    description: String,
    bits: u16,
    isabstain: bool,
    isno: bool,
    count: u32,
    progress: f64,
}

// ---------------------------------------------------------------------------
// Conversions into the core data model
// ---------------------------------------------------------------------------

impl From<WireStakeVersion> for VersionSample {
    fn from(w: WireStakeVersion) -> Self {
        VersionSample {
            height: w.height,
            block_version: w.blockversion,
            stake_version: w.stakeversion,
            votes: w
                .votes
                .into_iter()
                .map(|v| VoteBits {
                    version: v.version,
                    bits: v.bits,
                })
                .collect(),
        }
    }
}

impl From<WireInterval> for StakeVersionInterval {
    fn from(w: WireInterval) -> Self {
        let mut vote_counts = BTreeMap::new();
        for vc in w.voteversions {
            // Duplicate version entries would be source corruption;
            // sum them rather than drop data.
            *vote_counts.entry(vc.version).or_insert(0) += vc.count;
        }
        StakeVersionInterval {
            start_height: w.startheight,
            end_height: w.endheight,
            vote_counts,
        }
    }
}

impl TryFrom<WireAgenda> for AgendaInfo {
    type Error = ForkwatchError;

    fn try_from(w: WireAgenda) -> Result<Self, Self::Error> {
        Ok(AgendaInfo {
            id: w.id,
            description: w.description,
            mask: w.mask,
            status: w.status.parse::<AgendaStatus>()?,
            quorum_progress: w.quorumprogress,
            start_time: w.starttime,
            expire_time: w.expiretime,
            choices: w
                .choices
                .into_iter()
                .map(|c| ChoiceInfo {
                    id: c.id,
                    description: c.description,
                    bits: c.bits,
                    is_abstain: c.isabstain,
                    is_no: c.isno,
                    count: c.count,
                    progress: c.progress,
                })
                .collect(),
        })
    }
}

impl RpcClient {
    pub fn new(config: RpcConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    /// Issue one JSON-RPC call and decode the result.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ForkwatchError> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(&self.config.url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| ForkwatchError::DataSource(format!("{method}: {e}")))?;

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ForkwatchError::DataSource(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(ForkwatchError::DataSource(format!(
                "{method}: rpc error {}: {}",
                err.code, err.message
            )));
        }
        envelope.result.ok_or_else(|| {
            ForkwatchError::DataSource(format!("{method}: empty rpc result"))
        })
    }
}

#[async_trait]
impl ChainData for RpcClient {
    async fn best_block(&self) -> Result<(String, i64), ForkwatchError> {
        let result: GetBestBlockResult = self
            .call("getbestblock", serde_json::json!([]))
            .await?;
        Ok((result.hash, result.height))
    }

    async fn block_hash(&self, height: i64) -> Result<String, ForkwatchError> {
        self.call("getblockhash", serde_json::json!([height])).await
    }

    async fn stake_versions(
        &self,
        hash: &str,
        count: i64,
    ) -> Result<Vec<VersionSample>, ForkwatchError> {
        let result: GetStakeVersionsResult = self
            .call("getstakeversions", serde_json::json!([hash, count]))
            .await?;
        Ok(result.stakeversions.into_iter().map(Into::into).collect())
    }

    async fn stake_version_intervals(
        &self,
        count: i64,
    ) -> Result<Vec<StakeVersionInterval>, ForkwatchError> {
        let result: GetStakeVersionInfoResult = self
            .call("getstakeversioninfo", serde_json::json!([count]))
            .await?;
        Ok(result.intervals.into_iter().map(Into::into).collect())
    }

    async fn vote_info(&self, version: u32) -> Result<Option<VoteInfo>, ForkwatchError> {
        let result: Result<GetVoteInfoResult, ForkwatchError> =
            self.call("getvoteinfo", serde_json::json!([version])).await;
        let result = match result {
            Ok(r) => r,
            // The node rejects versions it has no deployment for; that
            // is a normal condition while walking the version range.
            Err(ForkwatchError::DataSource(msg))
                if msg.contains("unrecognized vote version") =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let agendas = result
            .agendas
            .into_iter()
            .map(AgendaInfo::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(VoteInfo {
            current_height: result.currentheight,
            start_height: result.startheight,
            end_height: result.endheight,
            vote_version: result.voteversion,
            quorum: result.quorum,
            total_votes: result.totalvotes,
            agendas,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stake_versions_result() {
        let json = r#"{
            "stakeversions": [
                {"hash": "aa", "height": 100, "blockversion": 5,
                 "stakeversion": 5,
                 "votes": [{"version": 5, "bits": 5}, {"version": 5, "bits": 3}]},
                {"hash": "bb", "height": 99, "blockversion": 4,
                 "stakeversion": 4, "votes": []}
            ]
        }"#;
        let result: GetStakeVersionsResult = serde_json::from_str(json).unwrap();
        let samples: Vec<VersionSample> =
            result.stakeversions.into_iter().map(Into::into).collect();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].height, 100);
        assert_eq!(samples[0].block_version, 5);
        assert_eq!(samples[0].votes[1].bits, 0x3);
        assert!(samples[1].votes.is_empty());
    }

    #[test]
    fn test_parse_interval_result() {
        let json = r#"{
            "intervals": [
                {"startheight": 2016, "endheight": 4032,
                 "posversions": [{"version": 4, "count": 2016}],
                 "voteversions": [
                    {"version": 4, "count": 7000},
                    {"version": 5, "count": 3000}
                 ]}
            ]
        }"#;
        let result: GetStakeVersionInfoResult = serde_json::from_str(json).unwrap();
        let svi: StakeVersionInterval = result.intervals.into_iter().next().unwrap().into();
        assert_eq!(svi.start_height, 2016);
        assert_eq!(svi.total_votes(), 10000);
        assert_eq!(svi.version_votes(5), 3000);
    }

    #[test]
    fn test_parse_vote_info_result() {
        let json = r#"{
            "currentheight": 289984,
            "startheight": 288288,
            "endheight": 296352,
            "hash": "cc",
            "voteversion": 5,
            "quorum": 4032,
            "totalvotes": 8130,
            "agendas": [
                {"id": "lnsupport", "description": "DCP-0002 lightning",
                 "mask": 6, "starttime": 1493164800, "expiretime": 1524700800,
                 "status": "started", "quorumprogress": 0.5,
                 "choices": [
                    {"id": "abstain", "description": "abstain", "bits": 0,
                     "isabstain": true, "isno": false, "count": 120, "progress": 0.1},
                    {"id": "no", "description": "no", "bits": 2,
                     "isabstain": false, "isno": true, "count": 10, "progress": 0.01},
                    {"id": "yes", "description": "yes", "bits": 4,
                     "isabstain": false, "isno": false, "count": 1000, "progress": 0.9}
                 ]}
            ]
        }"#;
        let result: GetVoteInfoResult = serde_json::from_str(json).unwrap();
        let info = AgendaInfo::try_from(result.agendas.into_iter().next().unwrap()).unwrap();
        assert_eq!(info.status, AgendaStatus::Started);
        assert_eq!(info.mask, 0x6);
        assert_eq!(info.choices.len(), 3);
        assert!(info.choices[0].is_abstain);
    }

    #[test]
    fn test_bad_status_is_rejected() {
        let wire = WireAgenda {
            id: "x".to_string(),
            description: String::new(),
            mask: 6,
            starttime: 0,
            expiretime: 0,
            status: "pending".to_string(),
            quorumprogress: 0.0,
            choices: Vec::new(),
        };
        assert!(AgendaInfo::try_from(wire).is_err());
    }
}
