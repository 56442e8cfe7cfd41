//! Parsing `pdp.json` (spec §6.3).

use indexmap::IndexMap;
use pdp_core::Value;
use pdp_policy::{CombiningAlgorithm, DefaultDecision, ErrorHandling};
use serde::Deserialize;

use crate::error::ConfigError;

/// The parsed `pdp.json` document.
#[derive(Debug, Clone)]
pub struct PdpJson {
    /// The combining algorithm for the configuration's top-level voter.
    pub algorithm: CombiningAlgorithm,
    /// The fallback decision when every voter abstains.
    pub default_decision: DefaultDecision,
    /// How an `Indeterminate` result is finalised.
    pub error_handling: ErrorHandling,
    /// A stable identifier for this configuration, if declared.
    pub configuration_id: Option<String>,
    /// Variables bound into every evaluation context built from this
    /// configuration.
    pub variables: IndexMap<String, Value>,
}

impl Default for PdpJson {
    /// Missing `algorithm` defaults to `{PRIORITY_DENY, DENY, PROPAGATE}`
    /// (spec §6.3).
    fn default() -> Self {
        Self {
            algorithm: CombiningAlgorithm::PriorityDeny,
            default_decision: DefaultDecision::Deny,
            error_handling: ErrorHandling::Propagate,
            configuration_id: None,
            variables: IndexMap::new(),
        }
    }
}

impl PdpJson {
    /// Parse `pdp.json` bytes. Missing bytes (no file present) yields the
    /// default algorithm with no variables; present-but-malformed bytes are
    /// an error the caller should treat as a skipped publish.
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        let raw: RawPdpJson =
            serde_json::from_slice(bytes).map_err(|e| ConfigError::InvalidPdpJson(e.to_string()))?;
        let algorithm = raw.algorithm.unwrap_or_default();
        let variables = raw
            .variables
            .into_iter()
            .map(|(name, json)| (name, Value::from_json(&json)))
            .collect();
        Ok(Self {
            algorithm: algorithm.voting_mode.into(),
            default_decision: algorithm.default_decision.into(),
            error_handling: algorithm.error_handling.into(),
            configuration_id: raw.configuration_id,
            variables,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawPdpJson {
    algorithm: Option<RawAlgorithm>,
    #[serde(rename = "configurationId")]
    configuration_id: Option<String>,
    #[serde(default)]
    variables: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawAlgorithm {
    #[serde(rename = "votingMode", default)]
    voting_mode: RawVotingMode,
    #[serde(rename = "defaultDecision", default)]
    default_decision: RawDefaultDecision,
    #[serde(rename = "errorHandling", default)]
    error_handling: RawErrorHandling,
}

impl Default for RawAlgorithm {
    fn default() -> Self {
        Self { voting_mode: RawVotingMode::default(), default_decision: RawDefaultDecision::default(), error_handling: RawErrorHandling::default() }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum RawVotingMode {
    #[default]
    PriorityDeny,
    PriorityPermit,
    Unanimous,
    Unique,
    First,
}

impl From<RawVotingMode> for CombiningAlgorithm {
    fn from(mode: RawVotingMode) -> Self {
        match mode {
            RawVotingMode::PriorityDeny => Self::PriorityDeny,
            RawVotingMode::PriorityPermit => Self::PriorityPermit,
            RawVotingMode::Unanimous => Self::Unanimous,
            RawVotingMode::Unique => Self::Unique,
            RawVotingMode::First => Self::First,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum RawDefaultDecision {
    Permit,
    #[default]
    Deny,
    Abstain,
}

impl From<RawDefaultDecision> for DefaultDecision {
    fn from(d: RawDefaultDecision) -> Self {
        match d {
            RawDefaultDecision::Permit => Self::Permit,
            RawDefaultDecision::Deny => Self::Deny,
            RawDefaultDecision::Abstain => Self::Abstain,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum RawErrorHandling {
    #[default]
    Propagate,
    Abstain,
}

impl From<RawErrorHandling> for ErrorHandling {
    fn from(e: RawErrorHandling) -> Self {
        match e {
            RawErrorHandling::Propagate => Self::Propagate,
            RawErrorHandling::Abstain => Self::Abstain,
        }
    }
}
