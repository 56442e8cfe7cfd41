//! [`PdpConfiguration`] and the [`VoterSource`] sink configuration sources
//! publish to (spec §4.4).

use indexmap::IndexMap;
use pdp_core::Value;
use pdp_policy::{CombiningAlgorithm, DefaultDecision, ErrorHandling};

use crate::pdp_json::PdpJson;

/// One `.sapl` document, named and with its raw text preserved for the
/// external compiler (spec §6.1).
#[derive(Debug, Clone)]
pub struct SaplDocument {
    /// Entry or file name, including extension.
    pub name: String,
    /// Raw document text.
    pub text: String,
}

/// A logical configuration record: the combining algorithm, variables, and
/// uncompiled SAPL documents for one `pdpId` (spec §4.4, §4.5).
#[derive(Debug, Clone)]
pub struct PdpConfiguration {
    /// The PDP this configuration applies to.
    pub pdp_id: String,
    /// The top-level combining algorithm.
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
    /// Uncompiled `.sapl` documents, in the order they were discovered.
    pub sapl_documents: Vec<SaplDocument>,
}

impl PdpConfiguration {
    /// Build a configuration from a parsed `pdp.json` and a set of
    /// discovered SAPL documents.
    #[must_use]
    pub fn new(pdp_id: impl Into<String>, pdp_json: PdpJson, sapl_documents: Vec<SaplDocument>) -> Self {
        Self {
            pdp_id: pdp_id.into(),
            algorithm: pdp_json.algorithm,
            default_decision: pdp_json.default_decision,
            error_handling: pdp_json.error_handling,
            configuration_id: pdp_json.configuration_id,
            variables: pdp_json.variables,
            sapl_documents,
        }
    }
}

/// The sink every configuration source publishes to (spec §4.4, §4.5). A
/// decision point implements this to install compiled voter trees.
pub trait VoterSource: Send + Sync {
    /// Publish `config`, replacing the prior snapshot for its `pdpId` when
    /// `replace` is `true` (sources always pass `true`; `false` is reserved
    /// for incremental/merge publication modes not used by any source in
    /// this crate).
    fn load_configuration(&self, config: PdpConfiguration, replace: bool);

    /// Remove any configuration for `pdp_id`; active decision streams emit a
    /// final `Indeterminate` with reason `"configuration removed"`.
    fn remove_configuration_for_pdp(&self, pdp_id: &str);
}

/// Validate a `pdpId`: `[A-Za-z0-9._-]{1,255}`.
#[must_use]
pub fn is_valid_pdp_id(pdp_id: &str) -> bool {
    let len = pdp_id.chars().count();
    len >= 1
        && len <= 255
        && pdp_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
