use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::credential_format::ProofType;

const DEFAULT_MAX_CANDIDATES: usize = 1000;

/// Settings of the presentation exchange engine.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PresentationExchangeConfig {
    /// Proof type of the presentations the holder signs.
    pub proof_type: ProofType,
    /// Answer presentation requests without holder interaction. When off, a
    /// request matched by several credentials needs an explicit selection.
    pub auto_respond_presentation_request: bool,
    /// Sign with this DID instead of one inferred from the credential subjects.
    pub pres_signing_did: Option<String>,
    /// Upper bound on the records read from the credential store per input descriptor.
    pub max_candidates: usize,
    /// Whether the agent can derive selectively disclosed credentials.
    pub selective_disclosure: bool,
}

impl Default for PresentationExchangeConfig {
    fn default() -> Self {
        Self {
            proof_type: ProofType::default(),
            auto_respond_presentation_request: false,
            pres_signing_did: None,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            selective_disclosure: true,
        }
    }
}

impl PresentationExchangeConfig {
    pub fn from_json_str(config: &str) -> Result<Self> {
        serde_json::from_str(config).context("invalid presentation exchange configuration")
    }
}
