use std::fmt::Debug;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::core::credential_format::ProofType;

use super::{document_loader::DocumentLoader, wallet::DidInfo};

/// A signature suite bound to a proof type and, for signing, to the holder key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSuite {
    pub proof_type: ProofType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
}

impl SignatureSuite {
    pub fn new(proof_type: ProofType) -> Self {
        Self {
            proof_type,
            verification_method: None,
            did: None,
        }
    }

    pub fn with_verification_method(mut self, verification_method: impl Into<String>) -> Self {
        self.verification_method = Some(verification_method.into());
        self
    }
}

/// Linked-data proof capabilities of the agent.
///
/// Implementations wrap the actual signature suites; the exchange engine only
/// decides what to sign or derive.
#[async_trait]
pub trait Signer: Debug + Send + Sync {
    /// The suite able to produce `proof_type` with `key`, if any.
    ///
    /// `key` is `None` when the suite is only used to derive proofs.
    fn suite_for(&self, key: Option<&DidInfo>, proof_type: &ProofType) -> Option<SignatureSuite>;

    /// Derive a selectively disclosed credential revealing the properties
    /// marked in `reveal_document`.
    async fn derive(
        &self,
        credential: &Json,
        reveal_document: &Json,
        suite: &SignatureSuite,
        loader: &dyn DocumentLoader,
    ) -> Result<Json>;

    /// Add a proof to `presentation` bound to `challenge` and `domain`.
    async fn sign_presentation(
        &self,
        presentation: Json,
        suite: &SignatureSuite,
        challenge: &str,
        domain: Option<&str>,
        loader: &dyn DocumentLoader,
    ) -> Result<Json>;
}
