use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use ssi::json_ld::CREDENTIALS_V1_CONTEXT;

use crate::core::presentation_submission::PresentationSubmission;

pub const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";
pub const PRESENTATION_SUBMISSION_TYPE: &str = "PresentationSubmission";
pub const PRESENTATION_SUBMISSION_CONTEXT: &str =
    "https://identity.foundation/presentation-exchange/submission/v1";

/// A linked-data verifiable presentation answering a presentation definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiablePresentation {
    #[serde(rename = "@context")]
    pub context: Vec<Json>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    #[serde(rename = "verifiableCredential", default)]
    pub verifiable_credential: Vec<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<PresentationSubmission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Json>,
}

#[derive(Debug, Clone)]
pub struct VerifiablePresentationBuilder(VerifiablePresentation);

impl From<VerifiablePresentationBuilder> for VerifiablePresentation {
    fn from(builder: VerifiablePresentationBuilder) -> Self {
        builder.0
    }
}

impl Default for VerifiablePresentationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifiablePresentationBuilder {
    /// Returns a builder for an empty presentation carrying the credentials
    /// context and the `VerifiablePresentation` type.
    pub fn new() -> Self {
        Self(VerifiablePresentation {
            context: vec![Json::String(CREDENTIALS_V1_CONTEXT.to_string())],
            types: vec![VERIFIABLE_PRESENTATION_TYPE.into()],
            verifiable_credential: Vec::new(),
            presentation_submission: None,
            holder: None,
            proof: None,
        })
    }

    /// Add a context, unless the presentation already lists it.
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        let context = Json::String(context.into());
        if !self.0.context.contains(&context) {
            self.0.context.push(context);
        }
        self
    }

    pub fn add_type(mut self, ty: impl Into<String>) -> Self {
        let ty = ty.into();
        if !self.0.types.contains(&ty) {
            self.0.types.push(ty);
        }
        self
    }

    /// Set the credentials, in the order the submission's descriptor map
    /// points into.
    pub fn set_credentials(mut self, credentials: Vec<Json>) -> Self {
        self.0.verifiable_credential = credentials;
        self
    }

    /// Attach the submission, adding its context and type to the presentation.
    pub fn set_presentation_submission(self, submission: PresentationSubmission) -> Self {
        let mut builder = self
            .add_context(PRESENTATION_SUBMISSION_CONTEXT)
            .add_type(PRESENTATION_SUBMISSION_TYPE);
        builder.0.presentation_submission = Some(submission);
        builder
    }

    pub fn set_holder(mut self, holder: impl Into<String>) -> Self {
        self.0.holder = Some(holder.into());
        self
    }

    pub fn build(self) -> VerifiablePresentation {
        self.0
    }
}
