//! The presentation exchange engine: selecting the holder's credentials that
//! answer a presentation definition, and checking received presentations.

use std::{collections::HashMap, sync::Arc};

use anyhow::bail;
use serde_json::Value as Json;

use crate::{
    config::PresentationExchangeConfig,
    core::{
        credential::CredentialRecord,
        credential_format::SECURITY_CONTEXT_BBS_URL,
        presentation_definition::PresentationDefinition,
        presentation_submission::PresentationSubmission,
    },
    holder::{
        document_loader::{DocumentLoader, StaticDocumentLoader},
        signer::Signer,
        verifiable_presentation_builder::VerifiablePresentationBuilder,
        wallet::{DidInfo, Wallet},
    },
};

pub use apply::{merge, DescriptorCredentials};
pub use error::{PresentationExchangeError, Result};
pub use field::field_matches;
pub use requirement::{make_requirement, Quota, Requirement};
pub use reveal::reveal_document;

mod apply;
mod candidates;
mod constraints;
pub mod error;
mod field;
pub mod requirement;
mod reveal;
mod verify;

/// Credentials the holder picked per input descriptor, by record id or
/// credential id.
pub type RecordsFilter = HashMap<String, Vec<String>>;

/// Evaluates presentation definitions against the holder's credentials.
#[derive(Debug, Clone)]
pub struct PresentationExchange {
    wallet: Arc<dyn Wallet>,
    signer: Arc<dyn Signer>,
    loader: Arc<dyn DocumentLoader>,
    config: PresentationExchangeConfig,
}

/// Per-request inputs of [`PresentationExchange::create_vp`].
#[derive(Debug, Clone, Default)]
pub struct PresentationOptions {
    pub challenge: String,
    pub domain: Option<String>,
    pub records_filter: Option<RecordsFilter>,
    /// Disclosure frame used instead of the one built from the constraints.
    pub reveal_document: Option<Json>,
}

impl PresentationOptions {
    pub fn new(challenge: impl Into<String>) -> Self {
        Self {
            challenge: challenge.into(),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_records_filter(mut self, records_filter: RecordsFilter) -> Self {
        self.records_filter = Some(records_filter);
        self
    }

    pub fn with_reveal_document(mut self, reveal_document: Json) -> Self {
        self.reveal_document = Some(reveal_document);
        self
    }

    /// Whether the holder restricted the candidates of `descriptor_id` and, if
    /// so, whether `credential` is among them.
    fn selects(&self, descriptor_id: &str, credential: &CredentialRecord) -> bool {
        let Some(selected) = self
            .records_filter
            .as_ref()
            .and_then(|filter| filter.get(descriptor_id))
        else {
            return true;
        };
        let id = credential.id();
        selected
            .iter()
            .any(|selected| *selected == credential.record_id || selected == id.as_str())
    }
}

/// The presentations answering a definition: one per top-level submission
/// requirement.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedPresentation {
    Single(Json),
    Multiple(Vec<Json>),
}

impl CreatedPresentation {
    pub fn into_vec(self) -> Vec<Json> {
        match self {
            Self::Single(presentation) => vec![presentation],
            Self::Multiple(presentations) => presentations,
        }
    }

    pub fn single(&self) -> Option<&Json> {
        match self {
            Self::Single(presentation) => Some(presentation),
            Self::Multiple(_) => None,
        }
    }
}

impl PresentationExchange {
    pub fn builder() -> PresentationExchangeBuilder {
        PresentationExchangeBuilder::default()
    }

    pub fn config(&self) -> &PresentationExchangeConfig {
        &self.config
    }

    /// Build the verifiable presentation(s) answering `definition` from
    /// `credentials`.
    ///
    /// Each top-level submission requirement is answered by its own
    /// presentation; a definition without submission requirements by one.
    /// A requirement selecting nothing fails the call unless its bounds admit
    /// zero credentials.
    /// A presentation is signed when a common subject of its credentials is a
    /// wallet DID of the configured key type, or when a signing DID is
    /// configured. Otherwise it is returned unsigned.
    pub async fn create_vp(
        &self,
        credentials: &[CredentialRecord],
        definition: &PresentationDefinition,
        options: &PresentationOptions,
    ) -> Result<CreatedPresentation> {
        self.assemble(credentials, definition, options)
            .await
            .map_err(|error| error.in_definition(definition.id()))
    }

    async fn assemble(
        &self,
        credentials: &[CredentialRecord],
        definition: &PresentationDefinition,
        options: &PresentationOptions,
    ) -> Result<CreatedPresentation> {
        definition
            .validate()
            .map_err(|error| PresentationExchangeError::Definition(format!("{error:#}")))?;

        let requirement = make_requirement(
            definition.submission_requirements(),
            definition.input_descriptors(),
        )?;

        let entries = match &requirement {
            Requirement::Group { children, .. } => children.iter().collect(),
            leaf => vec![leaf],
        };

        let mut presentations = Vec::with_capacity(entries.len());
        for (position, entry) in entries.into_iter().enumerate() {
            let result = self.apply_requirement(entry, credentials, options).await?;
            // An explicit zero lower bound is answered by an empty presentation.
            if result.is_empty() && !entry.quota().admits(0) {
                let what = match &requirement {
                    Requirement::Group { .. } => format!("submission requirement {position}"),
                    Requirement::Leaf { .. } => "the input descriptors".to_owned(),
                };
                return Err(PresentationExchangeError::NoCandidates(what));
            }
            presentations.push(self.present(definition, &result, options).await?);
        }

        Ok(match presentations.len() {
            1 => CreatedPresentation::Single(presentations.remove(0)),
            _ => CreatedPresentation::Multiple(presentations),
        })
    }

    async fn present(
        &self,
        definition: &PresentationDefinition,
        result: &DescriptorCredentials,
        options: &PresentationOptions,
    ) -> Result<Json> {
        let (credentials, descriptor_map) = merge(result);

        if credentials.len() > 1
            && options.records_filter.is_none()
            && !self.config.auto_respond_presentation_request
        {
            return Err(PresentationExchangeError::AmbiguousSelection(
                credentials.len(),
            ));
        }

        let signing_key = self.signing_key(&credentials).await?;

        let submission = PresentationSubmission::with_random_id(definition.id(), descriptor_map);
        let mut builder = VerifiablePresentationBuilder::new()
            .set_credentials(credentials.iter().map(|c| c.value.clone()).collect())
            .set_presentation_submission(submission);
        if self.config.proof_type.requires_bbs_context() {
            builder = builder.add_context(SECURITY_CONTEXT_BBS_URL);
        }
        if let Some(key) = &signing_key {
            builder = builder.set_holder(key.did.clone());
        }
        let presentation =
            serde_json::to_value(builder.build()).map_err(anyhow::Error::from)?;

        tracing::info!(
            definition = %definition.id(),
            credentials = credentials.len(),
            signed = signing_key.is_some(),
            "assembled presentation"
        );

        let Some(key) = signing_key else {
            return Ok(presentation);
        };

        let mut suite = self
            .signer
            .suite_for(Some(&key), &self.config.proof_type)
            .ok_or_else(|| {
                PresentationExchangeError::UnsupportedOperation(format!(
                    "no {} suite for the key of {}",
                    self.config.proof_type, key.did
                ))
            })?
            .with_verification_method(self.wallet.get_verification_method_id(&key.did).await?);
        suite.did = Some(key.did.clone());

        Ok(self
            .signer
            .sign_presentation(
                presentation,
                &suite,
                &options.challenge,
                options.domain.as_deref(),
                self.loader.as_ref(),
            )
            .await?)
    }

    /// The DID to sign a presentation of `credentials` with, if any.
    async fn signing_key(&self, credentials: &[CredentialRecord]) -> Result<Option<DidInfo>> {
        if let Some(did) = &self.config.pres_signing_did {
            return match self.wallet.get_local_did(did).await? {
                Some(info) => Ok(Some(info)),
                None => Err(PresentationExchangeError::UnknownSigningDid(did.clone())),
            };
        }

        let mut chosen = None;
        for credential in credentials {
            if let Some(info) = self.eligible_subject(credential).await {
                chosen = Some(info);
                break;
            }
        }
        let Some(info) = chosen else {
            return Ok(None);
        };

        let shared = credentials.iter().all(|credential| {
            credential.subject_ids.is_empty() || credential.subject_ids.contains(&info.did)
        });
        if !shared {
            return Err(PresentationExchangeError::MultipleSubjects);
        }
        Ok(Some(info))
    }

    /// The first subject of `credential` that is a wallet DID with a key of the
    /// configured proof type. Anonymous (`urn:`) subjects are skipped.
    async fn eligible_subject(&self, credential: &CredentialRecord) -> Option<DidInfo> {
        let key_type = self.config.proof_type.key_type()?;
        for subject in &credential.subject_ids {
            if subject.starts_with("urn:") {
                continue;
            }
            match self.wallet.get_local_did(subject).await {
                Ok(Some(info)) if info.key_type == key_type => return Some(info),
                Ok(_) => {}
                Err(error) => tracing::warn!("skipping subject {subject}: {error:#}"),
            }
        }
        None
    }
}

#[derive(Debug, Default)]
pub struct PresentationExchangeBuilder {
    wallet: Option<Arc<dyn Wallet>>,
    signer: Option<Arc<dyn Signer>>,
    loader: Option<Arc<dyn DocumentLoader>>,
    config: PresentationExchangeConfig,
}

impl PresentationExchangeBuilder {
    /// Build the engine. A [`StaticDocumentLoader`] is used unless a loader is set.
    pub fn build(self) -> anyhow::Result<PresentationExchange> {
        let Self {
            wallet,
            signer,
            loader,
            config,
        } = self;

        let Some(wallet) = wallet else {
            bail!("wallet is required, see `with_wallet`")
        };

        let Some(signer) = signer else {
            bail!("signer is required, see `with_signer`")
        };

        Ok(PresentationExchange {
            wallet,
            signer,
            loader: loader.unwrap_or_else(|| Arc::new(StaticDocumentLoader::new())),
            config,
        })
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_document_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_config(mut self, config: PresentationExchangeConfig) -> Self {
        self.config = config;
        self
    }
}
