//! Stored credentials as seen by the presentation exchange engine.

use std::{borrow::Borrow, collections::HashMap, fmt};

use iref::Iri;
use json_ld::{JsonLdProcessor, LoadError, Loader, LoadingResult, RemoteDocument};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use ssi::json_ld::syntax::to_value;

use crate::{
    holder::document_loader::DocumentLoader,
    utils::{objects_of, strings_of},
};

/// Stable identity of a credential: its `id` when the credential carries one,
/// the store's record id otherwise.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for CredentialId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A credential held in the credential store, with the attributes the store
/// indexes it by.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub record_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_id: Option<String>,
    #[serde(default)]
    pub contexts: Vec<String>,
    /// Credential types expanded to absolute IRIs.
    #[serde(default)]
    pub expanded_types: Vec<String>,
    #[serde(default)]
    pub schema_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<String>,
    #[serde(default)]
    pub subject_ids: Vec<String>,
    #[serde(default)]
    pub proof_types: Vec<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub value: Json,
}

impl CredentialRecord {
    /// Build a record from a credential document, expanding its `type` terms
    /// through the contexts it declares.
    ///
    /// A record id is generated when none is given. Contexts that cannot be
    /// loaded leave the types as written.
    pub async fn from_json(
        value: Json,
        record_id: Option<String>,
        loader: &dyn DocumentLoader,
    ) -> Self {
        let mut record = Self::index(value, record_id);
        let types = strings_of(record.value.get("type"));
        record.expanded_types = expand_types(record.value.get("@context"), &types, loader).await;
        record
    }

    /// Build a record without expanding types, for callers that never match
    /// on them.
    pub fn index(value: Json, record_id: Option<String>) -> Self {
        let contexts = strings_of(value.get("@context"));

        let issuer_id = match value.get("issuer") {
            Some(Json::String(issuer)) => Some(issuer.clone()),
            Some(Json::Object(issuer)) => issuer.get("id").and_then(Json::as_str).map(Into::into),
            _ => None,
        };

        let subject_ids = objects_of(value.get("credentialSubject"))
            .into_iter()
            .filter_map(|subject| subject.get("id").and_then(Json::as_str))
            .map(ToOwned::to_owned)
            .collect();

        let schema_ids = objects_of(value.get("credentialSchema"))
            .into_iter()
            .filter_map(|schema| schema.get("id").and_then(Json::as_str))
            .map(ToOwned::to_owned)
            .collect();

        let proof_types = objects_of(value.get("proof"))
            .into_iter()
            .filter_map(|proof| proof.get("type").and_then(Json::as_str))
            .map(ToOwned::to_owned)
            .collect();

        let given_id = value.get("id").and_then(Json::as_str).map(ToOwned::to_owned);

        Self {
            record_id: record_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            given_id,
            contexts,
            expanded_types: Vec::new(),
            schema_ids,
            issuer_id,
            subject_ids,
            proof_types,
            tags: HashMap::new(),
            value,
        }
    }

    /// The stable identity used to deduplicate this credential.
    pub fn id(&self) -> CredentialId {
        CredentialId(
            self.given_id
                .clone()
                .unwrap_or_else(|| self.record_id.clone()),
        )
    }

    /// Replace the credential document, keeping the record's identity and
    /// indexed attributes. Used when a derived credential stands in for the
    /// stored one.
    pub fn with_value(mut self, value: Json) -> Self {
        self.value = value;
        self
    }
}

/// Expand credential type terms to IRIs by JSON-LD expansion of a node
/// carrying only `context` and `types`.
///
/// Terms the contexts do not define are dropped, as expansion drops them.
/// Without a context only absolute IRIs are kept. When expansion fails, for
/// instance on a context the loader cannot resolve, the types are returned
/// unexpanded.
pub async fn expand_types(
    context: Option<&Json>,
    types: &[String],
    loader: &dyn DocumentLoader,
) -> Vec<String> {
    let Some(context) = context else {
        return types
            .iter()
            .filter(|ty| Iri::new(ty.as_str()).is_ok())
            .cloned()
            .collect();
    };

    let node = json!({ "@context": context, "@type": types });
    let document: RemoteDocument = match to_value(&node) {
        Ok(document) => RemoteDocument::new(None, None, document),
        Err(error) => {
            tracing::debug!("credential types left unexpanded: {error}");
            return types.to_vec();
        }
    };

    let mut loader = ExpansionLoader(loader);
    let expanded = match document.expand(&mut loader).await {
        Ok(expanded) => expanded,
        Err(error) => {
            tracing::debug!("credential types left unexpanded: {error}");
            return types.to_vec();
        }
    };

    let expanded: Vec<String> = expanded
        .into_main_node()
        .map(|node| {
            node.types()
                .iter()
                .filter_map(|ty| ty.as_iri())
                .map(|iri| iri.as_str().to_owned())
                .collect()
        })
        .unwrap_or_default();
    if expanded.len() < types.len() {
        tracing::debug!(?types, ?expanded, "some credential types are not defined by their contexts");
    }
    expanded
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UnresolvedDocument(String);

/// Hands documents from a [DocumentLoader] to the JSON-LD processor.
struct ExpansionLoader<'a>(&'a dyn DocumentLoader);

impl Loader for ExpansionLoader<'_> {
    async fn load(&self, url: &Iri) -> LoadingResult {
        let document = self
            .0
            .resolve(url.as_str())
            .await
            .map_err(|error| LoadError::new(url.to_owned(), UnresolvedDocument(format!("{error:#}"))))?;
        let document = to_value(&document)
            .map_err(|error| LoadError::new(url.to_owned(), UnresolvedDocument(error.to_string())))?;
        Ok(RemoteDocument::new(Some(url.to_owned()), None, document))
    }
}
