use std::{collections::HashMap, fmt::Debug};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use iref::Iri;
use json_ld::Loader;
use serde_json::Value as Json;
use ssi::json_ld::{syntax::from_value, ContextLoader};
use url::Url;

use crate::core::util::{get_json, AsyncHttpClient};

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const CITIZENSHIP_V1_CONTEXT: &str = "https://w3id.org/citizenship/v1";
pub const VACCINATION_V1_CONTEXT: &str = "https://w3id.org/vaccination/v1";

/// Resolves JSON-LD documents (contexts) by URL.
#[async_trait]
pub trait DocumentLoader: Debug + Send + Sync {
    async fn resolve(&self, url: &str) -> Result<Json>;
}

/// Serves registered documents and the contexts bundled with `ssi`
/// (credentials, security suites, citizenship, vaccination, submission and
/// others).
#[derive(Debug, Clone)]
pub struct StaticDocumentLoader {
    documents: HashMap<String, Json>,
    bundled: bool,
}

impl Default for StaticDocumentLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticDocumentLoader {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            bundled: true,
        }
    }

    /// A loader serving only the documents registered with [Self::with_document].
    pub fn empty() -> Self {
        Self {
            documents: HashMap::new(),
            bundled: false,
        }
    }

    /// Register a document, shadowing a bundled context with the same URL.
    pub fn with_document(mut self, url: impl Into<String>, document: Json) -> Self {
        self.documents.insert(url.into(), document);
        self
    }

    async fn bundled(&self, url: &str) -> Result<Option<Json>> {
        if !self.bundled {
            return Ok(None);
        }
        let Ok(iri) = Iri::new(url) else {
            return Ok(None);
        };
        match ContextLoader::default().load(iri).await {
            Ok(document) => {
                let document = from_value(document.into_document())
                    .with_context(|| format!("bundled context `{url}` is not JSON"))?;
                Ok(Some(document))
            }
            Err(error) => {
                tracing::trace!("`{url}` is not bundled: {error}");
                Ok(None)
            }
        }
    }

    /// The registered or bundled document at `url`, if any.
    pub async fn get(&self, url: &str) -> Result<Option<Json>> {
        if let Some(document) = self.documents.get(url) {
            return Ok(Some(document.clone()));
        }
        self.bundled(url).await
    }
}

#[async_trait]
impl DocumentLoader for StaticDocumentLoader {
    async fn resolve(&self, url: &str) -> Result<Json> {
        self.get(url)
            .await?
            .ok_or_else(|| anyhow!("no document is registered for `{url}`"))
    }
}

/// Fetches documents over HTTP, serving registered documents without a request.
#[derive(Debug)]
pub struct HttpDocumentLoader<C> {
    client: C,
    fallback: StaticDocumentLoader,
}

impl<C> HttpDocumentLoader<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            fallback: StaticDocumentLoader::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: StaticDocumentLoader) -> Self {
        self.fallback = fallback;
        self
    }
}

#[async_trait]
impl<C> DocumentLoader for HttpDocumentLoader<C>
where
    C: AsyncHttpClient + Debug + Send + Sync,
{
    async fn resolve(&self, url: &str) -> Result<Json> {
        if let Some(document) = self.fallback.get(url).await? {
            return Ok(document);
        }
        let parsed = Url::parse(url).with_context(|| format!("`{url}` is not a URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("`{url}` cannot be fetched and is not a registered document")
        }
        tracing::debug!("fetching JSON-LD document {url}");
        get_json(&self.client, &parsed).await
    }
}
