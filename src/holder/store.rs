use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    fmt::Debug,
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::credential::CredentialRecord;

/// A coarse credential search. Every set attribute narrows the result; the
/// store may return a superset of what the exchange engine finally accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialQuery {
    /// All of these contexts.
    pub contexts: Vec<String>,
    /// All of these expanded types.
    pub types: Vec<String>,
    /// Any of these schema ids.
    pub schema_ids: Vec<String>,
    /// Each of these must be a schema id or an expanded type of the record.
    pub schema_uris: Vec<String>,
    pub issuer_id: Option<String>,
    /// All of these subject ids.
    pub subject_ids: Vec<String>,
    /// Any of these proof types.
    pub proof_types: Vec<String>,
    pub given_id: Option<String>,
    pub tag_query: HashMap<String, String>,
}

impl CredentialQuery {
    pub fn matches(&self, record: &CredentialRecord) -> bool {
        let all = |wanted: &[String], have: &[String]| wanted.iter().all(|w| have.contains(w));
        let any = |wanted: &[String], have: &[String]| {
            wanted.is_empty() || wanted.iter().any(|w| have.contains(w))
        };

        all(&self.contexts, &record.contexts)
            && all(&self.types, &record.expanded_types)
            && any(&self.schema_ids, &record.schema_ids)
            && self.schema_uris.iter().all(|uri| {
                record.schema_ids.contains(uri) || record.expanded_types.contains(uri)
            })
            && self
                .issuer_id
                .as_ref()
                .map_or(true, |issuer| record.issuer_id.as_ref() == Some(issuer))
            && all(&self.subject_ids, &record.subject_ids)
            && any(&self.proof_types, &record.proof_types)
            && self
                .given_id
                .as_ref()
                .map_or(true, |id| record.given_id.as_ref() == Some(id))
            && self
                .tag_query
                .iter()
                .all(|(tag, value)| record.tags.get(tag) == Some(value))
    }
}

/// Storage interface for the holder's credentials.
#[async_trait]
pub trait CredentialStore: Debug + Send + Sync {
    /// Start a search. Results are read in pages with [`CredentialSearch::fetch`].
    async fn search(&self, query: CredentialQuery) -> Result<Box<dyn CredentialSearch>>;
}

/// An open search over a [`CredentialStore`].
#[async_trait]
pub trait CredentialSearch: Send {
    /// Fetch at most `max_count` further records. An empty page ends the search.
    async fn fetch(&mut self, max_count: usize) -> Result<Vec<CredentialRecord>>;
}

/// A local in-memory credential store. Not for production use!
///
/// # Warning
/// Searches scan every record; this store is meant for tests and small embedded agents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    store: Arc<Mutex<BTreeMap<String, CredentialRecord>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, replacing any record with the same record id.
    pub async fn insert(&self, record: CredentialRecord) {
        self.store
            .lock()
            .await
            .insert(record.record_id.clone(), record);
    }

    pub async fn remove(&self, record_id: &str) -> Option<CredentialRecord> {
        self.store.lock().await.remove(record_id)
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.lock().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn search(&self, query: CredentialQuery) -> Result<Box<dyn CredentialSearch>> {
        let records = self
            .store
            .lock()
            .await
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        Ok(Box::new(InMemorySearch { records }))
    }
}

struct InMemorySearch {
    records: VecDeque<CredentialRecord>,
}

#[async_trait]
impl CredentialSearch for InMemorySearch {
    async fn fetch(&mut self, max_count: usize) -> Result<Vec<CredentialRecord>> {
        let count = max_count.min(self.records.len());
        Ok(self.records.drain(..count).collect())
    }
}
