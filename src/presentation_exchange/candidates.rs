use std::collections::HashSet;

use crate::{
    core::{
        credential::CredentialRecord, credential_format::ProofType,
        input_descriptor::InputDescriptor, presentation_definition::PresentationDefinition,
    },
    holder::store::{CredentialQuery, CredentialStore},
};

use super::{error::Result, PresentationExchange};

impl PresentationExchange {
    /// Read from `store` the credentials that may answer `definition`.
    ///
    /// The store is queried per input descriptor, and per `oneof_filter`
    /// group, reading at most `max_candidates` records for each query.
    /// Credentials found by several queries are returned once.
    pub async fn retrieve_candidates(
        &self,
        store: &dyn CredentialStore,
        definition: &PresentationDefinition,
    ) -> Result<Vec<CredentialRecord>> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for descriptor in definition.input_descriptors() {
            for query in queries_for(descriptor) {
                let mut search = store.search(query).await?;
                let mut remaining = self.config.max_candidates;
                while remaining > 0 {
                    let page = search.fetch(remaining).await?;
                    if page.is_empty() {
                        break;
                    }
                    remaining = remaining.saturating_sub(page.len());
                    for record in page {
                        if seen.insert(record.id()) {
                            candidates.push(record);
                        }
                    }
                }
            }
        }

        tracing::debug!(
            definition = %definition.id(),
            candidates = candidates.len(),
            "retrieved candidate credentials"
        );
        Ok(candidates)
    }
}

/// The coarse store queries for one input descriptor: one per schema group,
/// restricted to BBS+ credentials when limited disclosure is required.
fn queries_for(descriptor: &InputDescriptor) -> Vec<CredentialQuery> {
    let proof_types = if descriptor.constraints().is_limit_disclosure_required() {
        vec![ProofType::BbsBlsSignature2020.to_string()]
    } else {
        Vec::new()
    };

    let groups: Vec<Vec<String>> = descriptor
        .schema()
        .uri_groups()
        .into_iter()
        .map(|group| {
            group
                .iter()
                .filter(|uri| uri.is_required())
                .map(|uri| uri.uri.clone())
                .collect()
        })
        .collect();

    if groups.is_empty() {
        return vec![CredentialQuery {
            proof_types,
            ..CredentialQuery::default()
        }];
    }

    groups
        .into_iter()
        .map(|schema_uris| CredentialQuery {
            schema_uris,
            proof_types: proof_types.clone(),
            ..CredentialQuery::default()
        })
        .collect()
}
