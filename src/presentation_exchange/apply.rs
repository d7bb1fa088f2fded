use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    future::Future,
    pin::Pin,
};

use crate::core::{
    credential::{CredentialId, CredentialRecord},
    presentation_submission::DescriptorMap,
};

use super::{
    error::Result, requirement::Requirement, PresentationExchange, PresentationOptions,
};

/// Applicable credentials per input descriptor id.
pub type DescriptorCredentials = BTreeMap<String, Vec<CredentialRecord>>;

type Applied<'a> = Pin<Box<dyn Future<Output = Result<DescriptorCredentials>> + Send + 'a>>;

impl PresentationExchange {
    /// Select the credentials satisfying `requirement`.
    ///
    /// An unsatisfiable requirement yields an empty map, never a partial one.
    pub async fn apply_requirement(
        &self,
        requirement: &Requirement<'_>,
        credentials: &[CredentialRecord],
        options: &PresentationOptions,
    ) -> Result<DescriptorCredentials> {
        self.apply(requirement, credentials, options).await
    }

    fn apply<'a>(
        &'a self,
        requirement: &'a Requirement<'a>,
        credentials: &'a [CredentialRecord],
        options: &'a PresentationOptions,
    ) -> Applied<'a> {
        Box::pin(async move {
            match requirement {
                Requirement::Leaf { quota, descriptors } => {
                    let mut result = DescriptorCredentials::new();
                    for descriptor in descriptors {
                        let candidates: Vec<&CredentialRecord> = credentials
                            .iter()
                            .filter(|credential| options.selects(descriptor.id(), credential))
                            .filter(|credential| {
                                descriptor
                                    .schema()
                                    .accepts(&credential.schema_ids, &credential.expanded_types)
                            })
                            .collect();

                        let applicable = self
                            .filter_candidates(
                                descriptor.constraints(),
                                candidates,
                                options.reveal_document.as_ref(),
                            )
                            .await?;

                        tracing::debug!(
                            descriptor = descriptor.id(),
                            applicable = applicable.len(),
                            "filtered candidates"
                        );
                        if !applicable.is_empty() {
                            result.insert(descriptor.id().to_owned(), applicable);
                        }
                    }

                    if quota.admits(result.len()) {
                        Ok(result)
                    } else {
                        tracing::debug!(
                            satisfied = result.len(),
                            ?quota,
                            "input descriptor group not satisfied"
                        );
                        Ok(DescriptorCredentials::new())
                    }
                }
                Requirement::Group { quota, children } => {
                    let mut results = Vec::with_capacity(children.len());
                    for child in children {
                        let result = self.apply(child, credentials, options).await?;
                        if !result.is_empty() {
                            results.push(result);
                        }
                    }

                    // Input descriptors each credential answers across all children.
                    let mut participation: HashMap<CredentialId, BTreeSet<&str>> = HashMap::new();
                    for result in &results {
                        for (descriptor_id, applicable) in result {
                            for credential in applicable {
                                participation
                                    .entry(credential.id())
                                    .or_default()
                                    .insert(descriptor_id.as_str());
                            }
                        }
                    }

                    let excluded: HashSet<(String, CredentialId)> = participation
                        .into_iter()
                        .filter(|(_, descriptors)| !quota.admits(descriptors.len()))
                        .flat_map(|(id, descriptors)| {
                            descriptors
                                .into_iter()
                                .map(move |descriptor_id| (descriptor_id.to_owned(), id.clone()))
                        })
                        .collect();

                    Ok(merge_nested(&results, &excluded))
                }
            }
        })
    }
}

/// Union of the children's results, skipping excluded (descriptor, credential)
/// pairs and credentials already listed for a descriptor.
fn merge_nested(
    results: &[DescriptorCredentials],
    excluded: &HashSet<(String, CredentialId)>,
) -> DescriptorCredentials {
    let mut merged = DescriptorCredentials::new();
    let mut seen: HashSet<(&str, CredentialId)> = HashSet::new();

    for result in results {
        for (descriptor_id, applicable) in result {
            for credential in applicable {
                let id = credential.id();
                if excluded.contains(&(descriptor_id.clone(), id.clone())) {
                    continue;
                }
                if seen.insert((descriptor_id.as_str(), id)) {
                    merged
                        .entry(descriptor_id.clone())
                        .or_default()
                        .push(credential.clone());
                }
            }
        }
    }

    merged
}

/// Order the selected credentials and map every input descriptor to the
/// positions of its credentials.
///
/// Descriptors are visited in id order; a credential shared by several
/// descriptors appears once, and each descriptor maps to that position.
/// Every applicable credential gets an entry, so a credential listed twice
/// for one descriptor is mapped twice.
pub fn merge(result: &DescriptorCredentials) -> (Vec<CredentialRecord>, Vec<DescriptorMap>) {
    let mut credentials = Vec::new();
    let mut positions: HashMap<CredentialId, usize> = HashMap::new();
    let mut descriptor_map = Vec::new();

    for (descriptor_id, applicable) in result {
        for credential in applicable {
            let position = *positions.entry(credential.id()).or_insert_with(|| {
                credentials.push(credential.clone());
                credentials.len() - 1
            });
            descriptor_map.push(DescriptorMap::ldp_vc(descriptor_id.clone(), position));
        }
    }

    descriptor_map.sort_by(|a, b| a.id.cmp(&b.id));
    (credentials, descriptor_map)
}
