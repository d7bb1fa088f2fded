use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
};

use serde_json::{Map, Value as Json};
use serde_json_path::JsonPath;

use crate::{
    core::{
        credential::{expand_types, CredentialRecord},
        input_descriptor::{ConstraintsField, Directive, InputDescriptor},
        presentation_definition::PresentationDefinition,
        presentation_submission::{DescriptorMap, PresentationSubmission},
    },
    utils::{objects_of, strings_of},
};

use super::{
    error::{PresentationExchangeError, Result},
    field::{field_matches, located_paths, Segment},
    PresentationExchange,
};

/// Top-level properties a derived credential always keeps.
const MANDATORY_PROPERTIES: [&str; 7] = [
    "@context",
    "type",
    "issuanceDate",
    "issuer",
    "proof",
    "credentialSubject",
    "id",
];

/// Properties nested objects always keep.
const MANDATORY_NESTED_PROPERTIES: [&str; 2] = ["id", "type"];

fn rejected(reason: impl Into<String>) -> PresentationExchangeError {
    PresentationExchangeError::Verification(reason.into())
}

impl PresentationExchange {
    /// Check that a received presentation answers `definition`.
    ///
    /// Every descriptor map entry must point at credentials that satisfy the
    /// schema and constraints of its input descriptor. Fields bound to the
    /// holder require the credential subjects to be the presentation's holder
    /// or its prover. Credentials presented
    /// under limited disclosure may only carry the mandatory properties and
    /// the requested ones. Without submission requirements, every input
    /// descriptor must be answered.
    pub async fn verify_received_presentation(
        &self,
        definition: &PresentationDefinition,
        presentation: &Json,
    ) -> Result<()> {
        self.verify(definition, presentation)
            .await
            .map_err(|error| error.in_definition(definition.id()))
    }

    async fn verify(&self, definition: &PresentationDefinition, presentation: &Json) -> Result<()> {
        let submission = presentation
            .get("presentation_submission")
            .ok_or_else(|| rejected("the presentation has no presentation_submission"))?;
        let submission: PresentationSubmission = serde_json::from_value(submission.clone())
            .map_err(|error| rejected(format!("invalid presentation_submission: {error}")))?;

        if submission.definition_id() != definition.id() {
            return Err(rejected(format!(
                "the submission answers definition `{}`",
                submission.definition_id()
            )));
        }

        let holders = holder_dids(presentation);
        let descriptors = definition.input_descriptors_map();
        for entry in submission.descriptor_map() {
            let descriptor = descriptors.get(entry.id()).ok_or_else(|| {
                rejected(format!("descriptor map entry `{}` names no input descriptor", entry.id()))
            })?;

            for credential in resolve_entry(entry, presentation)? {
                self.verify_credential(descriptor, credential, &holders).await?;
            }
        }

        if definition.submission_requirements().is_none() {
            let answered: HashSet<&str> = submission.descriptor_map().iter().map(DescriptorMap::id).collect();
            if let Some(missing) = definition
                .input_descriptors()
                .iter()
                .find(|descriptor| !answered.contains(descriptor.id()))
            {
                return Err(rejected(format!(
                    "input descriptor `{}` is not answered",
                    missing.id()
                )));
            }
        }

        tracing::debug!(definition = %definition.id(), "presentation verified");
        Ok(())
    }

    async fn verify_credential(
        &self,
        descriptor: &InputDescriptor,
        credential: &Json,
        holders: &HashSet<String>,
    ) -> Result<()> {
        let mut record = CredentialRecord::index(credential.clone(), None);
        if !descriptor.schema().is_empty() {
            let types = strings_of(credential.get("type"));
            record.expanded_types =
                expand_types(credential.get("@context"), &types, self.loader.as_ref()).await;
        }

        if !descriptor
            .schema()
            .accepts(&record.schema_ids, &record.expanded_types)
        {
            return Err(rejected(format!(
                "credential for `{}` does not have an accepted schema or type",
                descriptor.id()
            )));
        }

        let constraints = descriptor.constraints();
        if constraints.subject_is_issuer() == Some(&Directive::Required)
            && !record
                .issuer_id
                .as_ref()
                .is_some_and(|issuer| record.subject_ids.contains(issuer))
        {
            return Err(rejected(format!(
                "credential for `{}` is not issued by its subject",
                descriptor.id()
            )));
        }

        let limited = constraints.is_limit_disclosure_required();
        let mut requested = Vec::new();
        for field in constraints.fields() {
            let field = if limited {
                with_compacted_paths(field)
            } else {
                Cow::Borrowed(field)
            };

            if !field_matches(&field, credential)? {
                return Err(rejected(format!(
                    "credential for `{}` does not satisfy field {:?}",
                    descriptor.id(),
                    field.path().first()
                )));
            }

            let bound = field
                .id()
                .and_then(|id| constraints.holder_directive(id))
                .is_some();
            if bound
                && (record.subject_ids.is_empty()
                    || !record.subject_ids.iter().all(|subject| holders.contains(subject)))
            {
                return Err(rejected(format!(
                    "credential for `{}` is not about the presentation holder",
                    descriptor.id()
                )));
            }

            if limited {
                for path in field.path().iter() {
                    requested.extend(located_paths(path, credential)?);
                }
            }
        }

        if limited {
            check_disclosure(credential, &requested)
                .map_err(|reason| rejected(format!("credential for `{}`: {reason}", descriptor.id())))?;
        }

        Ok(())
    }
}

/// The DIDs a presentation speaks for: its `holder` and the controllers of
/// its proof verification methods.
fn holder_dids(presentation: &Json) -> HashSet<String> {
    let holder = match presentation.get("holder") {
        Some(Json::Object(holder)) => holder.get("id").and_then(Json::as_str),
        Some(holder) => holder.as_str(),
        None => None,
    };
    let provers = objects_of(presentation.get("proof"))
        .into_iter()
        .filter_map(|proof| proof.get("verificationMethod").and_then(Json::as_str))
        .map(|method| method.split('#').next().unwrap_or(method));

    holder
        .into_iter()
        .chain(provers)
        .map(ToOwned::to_owned)
        .collect()
}

/// The values a descriptor map entry points at, following `path_nested`.
fn resolve_entry<'a>(entry: &DescriptorMap, root: &'a Json) -> Result<Vec<&'a Json>> {
    let path = JsonPath::parse(entry.path())
        .map_err(|error| PresentationExchangeError::invalid_path(entry.path(), error))?;

    let nodes = path.query(root).all();
    if nodes.is_empty() {
        return Err(rejected(format!(
            "`{}` of descriptor map entry `{}` selects nothing",
            entry.path(),
            entry.id()
        )));
    }

    match &entry.path_nested {
        None => Ok(nodes),
        Some(nested) => {
            let mut resolved = Vec::new();
            for node in nodes {
                resolved.extend(resolve_entry(nested, node)?);
            }
            Ok(resolved)
        }
    }
}

/// Derived credentials compact single-element arrays into objects, so
/// `credentialSubject[0].name` may have become `credentialSubject.name`.
fn with_compacted_paths(field: &ConstraintsField) -> Cow<'_, ConstraintsField> {
    let compacted: Vec<String> = field
        .path()
        .iter()
        .filter(|path| path.contains("[0]"))
        .map(|path| path.replace("[0]", ""))
        .collect();

    if compacted.is_empty() {
        return Cow::Borrowed(field);
    }
    Cow::Owned(
        compacted
            .into_iter()
            .fold(field.clone(), |field, path| field.add_path(path)),
    )
}

/// Check that `credential` discloses nothing beyond the mandatory properties
/// and the `requested` locations with their parents.
fn check_disclosure(credential: &Json, requested: &[Vec<Segment>]) -> Result<(), String> {
    let mut allowed: HashMap<Vec<&str>, HashSet<&str>> = HashMap::new();
    allowed.insert(Vec::new(), MANDATORY_PROPERTIES.into_iter().collect());
    allowed.insert(vec!["credentialSubject"], HashSet::new());

    let mut disclosed_whole = HashSet::new();
    for location in requested {
        let keys: Vec<&str> = location
            .iter()
            .filter_map(|segment| match segment {
                Segment::Key(key) => Some(key.as_str()),
                Segment::Index(_) => None,
            })
            .collect();
        for depth in 0..keys.len() {
            allowed
                .entry(keys[..depth].to_vec())
                .or_default()
                .insert(keys[depth]);
        }
        disclosed_whole.insert(keys);
    }

    for (parent, keys) in &allowed {
        if !parent.is_empty() && disclosed_whole.contains(parent) {
            continue;
        }
        for object in objects_at(credential, parent) {
            for key in object.keys() {
                let nested_mandatory =
                    !parent.is_empty() && MANDATORY_NESTED_PROPERTIES.contains(&key.as_str());
                if !keys.contains(key.as_str()) && !nested_mandatory {
                    let mut property = parent.join(".");
                    if !property.is_empty() {
                        property.push('.');
                    }
                    property.push_str(key);
                    return Err(format!("`{property}` is disclosed but was not requested"));
                }
            }
        }
    }

    Ok(())
}

/// The objects found at `keys`, looking through arrays.
fn objects_at<'a>(value: &'a Json, keys: &[&str]) -> Vec<&'a Map<String, Json>> {
    match value {
        Json::Array(items) => items.iter().flat_map(|item| objects_at(item, keys)).collect(),
        Json::Object(object) => match keys.split_first() {
            None => vec![object],
            Some((key, rest)) => object
                .get(*key)
                .map(|value| objects_at(value, rest))
                .unwrap_or_default(),
        },
        _ => Vec::new(),
    }
}
