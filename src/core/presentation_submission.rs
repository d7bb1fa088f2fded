use std::collections::HashMap;

use super::credential_format::*;
use serde::{Deserialize, Serialize};

/// A DescriptorMapId is the id of the input descriptor a [DescriptorMap] entry answers.
pub type DescriptorMapId = String;

/// Presentation Submissions are objects embedded within target
/// [Claim](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:claim) negotiation
/// formats that express how the inputs presented as proofs to a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) are
/// provided in accordance with the requirements specified in a presentation definition.
///
/// Embedded Presentation Submission objects MUST be located within target data format as
/// the value of a `presentation_submission` property.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    id: String,
    definition_id: String,
    descriptor_map: Vec<DescriptorMap>,
}

impl PresentationSubmission {
    /// The presentation submission MUST contain an id property, the
    /// `definition_id` of the presentation definition it answers, and a
    /// `descriptor_map`.
    pub fn new(
        id: impl Into<String>,
        definition_id: impl Into<String>,
        descriptor_map: Vec<DescriptorMap>,
    ) -> Self {
        Self {
            id: id.into(),
            definition_id: definition_id.into(),
            descriptor_map,
        }
    }

    /// Create a submission with a fresh random id.
    pub fn with_random_id(definition_id: impl Into<String>, descriptor_map: Vec<DescriptorMap>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), definition_id, descriptor_map)
    }

    pub fn id(&self) -> &String {
        &self.id
    }

    pub fn definition_id(&self) -> &String {
        &self.definition_id
    }

    pub fn descriptor_map(&self) -> &[DescriptorMap] {
        &self.descriptor_map
    }

    /// Returns the descriptor map entries grouped by input descriptor id.
    ///
    /// An input descriptor answered by several credentials has several entries.
    pub fn descriptor_map_by_id(&self) -> HashMap<&str, Vec<&DescriptorMap>> {
        let mut map: HashMap<&str, Vec<&DescriptorMap>> = HashMap::new();
        for entry in &self.descriptor_map {
            map.entry(entry.id.as_str()).or_default().push(entry);
        }
        map
    }
}

/// Descriptor Maps locate, within the presentation, the claim submitted for an input descriptor.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorMap {
    pub id: DescriptorMapId,
    pub format: ClaimFormatDesignation,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<DescriptorMap>>,
}

impl DescriptorMap {
    pub fn new(
        id: impl Into<DescriptorMapId>,
        format: impl Into<ClaimFormatDesignation>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            format: format.into(),
            path: path.into(),
            path_nested: None,
        }
    }

    /// An `ldp_vc` entry pointing at `verifiableCredential[position]`.
    pub fn ldp_vc(id: impl Into<DescriptorMapId>, position: usize) -> Self {
        Self::new(
            id,
            ClaimFormatDesignation::LdpVc,
            format!("$.verifiableCredential[{position}]"),
        )
    }

    /// Set the nested path of the descriptor map.
    ///
    /// The `id` property MUST be the same for each level of nesting.
    pub fn set_path_nested(mut self, mut path_nested: DescriptorMap) -> Self {
        path_nested.id.clone_from(&self.id);
        self.path_nested = Some(Box::new(path_nested));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
