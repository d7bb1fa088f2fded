use super::credential_format::*;
use super::input_descriptor::*;

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A presentation definition is a JSON object that describes the information a [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires of a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// Presentation Definitions are composed of inputs, which describe the forms and details of the
/// proofs they require, and optional sets of selection rules, to allow [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder)s flexibility
/// in cases where different types of proofs may satisfy an input requirement.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ClaimFormatMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_requirements: Option<Vec<SubmissionRequirement>>,
    input_descriptors: Vec<InputDescriptor>,
}

impl PresentationDefinition {
    /// The Presentation Definition MUST contain an id property and an
    /// input_descriptors property.
    pub fn new(id: impl Into<String>, input_descriptor: InputDescriptor) -> Self {
        Self {
            id: id.into(),
            input_descriptors: vec![input_descriptor],
            ..Default::default()
        }
    }

    /// Return the id of the presentation definition.
    pub fn id(&self) -> &String {
        &self.id
    }

    /// Add a new input descriptor to the presentation definition.
    pub fn add_input_descriptors(mut self, input_descriptor: InputDescriptor) -> Self {
        self.input_descriptors.push(input_descriptor);
        self
    }

    /// Return the input descriptors of the presentation definition.
    pub fn input_descriptors(&self) -> &[InputDescriptor] {
        &self.input_descriptors
    }

    /// Return the input descriptors keyed by id.
    pub fn input_descriptors_map(&self) -> HashMap<&str, &InputDescriptor> {
        self.input_descriptors
            .iter()
            .map(|descriptor| (descriptor.id(), descriptor))
            .collect()
    }

    /// Add a submission requirement.
    pub fn add_submission_requirement(mut self, requirement: SubmissionRequirement) -> Self {
        self.submission_requirements
            .get_or_insert_with(Vec::new)
            .push(requirement);
        self
    }

    /// Return the submission requirements, if any were given.
    pub fn submission_requirements(&self) -> Option<&[SubmissionRequirement]> {
        self.submission_requirements.as_deref()
    }

    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Add a claim format the verifier can process.
    pub fn add_format(mut self, format: ClaimFormatDesignation, value: ClaimFormatPayload) -> Self {
        self.format
            .get_or_insert_with(HashMap::new)
            .insert(format, value);
        self
    }

    pub fn format(&self) -> Option<&ClaimFormatMap> {
        self.format.as_ref()
    }

    /// Check the structural rules serde cannot express: input descriptor ids
    /// are unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for descriptor in &self.input_descriptors {
            if !seen.insert(descriptor.id()) {
                bail!("duplicate input descriptor id `{}`", descriptor.id())
            }
        }
        Ok(())
    }
}

/// Selection rule of a submission requirement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionRequirementRule {
    All,
    Pick,
}

/// A submission requirement groups input descriptors (`from`) or other
/// submission requirements (`from_nested`) under an `all` or `pick` rule.
///
/// Exactly one of `from` and `from_nested` must be set; this is checked when
/// the requirement is compiled, so that malformed definitions are reported as
/// definition errors rather than parse failures.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirements](https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirements)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionRequirement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub rule: SubmissionRequirementRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_nested: Option<Vec<SubmissionRequirement>>,
}

impl SubmissionRequirement {
    /// `all` of the input descriptors of `group`.
    pub fn all_from(group: impl Into<GroupId>) -> Self {
        Self::new(SubmissionRequirementRule::All).set_from(group)
    }

    /// `pick` `count` input descriptors of `group`.
    pub fn pick_from(group: impl Into<GroupId>, count: usize) -> Self {
        let mut requirement = Self::new(SubmissionRequirementRule::Pick).set_from(group);
        requirement.count = Some(count);
        requirement
    }

    pub fn new(rule: SubmissionRequirementRule) -> Self {
        Self {
            name: None,
            purpose: None,
            rule,
            count: None,
            min: None,
            max: None,
            from: None,
            from_nested: None,
        }
    }

    pub fn set_from(mut self, group: impl Into<GroupId>) -> Self {
        self.from = Some(group.into());
        self
    }

    pub fn set_from_nested(mut self, nested: Vec<SubmissionRequirement>) -> Self {
        self.from_nested = Some(nested);
        self
    }

    pub fn set_min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    pub fn set_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}
