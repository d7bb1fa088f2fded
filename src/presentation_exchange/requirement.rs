//! Compiling submission requirements into a requirement tree.

use crate::core::{
    input_descriptor::InputDescriptor,
    presentation_definition::{SubmissionRequirement, SubmissionRequirementRule},
};

use super::error::{PresentationExchangeError, Result};

/// How many members of a requirement must be satisfied. Unset bounds do not
/// constrain; an explicit zero does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quota {
    pub count: Option<usize>,
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Quota {
    pub fn exactly(count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }

    /// Whether `n` satisfied members meet every set bound.
    pub fn admits(&self, n: usize) -> bool {
        self.count.map_or(true, |count| n == count)
            && self.min.map_or(true, |min| n >= min)
            && self.max.map_or(true, |max| n <= max)
    }
}

/// A node of the requirement tree: either a group of input descriptors or a
/// group of nested requirements.
#[derive(Clone, Debug, PartialEq)]
pub enum Requirement<'a> {
    Leaf {
        quota: Quota,
        descriptors: Vec<&'a InputDescriptor>,
    },
    Group {
        quota: Quota,
        children: Vec<Requirement<'a>>,
    },
}

impl Requirement<'_> {
    pub fn quota(&self) -> &Quota {
        match self {
            Self::Leaf { quota, .. } | Self::Group { quota, .. } => quota,
        }
    }
}

/// Compile the submission requirements of a definition.
///
/// Without submission requirements every input descriptor is required.
pub fn make_requirement<'a>(
    submission_requirements: Option<&[SubmissionRequirement]>,
    descriptors: &'a [InputDescriptor],
) -> Result<Requirement<'a>> {
    match submission_requirements {
        None | Some([]) => Ok(Requirement::Leaf {
            quota: Quota::exactly(descriptors.len()),
            descriptors: descriptors.iter().collect(),
        }),
        Some(requirements) => {
            let children = requirements
                .iter()
                .map(|requirement| to_requirement(requirement, descriptors))
                .collect::<Result<Vec<_>>>()?;
            Ok(Requirement::Group {
                quota: Quota::exactly(children.len()),
                children,
            })
        }
    }
}

fn to_requirement<'a>(
    requirement: &SubmissionRequirement,
    descriptors: &'a [InputDescriptor],
) -> Result<Requirement<'a>> {
    let label = requirement.name.as_deref().unwrap_or("unnamed");
    let quota = |members: usize| Quota {
        count: match requirement.rule {
            SubmissionRequirementRule::All => Some(members),
            SubmissionRequirementRule::Pick => requirement.count,
        },
        min: requirement.min,
        max: requirement.max,
    };

    match (&requirement.from, &requirement.from_nested) {
        (Some(group), None) => {
            let members: Vec<_> = descriptors
                .iter()
                .filter(|descriptor| descriptor.in_group(group))
                .collect();
            if members.is_empty() {
                return Err(PresentationExchangeError::Definition(format!(
                    "submission requirement `{label}` selects group `{group}`, which has no input descriptors"
                )));
            }
            Ok(Requirement::Leaf {
                quota: quota(members.len()),
                descriptors: members,
            })
        }
        (None, Some(nested)) => {
            let children = nested
                .iter()
                .map(|requirement| to_requirement(requirement, descriptors))
                .collect::<Result<Vec<_>>>()?;
            Ok(Requirement::Group {
                quota: quota(children.len()),
                children,
            })
        }
        (Some(_), Some(_)) => Err(PresentationExchangeError::Definition(format!(
            "submission requirement `{label}` has both `from` and `from_nested`"
        ))),
        (None, None) => Err(PresentationExchangeError::Definition(format!(
            "submission requirement `{label}` has neither `from` nor `from_nested`"
        ))),
    }
}
