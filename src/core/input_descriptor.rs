use super::{credential_format::*, filter::Filter};
use crate::utils::NonEmptyVec;

use serde::{Deserialize, Serialize};

/// A GroupId represents a unique identifier for a group of Input Descriptors.
///
/// This type is also used by the submission requirements to group input descriptors.
pub type GroupId = String;

/// A JSONPath is a string that represents a path to a specific value within a JSON object.
///
/// For syntax details, see [https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition)
pub type JsonPath = String;

/// The predicate Feature introduces properties enabling Verifier to request that Holder apply a predicate and return the result.
///
/// See: [https://identity.foundation/presentation-exchange/#predicate-feature](https://identity.foundation/presentation-exchange/#predicate-feature)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    Required,
    Preferred,
}

/// Input Descriptors are objects used to describe the information a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires of a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    group: Vec<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ClaimFormatMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<SchemaFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<Constraints>,
}

static NO_SCHEMA: SchemaFilter = SchemaFilter::Uris(Vec::new());

static NO_CONSTRAINTS: Constraints = Constraints {
    fields: Vec::new(),
    limit_disclosure: None,
    subject_is_issuer: None,
    is_holder: Vec::new(),
    statuses: None,
};

impl InputDescriptor {
    /// Create a new input descriptor with the given id and constraints.
    ///
    /// The id MUST NOT conflict with the id of another Input Descriptor Object in
    /// the same Presentation Definition.
    pub fn new(id: impl Into<String>, constraints: Constraints) -> Self {
        Self {
            id: id.into(),
            constraints: Some(constraints),
            ..Default::default()
        }
    }

    /// Return the id of the input descriptor.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Return the constraints of the input descriptor.
    pub fn constraints(&self) -> &Constraints {
        self.constraints.as_ref().unwrap_or(&NO_CONSTRAINTS)
    }

    /// Return the schema filter of the input descriptor.
    pub fn schema(&self) -> &SchemaFilter {
        self.schema.as_ref().unwrap_or(&NO_SCHEMA)
    }

    /// Set the schema filter of the input descriptor.
    pub fn set_schema(mut self, schema: SchemaFilter) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Return the groups the input descriptor belongs to.
    pub fn groups(&self) -> &[GroupId] {
        &self.group
    }

    /// Add the input descriptor to a group.
    pub fn add_to_group(mut self, member: impl Into<GroupId>) -> Self {
        self.group.push(member.into());
        self
    }

    /// Whether the input descriptor is a member of `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.group.iter().any(|g| g == group)
    }

    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the purpose for which the claim's data is being requested.
    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Return the claim formats this input may be submitted in, if restricted.
    pub fn format(&self) -> Option<&ClaimFormatMap> {
        self.format.as_ref()
    }
}

/// One schema URI accepted by an input descriptor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaUri {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl SchemaUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            required: None,
        }
    }

    /// Entries are required unless explicitly marked `"required": false`.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }
}

/// The `schema` property of an input descriptor.
///
/// Either a single group of URIs, or a `oneof_filter` of alternative groups
/// where one full group must match.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SchemaFilter {
    OneOf { oneof_filter: Vec<Vec<SchemaUri>> },
    Uris(Vec<SchemaUri>),
}

impl Default for SchemaFilter {
    fn default() -> Self {
        Self::Uris(Vec::new())
    }
}

impl SchemaFilter {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::OneOf { oneof_filter } => oneof_filter.iter().all(Vec::is_empty),
            Self::Uris(uris) => uris.is_empty(),
        }
    }

    pub fn is_one_of(&self) -> bool {
        matches!(self, Self::OneOf { .. })
    }

    /// Return the URI groups. A plain URI list is a single group.
    pub fn uri_groups(&self) -> Vec<&[SchemaUri]> {
        match self {
            Self::OneOf { oneof_filter } => oneof_filter.iter().map(Vec::as_slice).collect(),
            Self::Uris(uris) => vec![uris.as_slice()],
        }
    }

    /// Whether a credential with the given schema ids and expanded types
    /// satisfies this filter.
    ///
    /// A group matches when every required URI in it is found among the
    /// credential's schema ids or expanded types, and at least one URI matched.
    pub fn accepts(&self, schema_ids: &[String], expanded_types: &[String]) -> bool {
        if self.is_empty() {
            return true;
        }

        let known = |uri: &str| {
            schema_ids.iter().any(|s| s == uri) || expanded_types.iter().any(|t| t == uri)
        };

        self.uri_groups().into_iter().any(|group| {
            let mut any = false;
            for entry in group {
                if known(&entry.uri) {
                    any = true;
                } else if entry.is_required() {
                    return false;
                }
            }
            any
        })
    }
}

/// Constraints are objects used to describe the constraints that a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder) must satisfy to fulfill an Input Descriptor.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<ConstraintsField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_disclosure: Option<ConstraintsLimitDisclosure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_is_issuer: Option<Directive>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    is_holder: Vec<HolderSubject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statuses: Option<Statuses>,
}

impl Constraints {
    /// Returns an empty Constraints object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new field constraint to the constraints list.
    pub fn add_constraint(mut self, field: ConstraintsField) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the fields of the constraints object.
    pub fn fields(&self) -> &[ConstraintsField] {
        &self.fields
    }

    /// Set the limit disclosure value.
    ///
    /// With `required`, submitted data is limited to the entries named by the
    /// `fields` property.
    ///
    /// See [https://identity.foundation/presentation-exchange/spec/v2.0.0/#limited-disclosure-submissions](https://identity.foundation/presentation-exchange/spec/v2.0.0/#limited-disclosure-submissions)
    pub fn set_limit_disclosure(mut self, limit_disclosure: ConstraintsLimitDisclosure) -> Self {
        self.limit_disclosure = Some(limit_disclosure);
        self
    }

    pub fn limit_disclosure(&self) -> Option<&ConstraintsLimitDisclosure> {
        self.limit_disclosure.as_ref()
    }

    pub fn is_limit_disclosure_required(&self) -> bool {
        matches!(self.limit_disclosure, Some(ConstraintsLimitDisclosure::Required))
    }

    pub fn set_subject_is_issuer(mut self, directive: Directive) -> Self {
        self.subject_is_issuer = Some(directive);
        self
    }

    pub fn subject_is_issuer(&self) -> Option<&Directive> {
        self.subject_is_issuer.as_ref()
    }

    pub fn add_holder(mut self, holder: HolderSubject) -> Self {
        self.is_holder.push(holder);
        self
    }

    pub fn holders(&self) -> &[HolderSubject] {
        &self.is_holder
    }

    /// Return the `is_holder` directive naming `field_id`, the strictest one if
    /// several do.
    pub fn holder_directive(&self, field_id: &str) -> Option<&Directive> {
        self.is_holder
            .iter()
            .filter(|holder| holder.field_id.iter().any(|id| id == field_id))
            .map(|holder| &holder.directive)
            .min_by_key(|directive| match directive {
                Directive::Required => 0,
                Directive::Preferred => 1,
            })
    }

    pub fn statuses(&self) -> Option<&Statuses> {
        self.statuses.as_ref()
    }
}

/// `required` or `preferred`, as used by `subject_is_issuer` and `is_holder`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    Required,
    Preferred,
}

/// An `is_holder` entry: the fields whose subject must be the holder.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HolderSubject {
    pub field_id: Vec<String>,
    pub directive: Directive,
}

/// Credential status directives (`statuses.{active,suspended,revoked}`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Statuses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<StatusDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<StatusDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<StatusDirective>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusDirective {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive: Option<StatusDirectiveKind>,
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusDirectiveKind {
    Required,
    Allowed,
    Disallowed,
}

/// ConstraintsField objects select values from a credential and filter them.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintsField {
    path: NonEmptyVec<JsonPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicate: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent_to_retain: Option<bool>,
}

impl From<NonEmptyVec<JsonPath>> for ConstraintsField {
    fn from(path: NonEmptyVec<JsonPath>) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }
}

impl ConstraintsField {
    /// Create a new constraints field with a single path.
    pub fn new(path: impl Into<JsonPath>) -> ConstraintsField {
        NonEmptyVec::new(path.into()).into()
    }

    /// Add an alternative path.
    pub fn add_path(mut self, path: impl Into<JsonPath>) -> Self {
        self.path.push(path.into());
        self
    }

    /// Return the alternative paths of the field, tried in order.
    pub fn path(&self) -> &NonEmptyVec<JsonPath> {
        &self.path
    }

    pub fn set_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    pub fn set_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn set_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Mark the field optional: a credential lacking the value still qualifies,
    /// but a value that is present must pass the filter.
    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    pub fn set_retained(mut self, intent_to_retain: bool) -> Self {
        self.intent_to_retain = Some(intent_to_retain);
        self
    }

    pub fn intent_to_retain(&self) -> bool {
        self.intent_to_retain.unwrap_or(false)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintsLimitDisclosure {
    Required,
    Preferred,
}
