//! Typed filter predicates attached to constraints fields.
//!
//! A [Filter] is the JSON Schema subset used by Presentation Exchange constraints
//! (`type`, `format`, `pattern`, `minimum`, `maximum`, `exclusiveMinimum`,
//! `exclusiveMaximum`, `minLength`, `maxLength`, `const`, `enum` and `not`).
//! The keyword that drives evaluation is resolved once, at deserialization, into
//! a [PredicateKind]. The raw object is kept so a filter serializes back to
//! exactly what was received.

use std::{fmt, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};

/// The declared `type` of a filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Other(String),
}

impl From<&str> for FilterType {
    fn from(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl FilterType {
    fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

/// The declared `format` of a filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterFormat {
    Date,
    DateTime,
    Other(String),
}

impl From<&str> for FilterFormat {
    fn from(name: &str) -> Self {
        match name {
            "date" => Self::Date,
            "date-time" => Self::DateTime,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Which side of a range comparison a limit sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    ExclusiveMaximum,
    ExclusiveMinimum,
    Minimum,
    Maximum,
}

impl Bound {
    const KEYWORDS: [(&'static str, Bound); 4] = [
        ("exclusiveMaximum", Bound::ExclusiveMaximum),
        ("exclusiveMinimum", Bound::ExclusiveMinimum),
        ("minimum", Bound::Minimum),
        ("maximum", Bound::Maximum),
    ];

    fn holds<T: PartialOrd>(self, value: T, limit: T) -> bool {
        match self {
            Bound::ExclusiveMaximum => value < limit,
            Bound::ExclusiveMinimum => value > limit,
            Bound::Minimum => value >= limit,
            Bound::Maximum => value <= limit,
        }
    }
}

/// A `pattern` keyword, compiled when its filter is parsed.
///
/// A pattern that does not compile is kept so the filter still round-trips,
/// but it matches nothing.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    compiled: Option<Arc<JSONSchema>>,
}

impl Pattern {
    fn compile(source: String) -> Self {
        let schema = json!({ "pattern": source });
        let compiled = match JSONSchema::compile(&schema) {
            Ok(compiled) => Some(Arc::new(compiled)),
            Err(error) => {
                tracing::debug!("pattern `{source}` does not compile: {error}");
                None
            }
        };
        Self { source, compiled }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn matches(&self, value: &Json) -> Result<bool, FilterError> {
        if !value.is_string() {
            return Err(FilterError::NotAString(value.to_string()));
        }
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| FilterError::InvalidPattern(self.source.clone()))?;
        Ok(compiled.is_valid(value))
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

/// The single constraint that drives evaluation of a [Filter].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PredicateKind {
    /// Only `type` and/or `format` were given.
    TypeOnly,
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    Pattern(Pattern),
    Enum(Vec<Json>),
    Const(Json),
    Range {
        bound: Bound,
        limit: Json,
    },
    /// Keywords are present, but none the declared type can evaluate.
    Unsatisfiable,
}

impl PredicateKind {
    /// Resolve the driving keyword, following the priority order of each declared type.
    fn resolve(
        value_type: Option<&FilterType>,
        format: Option<&FilterFormat>,
        keywords: &Map<String, Json>,
    ) -> Result<Self> {
        let length = |key: &str| -> Result<Option<usize>> {
            keywords
                .get(key)
                .map(|v| {
                    v.as_u64()
                        .map(|n| n as usize)
                        .with_context(|| format!("`{key}` must be a non-negative integer"))
                })
                .transpose()
        };
        let min_length = length("minLength")?;
        let max_length = length("maxLength")?;

        let pattern = match keywords.get("pattern") {
            Some(Json::String(pattern)) => Some(pattern.clone()),
            Some(_) => bail!("`pattern` must be a string"),
            None => None,
        };

        let enumeration = match keywords.get("enum") {
            Some(Json::Array(values)) => Some(values.clone()),
            Some(_) => bail!("`enum` must be an array"),
            None => None,
        };

        let constant = keywords.get("const").cloned();

        let range = Bound::KEYWORDS.iter().find_map(|(key, bound)| {
            keywords.get(*key).map(|limit| PredicateKind::Range {
                bound: *bound,
                limit: limit.clone(),
            })
        });

        let constrained = min_length.is_some()
            || max_length.is_some()
            || pattern.is_some()
            || enumeration.is_some()
            || constant.is_some()
            || range.is_some();
        if !constrained {
            return Ok(Self::TypeOnly);
        }

        let kind = match value_type {
            Some(FilterType::String) => {
                if min_length.is_some() || max_length.is_some() {
                    Some(Self::Length {
                        min: min_length,
                        max: max_length,
                    })
                } else if let Some(pattern) = pattern {
                    Some(Self::Pattern(Pattern::compile(pattern)))
                } else if let Some(values) = enumeration {
                    Some(Self::Enum(values))
                } else if let Some(range) = range.filter(|_| format.is_some()) {
                    Some(range)
                } else {
                    constant.map(Self::Const)
                }
            }
            Some(t) if t.is_numeric() => range
                .or(constant.map(Self::Const))
                .or(enumeration.map(Self::Enum)),
            _ => enumeration
                .map(Self::Enum)
                .or(constant.map(Self::Const))
                .or(range),
        };

        Ok(kind.unwrap_or(Self::Unsatisfiable))
    }
}

/// Reasons a value cannot be evaluated against a filter.
///
/// These never leave the evaluator: the value is treated as non-matching.
#[derive(Debug, thiserror::Error)]
enum FilterError {
    #[error("value `{0}` cannot be coerced to a number")]
    NotANumber(String),

    #[error("value `{0}` is not a string")]
    NotAString(String),

    #[error("value `{0}` is not a valid date")]
    InvalidDate(String),

    #[error("pattern `{0}` does not compile")]
    InvalidPattern(String),
}

/// A filter applied to the values selected by a constraints field path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct Filter {
    value_type: Option<FilterType>,
    format: Option<FilterFormat>,
    kind: PredicateKind,
    negate: bool,
    raw: Map<String, Json>,
}

impl TryFrom<Json> for Filter {
    type Error = anyhow::Error;

    fn try_from(value: Json) -> Result<Self> {
        let Json::Object(raw) = value else {
            bail!("filter must be a JSON object")
        };

        // The keywords nested under `not` are evaluated in place of the outer
        // ones, and the outcome is inverted.
        let (keywords, negate) = match raw.get("not") {
            Some(Json::Object(inner)) => {
                let mut keywords = raw.clone();
                keywords.remove("not");
                keywords.extend(inner.clone());
                (keywords, true)
            }
            Some(_) => bail!("`not` must be a filter object"),
            None => (raw.clone(), false),
        };

        let value_type = match keywords.get("type") {
            Some(Json::String(name)) => Some(FilterType::from(name.as_str())),
            Some(_) => bail!("`type` must be a string"),
            None => None,
        };

        let format = match keywords.get("format") {
            Some(Json::String(name)) => Some(FilterFormat::from(name.as_str())),
            Some(_) => bail!("`format` must be a string"),
            None => None,
        };

        let kind = PredicateKind::resolve(value_type.as_ref(), format.as_ref(), &keywords)?;

        Ok(Self {
            value_type,
            format,
            kind,
            negate,
            raw,
        })
    }
}

impl From<Filter> for Json {
    fn from(filter: Filter) -> Self {
        Json::Object(filter.raw)
    }
}

impl Filter {
    /// Return the declared `type`, if any.
    pub fn value_type(&self) -> Option<&FilterType> {
        self.value_type.as_ref()
    }

    /// Return the declared `format`, if any.
    pub fn format(&self) -> Option<&FilterFormat> {
        self.format.as_ref()
    }

    /// Return the resolved predicate.
    pub fn kind(&self) -> &PredicateKind {
        &self.kind
    }

    /// Whether the filter is wrapped in `not`.
    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// Return the filter exactly as it was received.
    pub fn raw(&self) -> &Map<String, Json> {
        &self.raw
    }

    /// Evaluate the filter against a single value.
    ///
    /// A value that cannot be evaluated (e.g. a non-numeric string under a
    /// numeric range) never matches, whether or not the filter is negated.
    pub fn matches(&self, value: &Json) -> bool {
        match self.evaluate(value) {
            Ok(result) => result != self.negate,
            Err(error) => {
                tracing::debug!("filter not applicable to value: {error}");
                false
            }
        }
    }

    fn evaluate(&self, value: &Json) -> Result<bool, FilterError> {
        match &self.kind {
            PredicateKind::TypeOnly => self.type_matches(value),
            PredicateKind::Length { min, max } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| FilterError::NotAString(value.to_string()))?;
                let len = s.chars().count();
                Ok(min.map_or(true, |min| len >= min) && max.map_or(true, |max| len <= max))
            }
            PredicateKind::Pattern(pattern) => match value {
                Json::Array(items) => {
                    for item in items.iter().filter(|item| item.is_string()) {
                        if pattern.matches(item)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                _ => pattern.matches(value),
            },
            PredicateKind::Enum(values) => {
                for candidate in values {
                    if self.equals(value, candidate)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            PredicateKind::Const(constant) => self.equals(value, constant),
            PredicateKind::Range { bound, limit } => self.compare(value, *bound, limit),
            PredicateKind::Unsatisfiable => Ok(false),
        }
    }

    fn type_matches(&self, value: &Json) -> Result<bool, FilterError> {
        let type_ok = match &self.value_type {
            None | Some(FilterType::Other(_)) => true,
            Some(FilterType::String) => value.is_string(),
            Some(FilterType::Number) => value.is_number(),
            Some(FilterType::Integer) => value.is_i64() || value.is_u64(),
            Some(FilterType::Boolean) => value.is_boolean(),
            Some(FilterType::Array) => value.is_array(),
            Some(FilterType::Object) => value.is_object(),
        };
        if !type_ok {
            return Ok(false);
        }

        match &self.format {
            Some(FilterFormat::Date | FilterFormat::DateTime) => {
                let s = value
                    .as_str()
                    .ok_or_else(|| FilterError::NotAString(value.to_string()))?;
                Ok(parse_datetime(s).is_some())
            }
            _ => Ok(true),
        }
    }

    fn equals(&self, value: &Json, expected: &Json) -> Result<bool, FilterError> {
        if self.value_type.as_ref().is_some_and(FilterType::is_numeric) {
            return Ok(to_number(value)? == to_number(expected)?);
        }
        Ok(value == expected)
    }

    fn compare(&self, value: &Json, bound: Bound, limit: &Json) -> Result<bool, FilterError> {
        let numeric = self.value_type.as_ref().is_some_and(FilterType::is_numeric)
            || self.format.is_none();

        if numeric {
            Ok(bound.holds(to_number(value)?, to_number(limit)?))
        } else {
            Ok(bound.holds(to_datetime(value)?, to_datetime(limit)?))
        }
    }
}

fn to_number(value: &Json) -> Result<f64, FilterError> {
    match value {
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| FilterError::NotANumber(n.to_string())),
        Json::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(|i| i as f64)
                .or_else(|_| s.parse::<f64>())
                .map_err(|_| FilterError::NotANumber(s.to_owned()))
        }
        other => Err(FilterError::NotANumber(other.to_string())),
    }
}

fn to_datetime(value: &Json) -> Result<DateTime<Utc>, FilterError> {
    let s = value
        .as_str()
        .ok_or_else(|| FilterError::NotAString(value.to_string()))?;
    parse_datetime(s).ok_or_else(|| FilterError::InvalidDate(s.to_owned()))
}

/// Parse an ISO-8601 date or date-time.
///
/// A trailing IANA zone name appended without separator
/// (`2021-05-01T10:00:00Europe/Paris`) is tolerated and dropped; values
/// without an explicit offset are read as UTC.
pub(crate) fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let input = strip_zone_name(input.trim());

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn strip_zone_name(input: &str) -> &str {
    let head = input.trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '_');
    if input[head.len()..].contains('/') {
        head
    } else {
        input
    }
}
