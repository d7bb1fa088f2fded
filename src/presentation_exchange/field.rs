//! Matching constraints fields against credential documents.

use std::borrow::Cow;

use serde_json::{Number, Value as Json};
use serde_json_path::{JsonPath, PathElement};

use crate::core::{filter::parse_datetime, input_descriptor::ConstraintsField};

use super::error::{PresentationExchangeError, Result};

/// One step of a normalized path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Segment {
    Key(String),
    Index(usize),
}

fn is_proof_path(path: &str) -> bool {
    let path = path.trim();
    ["$.proof.", "$.proof[", "$['proof']", "$[\"proof\"]"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Parse a field path, rejecting paths into the credential proof.
pub(crate) fn compile_path(path: &str) -> Result<JsonPath> {
    if is_proof_path(path) {
        return Err(PresentationExchangeError::ProofPathNotFilterable(path.to_owned()));
    }
    JsonPath::parse(path).map_err(|error| PresentationExchangeError::invalid_path(path, error))
}

/// Whether `credential` satisfies `field`.
///
/// Paths are alternatives: the first path selecting a value that passes the
/// filter decides. A field without filter only needs one path to select
/// something. An optional field that selects nothing is satisfied.
pub fn field_matches(field: &ConstraintsField, credential: &Json) -> Result<bool> {
    let mut found = false;

    for path in field.path().iter() {
        let nodes = compile_path(path)?.query(credential).all();
        if nodes.is_empty() {
            continue;
        }
        found = true;

        let Some(filter) = field.filter() else {
            return Ok(true);
        };

        if nodes
            .into_iter()
            .any(|node| filter.matches(&unwrap_typed_literal(node)))
        {
            return Ok(true);
        }
    }

    Ok(!found && field.is_optional())
}

/// The normalized locations `path` selects in `credential`.
pub(crate) fn located_paths(path: &str, credential: &Json) -> Result<Vec<Vec<Segment>>> {
    let located = compile_path(path)?
        .query_located(credential)
        .into_iter()
        .map(|node| {
            node.location()
                .iter()
                .map(|element| match element {
                    PathElement::Name(name) => Segment::Key(name.to_string()),
                    PathElement::Index(index) => Segment::Index(*index),
                })
                .collect()
        })
        .collect();
    Ok(located)
}

/// Replace a JSON-LD value object (`{"type": <datatype>, "@value": ..}`) by
/// its value, converted according to the datatype.
fn unwrap_typed_literal(node: &Json) -> Cow<'_, Json> {
    let Json::Object(object) = node else {
        return Cow::Borrowed(node);
    };
    let (Some(Json::String(datatype)), Some(value)) = (object.get("type"), object.get("@value"))
    else {
        return Cow::Borrowed(node);
    };

    let converted = if datatype.contains("integer") {
        match value {
            Json::String(s) => s.trim().parse::<i64>().ok().map(Json::from),
            Json::Number(n) => n.as_i64().map(Json::from),
            _ => None,
        }
    } else if datatype.contains("dateTime") || datatype.contains("date") {
        value
            .as_str()
            .and_then(parse_datetime)
            .map(|datetime| Json::String(datetime.to_rfc3339()))
    } else if datatype.contains("boolean") {
        match value {
            Json::Bool(b) => Some(Json::Bool(*b)),
            Json::String(s) => s.parse::<bool>().ok().map(Json::Bool),
            _ => None,
        }
    } else if datatype.contains("double") || datatype.contains("decimal") {
        match value {
            Json::String(s) => s.trim().parse::<f64>().ok(),
            Json::Number(n) => n.as_f64(),
            _ => None,
        }
        .and_then(Number::from_f64)
        .map(Json::Number)
    } else {
        None
    };

    Cow::Owned(converted.unwrap_or_else(|| value.clone()))
}
