//! Building the JSON-LD frame that drives selective disclosure.

use serde_json::{json, Map, Value as Json};

use crate::core::input_descriptor::Constraints;

use super::{
    error::Result,
    field::{located_paths, Segment},
};

/// A step of a disclosure path. `item` means the property holds an array
/// and the path continues into its first element.
struct Step {
    key: String,
    item: bool,
}

/// Build the frame revealing, in `credential`, the properties the constraints
/// fields select along with the properties every derived credential keeps.
///
/// Every object on the way to a disclosed property is `@explicit` and
/// `@requireAll`. Array positions all collapse to the first element.
pub fn reveal_document(credential: &Json, constraints: &Constraints) -> Result<Json> {
    let mut frame = Map::new();
    for key in ["@context", "type"] {
        if let Some(value) = credential.get(key) {
            frame.insert(key.to_owned(), value.clone());
        }
    }
    frame.insert("@explicit".into(), Json::Bool(true));
    frame.insert("@requireAll".into(), Json::Bool(true));
    frame.insert("issuanceDate".into(), json!({}));
    frame.insert("issuer".into(), json!({}));

    for field in constraints.fields() {
        for path in field.path().iter() {
            for location in located_paths(path, credential)? {
                disclose(&mut frame, &steps(&location));
            }
        }
    }

    let subject = credential.get("credentialSubject");
    match frame.get_mut("credentialSubject") {
        Some(framed) => propagate_subject_type(framed, subject),
        None => {
            let empty = match subject {
                Some(Json::Array(_)) => json!([]),
                _ => json!({}),
            };
            frame.insert("credentialSubject".into(), empty);
        }
    }

    Ok(Json::Object(frame))
}

fn steps(location: &[Segment]) -> Vec<Step> {
    let mut steps: Vec<Step> = Vec::new();
    for segment in location {
        match segment {
            Segment::Key(key) => steps.push(Step {
                key: key.clone(),
                item: false,
            }),
            Segment::Index(_) => {
                if let Some(last) = steps.last_mut() {
                    last.item = true;
                }
            }
        }
    }
    steps
}

fn disclose(target: &mut Map<String, Json>, steps: &[Step]) {
    let Some((step, rest)) = steps.split_first() else {
        return;
    };

    let slot = target.entry(step.key.clone()).or_insert_with(|| json!({}));
    if rest.is_empty() {
        return;
    }

    if step.item && !matches!(slot, Json::Array(items) if !items.is_empty()) {
        *slot = json!([{}]);
    }

    let next = match slot {
        Json::Array(items) => items.first_mut(),
        other => Some(other),
    };
    let Some(next) = next else {
        return;
    };
    if !next.is_object() {
        *next = json!({});
    }

    if let Json::Object(object) = next {
        object.insert("@explicit".into(), Json::Bool(true));
        object.insert("@requireAll".into(), Json::Bool(true));
        disclose(object, rest);
    }
}

/// The subject `type` is always revealed when the credential has one.
fn propagate_subject_type(framed: &mut Json, subject: Option<&Json>) {
    let subject = match subject {
        Some(Json::Array(subjects)) => subjects.first(),
        other => other,
    };
    let Some(subject_type) = subject.and_then(|subject| subject.get("type")) else {
        return;
    };

    let framed = match framed {
        Json::Array(items) => items.first_mut(),
        other => Some(other),
    };
    if let Some(Json::Object(framed)) = framed {
        framed.insert("type".into(), subject_type.clone());
    }
}
