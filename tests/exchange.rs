use std::collections::HashMap;

use didcomm_pres_exch::{
    config::PresentationExchangeConfig,
    core::{
        credential::CredentialRecord,
        credential_format::{ProofType, SECURITY_CONTEXT_BBS_URL},
        input_descriptor::Constraints,
        presentation_definition::PresentationDefinition,
        presentation_submission::PresentationSubmission,
    },
    holder::{document_loader::CREDENTIALS_V1_CONTEXT, store::InMemoryCredentialStore},
    presentation_exchange::{
        make_requirement, PresentationExchangeError, PresentationOptions, Requirement,
    },
};
use serde_json::{json, Value as Json};


use holder::*;

fn definition(value: Json) -> PresentationDefinition {
    serde_json::from_value(value).unwrap()
}

fn constraints(value: Json) -> Constraints {
    serde_json::from_value(value).unwrap()
}

/// An input descriptor for resident cards whose `path` value satisfies `filter`.
fn descriptor(id: &str, groups: &[&str], fields: Json) -> Json {
    json!({
        "id": id,
        "group": groups,
        "schema": [{"uri": RESIDENT_CARD_TYPE}],
        "constraints": {"fields": fields}
    })
}

fn given_name_is(name: &str) -> Json {
    json!([{"path": ["$.credentialSubject.givenName"], "filter": {"type": "string", "const": name}}])
}

fn submission(presentation: &Json) -> PresentationSubmission {
    serde_json::from_value(presentation["presentation_submission"].clone()).unwrap()
}

/// The credential a descriptor map path points at.
fn pointed_at<'a>(presentation: &'a Json, path: &str) -> &'a Json {
    let position: usize = path
        .trim_start_matches("$.verifiableCredential[")
        .trim_end_matches(']')
        .parse()
        .unwrap();
    &presentation["verifiableCredential"][position]
}

fn options() -> PresentationOptions {
    PresentationOptions::new("3fa85f64-5717-4562-b3fc-2c963f66afa7")
}

#[tokio::test]
async fn each_descriptor_gets_its_credential() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "32f54163-7166-48f1-93d8-ff217bdb0653",
        "input_descriptors": [
            descriptor("d-john", &[], given_name_is("JOHN")),
            descriptor("d-cai", &[], given_name_is("CAI")),
            descriptor("d-anna", &[], given_name_is("ANNA")),
        ]
    }));
    let mut credentials = Vec::new();
    for (id, given_name) in [("a", "JOHN"), ("b", "CAI"), ("c", "ANNA")] {
        credentials.push(
            ResidentCard {
                id,
                given_name,
                ..Default::default()
            }
            .record()
            .await,
        );
    }

    let presentation = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();

    assert_eq!(presentation_ids_sorted(presentation).len(), 3);
    let submission = submission(presentation);
    assert_eq!(submission.definition_id(), definition.id());
    assert_eq!(submission.descriptor_map().len(), 3);
    for entry in submission.descriptor_map() {
        let expected = entry.id().trim_start_matches("d-").to_uppercase();
        let credential = pointed_at(presentation, entry.path());
        assert_eq!(credential["credentialSubject"]["givenName"], json!(expected));
    }

    // Not signed: the subject is not a wallet DID.
    assert!(presentation.get("proof").is_none());
    assert!(presentation.get("holder").is_none());

    exchange
        .verify_received_presentation(&definition, presentation)
        .await
        .unwrap();
}

fn presentation_ids_sorted(presentation: &Json) -> Vec<String> {
    let mut ids = presented_ids(presentation);
    ids.sort();
    ids.dedup();
    ids
}

#[tokio::test]
async fn pick_count_selects_exactly_that_many_descriptors() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "pick",
        "submission_requirements": [{"name": "Two names", "rule": "pick", "count": 2, "from": "A"}],
        "input_descriptors": [
            descriptor("d-john", &["A"], given_name_is("JOHN")),
            descriptor("d-cai", &["A"], given_name_is("CAI")),
            descriptor("d-anna", &["A"], given_name_is("ANNA")),
        ]
    }));
    let john = ResidentCard { id: "john", ..Default::default() }.record().await;
    let cai = ResidentCard { id: "cai", given_name: "CAI", ..Default::default() }.record().await;

    let presentation = exchange
        .create_vp(&[john.clone(), cai], &definition, &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();
    assert_eq!(presented_ids(presentation).len(), 2);
    assert_eq!(submission(presentation).descriptor_map().len(), 2);

    // One satisfiable descriptor out of the two picked: nothing, not a partial answer.
    let error = exchange
        .create_vp(&[john.clone()], &definition, &options())
        .await
        .unwrap_err();
    assert!(matches!(error.root(), PresentationExchangeError::NoCandidates(_)));
    assert!(error.to_string().contains("presentation definition `pick`"));

    let requirement = make_requirement(
        definition.submission_requirements(),
        definition.input_descriptors(),
    )
    .unwrap();
    let result = exchange
        .apply_requirement(&requirement, &[john], &options())
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn filter_constraints_is_idempotent() {
    let exchange = exchange().await;
    let constraints = constraints(json!({
        "fields": [
            {"path": ["$.credentialSubject.gender"], "filter": {"type": "string", "const": "Male"}},
            {"path": ["$.issuanceDate"], "filter": {"type": "string", "format": "date", "minimum": "2005-05-16"}}
        ]
    }));
    let mut credentials = Vec::new();
    for (id, gender, issuance_date) in [
        ("a", "Male", "2010-01-01T19:23:24Z"),
        ("b", "Female", "2010-01-01T19:23:24Z"),
        ("c", "Male", "2001-01-01T19:23:24Z"),
        ("d", "Male", "2006-01-01T00:00:00Z"),
    ] {
        credentials.push(
            ResidentCard {
                id,
                gender,
                issuance_date,
                ..Default::default()
            }
            .record()
            .await,
        );
    }
    let before = credentials.clone();

    let once = exchange
        .filter_constraints(&constraints, &credentials, None)
        .await
        .unwrap();
    let twice = exchange
        .filter_constraints(&constraints, &once, None)
        .await
        .unwrap();

    assert_eq!(credentials, before);
    assert_eq!(once, twice);
    let ids: Vec<_> = once.iter().map(|c| c.id().to_string()).collect();
    assert_eq!(
        ids,
        vec![
            "https://issuer.oidp.uscis.gov/credentials/a",
            "https://issuer.oidp.uscis.gov/credentials/d"
        ]
    );
}

#[tokio::test]
async fn negated_const_matches_everything_else() {
    let exchange = exchange().await;
    let constraints = constraints(json!({
        "fields": [
            {"path": ["$.credentialSubject.givenName"], "filter": {"not": {"const": "JOHN"}}}
        ]
    }));
    let mut credentials = vec![
        ResidentCard { id: "john", ..Default::default() }.record().await,
        ResidentCard { id: "cai", given_name: "CAI", ..Default::default() }.record().await,
    ];
    let mut nameless = ResidentCard { id: "nameless", ..Default::default() }.to_json();
    nameless["credentialSubject"]
        .as_object_mut()
        .unwrap()
        .remove("givenName");
    credentials.push(record(nameless).await);

    let applicable = exchange
        .filter_constraints(&constraints, &credentials, None)
        .await
        .unwrap();
    let ids: Vec<_> = applicable.iter().map(|c| c.id().to_string()).collect();
    assert_eq!(ids, vec!["https://issuer.oidp.uscis.gov/credentials/cai"]);
}

#[tokio::test]
async fn numeric_bounds_are_inclusive() {
    let exchange = exchange().await;
    let mut credentials = Vec::new();
    for (id, score) in [("a", 2), ("b", 2), ("c", 3)] {
        let mut card = ResidentCard { id, ..Default::default() }.to_json();
        card["credentialSubject"]["score"] = json!(score);
        credentials.push(record(card).await);
    }

    let count = |bound: &str| {
        constraints(json!({
            "fields": [{"path": ["$.credentialSubject.score"], "filter": {"type": "number", bound: 2}}]
        }))
    };

    let applicable = exchange
        .filter_constraints(&count("minimum"), &credentials, None)
        .await
        .unwrap();
    assert_eq!(applicable.len(), 3);
    let applicable = exchange
        .filter_constraints(&count("maximum"), &credentials, None)
        .await
        .unwrap();
    assert_eq!(applicable.len(), 2);
}

#[tokio::test]
async fn nested_all_groups_under_pick_min() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "nested-groups",
        "submission_requirements": [
            {
                "name": "Citizenship Information",
                "rule": "pick",
                "min": 1,
                "from_nested": [
                    {"name": "Issuer", "rule": "all", "from": "A"},
                    {"name": "Gender", "rule": "all", "from": "B"},
                    {"name": "Issuance", "rule": "all", "from": "C"}
                ]
            }
        ],
        "input_descriptors": [
            descriptor("issuer", &["A"], json!([
                {"path": ["$.issuer.id", "$.issuer"], "filter": {"type": "string", "const": ISSUER_DID}}
            ])),
            descriptor("gender", &["B"], json!([
                {"path": ["$.credentialSubject.gender"], "filter": {"type": "string", "const": "Male"}}
            ])),
            descriptor("issuance", &["C"], json!([
                {"path": ["$.issuanceDate"], "filter": {"type": "string", "format": "date", "minimum": "2005-05-16"}}
            ])),
        ]
    }));

    let mut credentials = Vec::new();
    for (id, issuer, gender, issuance_date) in [
        ("1", ISSUER_DID, "Male", "2010-01-01T19:23:24Z"),
        ("2", OTHER_ISSUER_DID, "Male", "2000-01-01T19:23:24Z"),
        ("3", OTHER_ISSUER_DID, "Female", "2010-01-01T19:23:24Z"),
        ("4", ISSUER_DID, "Female", "2000-01-01T19:23:24Z"),
        ("5", OTHER_ISSUER_DID, "Female", "2000-01-01T19:23:24Z"),
        ("6", OTHER_ISSUER_DID, "Female", "1999-01-01T19:23:24Z"),
    ] {
        credentials.push(
            ResidentCard {
                id,
                issuer,
                gender,
                issuance_date,
                ..Default::default()
            }
            .record()
            .await,
        );
    }

    let presentation = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();

    let ids = presented_ids(presentation);
    assert_eq!(ids.len(), 4);
    for id in ["1", "2", "3", "4"] {
        assert!(ids.contains(&format!("https://issuer.oidp.uscis.gov/credentials/{id}")));
    }
    // Credential 1 answers all three descriptors from a single position.
    assert_eq!(submission(presentation).descriptor_map().len(), 6);
}

#[tokio::test]
async fn incompatible_date_windows_select_nothing() {
    let exchange = exchange().await;
    let window = |id: &str, group: &str, after: &str, before: &str| {
        descriptor(id, &[group], json!([
            {"path": ["$.issuanceDate"], "filter": {"type": "string", "format": "date", "minimum": after}},
            {"path": ["$.issuanceDate"], "filter": {"type": "string", "format": "date", "maximum": before}}
        ]))
    };
    // Both groups are required, so a credential must fall in both windows.
    let definition = definition(json!({
        "id": "windows",
        "submission_requirements": [
            {
                "rule": "all",
                "from_nested": [
                    {"rule": "all", "from": "A"},
                    {"rule": "all", "from": "B"}
                ]
            }
        ],
        "input_descriptors": [
            window("recent", "A", "2009-01-01", "2011-12-31"),
            window("older", "B", "2004-01-01", "2006-12-31"),
        ]
    }));

    let mut credentials = Vec::new();
    for (id, issuance_date) in [
        ("a", "2000-01-01T00:00:00Z"),
        ("b", "2005-01-01T00:00:00Z"),
        ("c", "2010-06-01T00:00:00Z"),
    ] {
        credentials.push(ResidentCard { id, issuance_date, ..Default::default() }.record().await);
    }

    let requirement = make_requirement(
        definition.submission_requirements(),
        definition.input_descriptors(),
    )
    .unwrap();
    let Requirement::Group { children, .. } = &requirement else {
        panic!("expected the top-level group")
    };
    let Requirement::Group { children: windows, .. } = &children[0] else {
        panic!("expected a nested group")
    };

    // Each window alone is answered by its own credential.
    for (window, expected) in windows.iter().zip(["c", "b"]) {
        let result = exchange
            .apply_requirement(window, &credentials, &options())
            .await
            .unwrap();
        let ids: Vec<String> = result
            .values()
            .flatten()
            .map(|credential| credential.id().to_string())
            .collect();
        assert_eq!(ids, vec![format!("https://issuer.oidp.uscis.gov/credentials/{expected}")]);
    }

    let result = exchange
        .apply_requirement(&children[0], &credentials, &options())
        .await
        .unwrap();
    assert!(result.is_empty());

    let error = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap_err();
    assert!(matches!(error.root(), PresentationExchangeError::NoCandidates(_)));
}

#[tokio::test]
async fn explicit_zero_minimum_accepts_an_empty_answer() {
    let exchange = exchange().await;
    let with_bounds = |min: usize| {
        definition(json!({
            "id": "optional-group",
            "submission_requirements": [{"rule": "pick", "min": min, "max": 1, "from": "A"}],
            "input_descriptors": [descriptor("d-cai", &["A"], given_name_is("CAI"))]
        }))
    };
    let credentials = vec![ResidentCard { id: "john", ..Default::default() }.record().await];

    let presentation = exchange
        .create_vp(&credentials, &with_bounds(0), &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();
    assert!(presented_ids(presentation).is_empty());
    assert!(submission(presentation).descriptor_map().is_empty());
    assert!(presentation.get("proof").is_none());

    let error = exchange
        .create_vp(&credentials, &with_bounds(1), &options())
        .await
        .unwrap_err();
    assert!(matches!(error.root(), PresentationExchangeError::NoCandidates(_)));
}

#[tokio::test]
async fn credentials_answering_too_many_nested_groups_are_excluded() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "multi-membership",
        "submission_requirements": [
            {
                "rule": "pick",
                "max": 1,
                "from_nested": [
                    {"rule": "all", "from": "A"},
                    {"rule": "all", "from": "B"}
                ]
            }
        ],
        "input_descriptors": [
            descriptor("name", &["A"], given_name_is("JOHN")),
            descriptor("gender", &["B"], json!([
                {"path": ["$.credentialSubject.gender"], "filter": {"type": "string", "const": "Male"}}
            ])),
        ]
    }));
    let both = ResidentCard { id: "both", ..Default::default() }.record().await;
    let one = ResidentCard { id: "one", given_name: "CAI", ..Default::default() }.record().await;

    let presentation = exchange
        .create_vp(&[both, one], &definition, &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();

    assert_eq!(
        presented_ids(presentation),
        vec!["https://issuer.oidp.uscis.gov/credentials/one"]
    );
    let submission = submission(presentation);
    assert_eq!(submission.descriptor_map().len(), 1);
    assert_eq!(submission.descriptor_map()[0].id(), "gender");
}

#[tokio::test]
async fn top_level_requirements_are_answered_separately() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "two-requirements",
        "submission_requirements": [
            {"rule": "all", "from": "A"},
            {"rule": "all", "from": "B"}
        ],
        "input_descriptors": [
            descriptor("john", &["A"], given_name_is("JOHN")),
            descriptor("cai", &["B"], given_name_is("CAI")),
        ]
    }));
    let credentials = vec![
        ResidentCard { id: "john", ..Default::default() }.record().await,
        ResidentCard { id: "cai", given_name: "CAI", ..Default::default() }.record().await,
    ];

    let presentations = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap()
        .into_vec();

    assert_eq!(presentations.len(), 2);
    assert_eq!(
        presented_ids(&presentations[0]),
        vec!["https://issuer.oidp.uscis.gov/credentials/john"]
    );
    assert_eq!(
        presented_ids(&presentations[1]),
        vec!["https://issuer.oidp.uscis.gov/credentials/cai"]
    );
}

#[tokio::test]
async fn several_applicable_credentials_need_a_selection() {
    let exchange = exchange_with(PresentationExchangeConfig::default(), true).await;
    let definition = definition(json!({
        "id": "ambiguous",
        "input_descriptors": [descriptor("card", &[], given_name_is("JOHN"))]
    }));
    let first = ResidentCard { id: "first", ..Default::default() }.record().await;
    let second = ResidentCard { id: "second", ..Default::default() }.record().await;
    let credentials = vec![first.clone(), second.clone()];

    let error = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap_err();
    assert!(matches!(
        error.root(),
        PresentationExchangeError::AmbiguousSelection(2)
    ));

    // By record id.
    let selection = HashMap::from([("card".to_owned(), vec![second.record_id.clone()])]);
    let presentation = exchange
        .create_vp(&credentials, &definition, &options().with_records_filter(selection))
        .await
        .unwrap();
    assert_eq!(
        presented_ids(presentation.single().unwrap()),
        vec!["https://issuer.oidp.uscis.gov/credentials/second"]
    );

    // By credential id.
    let selection = HashMap::from([("card".to_owned(), vec![first.id().to_string()])]);
    let presentation = exchange
        .create_vp(&credentials, &definition, &options().with_records_filter(selection))
        .await
        .unwrap();
    assert_eq!(
        presented_ids(presentation.single().unwrap()),
        vec!["https://issuer.oidp.uscis.gov/credentials/first"]
    );
}

#[tokio::test]
async fn presentations_are_signed_as_the_common_subject() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "signed",
        "input_descriptors": [descriptor("card", &[], given_name_is("JOHN"))]
    }));
    let credentials = vec![
        ResidentCard { id: "a", subject: HOLDER_DID, ..Default::default() }.record().await,
        ResidentCard { id: "b", subject: HOLDER_DID, ..Default::default() }.record().await,
    ];

    let presentation = exchange
        .create_vp(
            &credentials,
            &definition,
            &options().with_domain("verifier.example"),
        )
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();

    assert_eq!(presentation["holder"], json!(HOLDER_DID));
    let proof = &presentation["proof"];
    assert_eq!(proof["type"], json!("Ed25519Signature2018"));
    assert_eq!(proof["verificationMethod"], json!(format!("{HOLDER_DID}#key-1")));
    assert_eq!(proof["challenge"], json!("3fa85f64-5717-4562-b3fc-2c963f66afa7"));
    assert_eq!(proof["domain"], json!("verifier.example"));
    assert!(!presentation["@context"]
        .as_array()
        .unwrap()
        .contains(&json!(SECURITY_CONTEXT_BBS_URL)));
}

#[tokio::test]
async fn credentials_of_different_subjects_are_not_signed_together() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "subjects",
        "input_descriptors": [descriptor("card", &[], given_name_is("JOHN"))]
    }));
    let credentials = vec![
        ResidentCard { id: "a", subject: HOLDER_DID, ..Default::default() }.record().await,
        ResidentCard { id: "b", subject: SECOND_HOLDER_DID, ..Default::default() }.record().await,
    ];

    let error = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap_err();
    assert!(matches!(error.root(), PresentationExchangeError::MultipleSubjects));
}

#[tokio::test]
async fn configured_signing_did() {
    let definition = definition(json!({
        "id": "configured",
        "input_descriptors": [descriptor("card", &[], given_name_is("JOHN"))]
    }));
    let credentials = vec![ResidentCard::default().record().await];

    let exchange = exchange_with(
        PresentationExchangeConfig {
            pres_signing_did: Some(SECOND_HOLDER_DID.to_owned()),
            ..Default::default()
        },
        true,
    )
    .await;
    let presentation = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();
    assert_eq!(presentation["holder"], json!(SECOND_HOLDER_DID));
    assert_eq!(
        presentation["proof"]["verificationMethod"],
        json!(format!("{SECOND_HOLDER_DID}#key-1"))
    );

    let exchange = exchange_with(
        PresentationExchangeConfig {
            pres_signing_did: Some("did:example:unknown".to_owned()),
            ..Default::default()
        },
        true,
    )
    .await;
    let error = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap_err();
    assert!(matches!(
        error.root(),
        PresentationExchangeError::UnknownSigningDid(did) if did == "did:example:unknown"
    ));
}

#[tokio::test]
async fn bbs_presentations_carry_the_bbs_context() {
    let exchange = exchange_with(
        PresentationExchangeConfig {
            proof_type: ProofType::BbsBlsSignature2020,
            auto_respond_presentation_request: true,
            ..Default::default()
        },
        true,
    )
    .await;
    let definition = definition(json!({
        "id": "bbs",
        "input_descriptors": [descriptor("card", &[], given_name_is("JOHN"))]
    }));

    // The Ed25519 holder DID cannot sign BBS+ presentations.
    let credentials = vec![ResidentCard { subject: HOLDER_DID, ..Default::default() }.record().await];
    let presentation = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();
    assert!(presentation["@context"]
        .as_array()
        .unwrap()
        .contains(&json!(SECURITY_CONTEXT_BBS_URL)));
    assert!(presentation.get("proof").is_none());

    let credentials =
        vec![ResidentCard { subject: BLS_HOLDER_DID, ..Default::default() }.record().await];
    let presentation = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap();
    assert_eq!(presentation["proof"]["type"], json!("BbsBlsSignature2020"));
    assert_eq!(presentation["holder"], json!(BLS_HOLDER_DID));
}

fn holder_bound_definition(directive: &str) -> PresentationDefinition {
    definition(json!({
        "id": "is-holder",
        "input_descriptors": [{
            "id": "card",
            "schema": [{"uri": RESIDENT_CARD_TYPE}],
            "constraints": {
                "is_holder": [{"field_id": ["subject"], "directive": directive}],
                "fields": [{"id": "subject", "path": ["$.credentialSubject.id"]}]
            }
        }]
    }))
}

#[tokio::test]
async fn holder_binding_is_enforced() {
    let exchange = exchange().await;
    let credentials = vec![
        ResidentCard { id: "held", subject: HOLDER_DID, ..Default::default() }.record().await,
        ResidentCard { id: "foreign", ..Default::default() }.record().await,
    ];

    for directive in ["required", "preferred"] {
        let presentation = exchange
            .create_vp(&credentials, &holder_bound_definition(directive), &options())
            .await
            .unwrap();
        assert_eq!(
            presented_ids(presentation.single().unwrap()),
            vec!["https://issuer.oidp.uscis.gov/credentials/held"],
            "{directive}"
        );
    }

    let foreign_only = exchange
        .create_vp(&credentials[1..], &holder_bound_definition("preferred"), &options())
        .await
        .unwrap_err();
    assert!(matches!(foreign_only.root(), PresentationExchangeError::NoCandidates(_)));
}

#[tokio::test]
async fn received_credentials_must_be_about_the_holder() {
    let exchange = exchange().await;
    let definition = holder_bound_definition("required");
    let held = ResidentCard { id: "held", subject: HOLDER_DID, ..Default::default() }.record().await;

    let presentation = exchange
        .create_vp(&[held], &definition, &options())
        .await
        .unwrap()
        .into_vec()
        .remove(0);
    assert_eq!(presentation["holder"], json!(HOLDER_DID));
    exchange
        .verify_received_presentation(&definition, &presentation)
        .await
        .unwrap();

    // The prover's DID stands in for a missing `holder`.
    let mut proven = presentation.clone();
    proven.as_object_mut().unwrap().remove("holder");
    exchange
        .verify_received_presentation(&definition, &proven)
        .await
        .unwrap();

    let mut foreign = presentation.clone();
    foreign["verifiableCredential"][0]["credentialSubject"]["id"] = json!("did:example:b34ca6cd37bbf23");
    let error = exchange
        .verify_received_presentation(&definition, &foreign)
        .await
        .unwrap_err();
    assert!(matches!(error.root(), PresentationExchangeError::Verification(_)));
    assert!(error.to_string().contains("not about the presentation holder"));

    let mut anonymous = presentation;
    let object = anonymous.as_object_mut().unwrap();
    object.remove("holder");
    object.remove("proof");
    assert!(exchange
        .verify_received_presentation(&definition, &anonymous)
        .await
        .is_err());
}

fn limited_definition() -> PresentationDefinition {
    definition(json!({
        "id": "limited",
        "input_descriptors": [{
            "id": "citizenship_input_1",
            "schema": [{"uri": RESIDENT_CARD_TYPE}],
            "constraints": {
                "limit_disclosure": "required",
                "fields": [
                    {"path": ["$.credentialSubject.givenName"], "filter": {"type": "string", "const": "JOHN"}}
                ]
            }
        }]
    }))
}

#[tokio::test]
async fn limited_disclosure_derives_and_verifies() {
    let exchange = exchange().await;
    let definition = limited_definition();
    let credentials = vec![ResidentCard::default().record().await];

    let presentation = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap();
    let presentation = presentation.single().unwrap().clone();

    let derived = &presentation["verifiableCredential"][0];
    assert_eq!(derived["proof"]["type"], json!("BbsBlsSignatureProof2020"));
    let mut subject_keys: Vec<_> = derived["credentialSubject"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    subject_keys.sort();
    assert_eq!(subject_keys, vec!["givenName", "id", "type"]);
    assert!(derived.get("expirationDate").is_none());
    // The stored credential is left alone.
    assert_eq!(credentials[0].value["credentialSubject"]["familyName"], json!("SMITH"));

    exchange
        .verify_received_presentation(&definition, &presentation)
        .await
        .unwrap();

    let mut oversharing = presentation.clone();
    oversharing["verifiableCredential"][0]["credentialSubject"]["familyName"] = json!("SMITH");
    let error = exchange
        .verify_received_presentation(&definition, &oversharing)
        .await
        .unwrap_err();
    assert!(matches!(error.root(), PresentationExchangeError::Verification(_)));
    assert!(error.to_string().contains("credentialSubject.familyName"));
}

#[tokio::test]
async fn reveal_document_override() {
    let exchange = exchange().await;
    let credentials = vec![ResidentCard::default().record().await];
    let frame = json!({
        "@context": [
            "https://www.w3.org/2018/credentials/v1",
            "https://w3id.org/citizenship/v1"
        ],
        "type": ["VerifiableCredential", "PermanentResidentCard"],
        "@explicit": true,
        "issuer": {},
        "issuanceDate": {},
        "credentialSubject": {"@explicit": true, "familyName": {}}
    });

    let presentation = exchange
        .create_vp(
            &credentials,
            &limited_definition(),
            &options().with_reveal_document(frame),
        )
        .await
        .unwrap();
    let subject = &presentation.single().unwrap()["verifiableCredential"][0]["credentialSubject"];
    assert_eq!(subject["familyName"], json!("SMITH"));
    assert!(subject.get("givenName").is_none());
}

#[tokio::test]
async fn limited_disclosure_needs_a_derivation_suite() {
    let definition = limited_definition();
    let credentials = vec![ResidentCard::default().record().await];

    let exchange = exchange_with(
        PresentationExchangeConfig {
            auto_respond_presentation_request: true,
            ..Default::default()
        },
        false,
    )
    .await;
    let error = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap_err();
    assert!(matches!(
        error.root(),
        PresentationExchangeError::UnsupportedOperation(_)
    ));

    let exchange = exchange_with(
        PresentationExchangeConfig {
            auto_respond_presentation_request: true,
            selective_disclosure: false,
            ..Default::default()
        },
        true,
    )
    .await;
    let error = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap_err();
    assert!(matches!(
        error.root(),
        PresentationExchangeError::UnsupportedOperation(_)
    ));
}

#[tokio::test]
async fn received_presentations_must_answer_the_definition() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "received",
        "input_descriptors": [
            descriptor("d-john", &[], given_name_is("JOHN")),
            descriptor("d-cai", &[], given_name_is("CAI")),
        ]
    }));
    let credentials = vec![
        ResidentCard { id: "john", ..Default::default() }.record().await,
        ResidentCard { id: "cai", given_name: "CAI", ..Default::default() }.record().await,
    ];
    let presentation = exchange
        .create_vp(&credentials, &definition, &options())
        .await
        .unwrap()
        .into_vec()
        .remove(0);

    let rejected = |presentation: Json| {
        let exchange = exchange.clone();
        let definition = definition.clone();
        async move {
            let error = exchange
                .verify_received_presentation(&definition, &presentation)
                .await
                .unwrap_err();
            assert!(matches!(error.root(), PresentationExchangeError::Verification(_)));
            error.to_string()
        }
    };

    let mut unknown = presentation.clone();
    unknown["presentation_submission"]["descriptor_map"][0]["id"] = json!("nope");
    assert!(rejected(unknown).await.contains("`nope`"));

    let mut uncovered = presentation.clone();
    uncovered["presentation_submission"]["descriptor_map"]
        .as_array_mut()
        .unwrap()
        .pop();
    assert!(rejected(uncovered).await.contains("is not answered"));

    let mut other_definition = presentation.clone();
    other_definition["presentation_submission"]["definition_id"] = json!("elsewhere");
    rejected(other_definition).await;

    let mut altered = presentation.clone();
    for credential in altered["verifiableCredential"].as_array_mut().unwrap() {
        credential["credentialSubject"]["givenName"] = json!("NOBODY");
    }
    assert!(rejected(altered).await.contains("does not satisfy"));

    let mut bare = presentation;
    bare.as_object_mut().unwrap().remove("presentation_submission");
    rejected(bare).await;
}

#[tokio::test]
async fn unknown_contexts_only_matter_to_schema_filters() {
    let exchange = exchange().await;
    let mut card = ResidentCard::default().to_json();
    card["@context"] = json!([CREDENTIALS_V1_CONTEXT, "https://example.org/unpublished/v1"]);
    let credential = record(card).await;
    assert_eq!(
        credential.expanded_types,
        vec!["VerifiableCredential", "PermanentResidentCard"]
    );

    let by_issuer = definition(json!({
        "id": "issuer-only",
        "input_descriptors": [{
            "id": "issued",
            "constraints": {
                "fields": [{"path": ["$.issuer"], "filter": {"type": "string", "const": ISSUER_DID}}]
            }
        }]
    }));
    let presentation = exchange
        .create_vp(&[credential.clone()], &by_issuer, &options())
        .await
        .unwrap()
        .into_vec()
        .remove(0);
    exchange
        .verify_received_presentation(&by_issuer, &presentation)
        .await
        .unwrap();

    let by_type = definition(json!({
        "id": "issuer-only",
        "input_descriptors": [{
            "id": "issued",
            "schema": [{"uri": RESIDENT_CARD_TYPE}],
            "constraints": {"fields": []}
        }]
    }));
    let error = exchange
        .verify_received_presentation(&by_type, &presentation)
        .await
        .unwrap_err();
    assert!(error.to_string().contains("accepted schema"));
}

#[tokio::test]
async fn candidates_are_read_from_the_store() {
    let store = InMemoryCredentialStore::new();
    store
        .insert(ResidentCard { id: "a", ..Default::default() }.record().await)
        .await;
    store
        .insert(ResidentCard { id: "b", given_name: "CAI", ..Default::default() }.record().await)
        .await;
    let mut ed25519 = ResidentCard { id: "c", ..Default::default() }.to_json();
    ed25519["proof"]["type"] = json!("Ed25519Signature2018");
    store.insert(record(ed25519).await).await;
    store
        .insert(
            record(json!({
                "@context": [
                    "https://www.w3.org/2018/credentials/v1",
                    "https://www.w3.org/2018/credentials/examples/v1"
                ],
                "id": "http://example.edu/credentials/1872",
                "type": ["VerifiableCredential", "UniversityDegreeCredential"],
                "issuer": ISSUER_DID,
                "issuanceDate": "2010-01-01T19:23:24Z",
                "credentialSubject": {"id": HOLDER_DID, "degree": {"type": "BachelorDegree"}}
            }))
            .await,
        )
        .await;
    assert_eq!(store.len().await, 4);

    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "candidates",
        "input_descriptors": [
            descriptor("d-john", &[], given_name_is("JOHN")),
            descriptor("d-cai", &[], given_name_is("CAI")),
        ]
    }));
    let candidates = exchange.retrieve_candidates(&store, &definition).await.unwrap();
    let mut ids: Vec<_> = candidates.iter().map(|c| c.id().to_string()).collect();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            "https://issuer.oidp.uscis.gov/credentials/a",
            "https://issuer.oidp.uscis.gov/credentials/b",
            "https://issuer.oidp.uscis.gov/credentials/c",
        ]
    );

    // Limited disclosure reads BBS+ credentials only.
    let candidates = exchange
        .retrieve_candidates(&store, &limited_definition())
        .await
        .unwrap();
    assert_eq!(candidates.len(), 2);
    assert!(candidates
        .iter()
        .all(|c| c.proof_types == vec!["BbsBlsSignature2020"]));

    let exchange = exchange_with(
        PresentationExchangeConfig {
            max_candidates: 1,
            ..Default::default()
        },
        true,
    )
    .await;
    let candidates = exchange
        .retrieve_candidates(&store, &limited_definition())
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn malformed_requirements_fail_before_filtering() {
    let exchange = exchange().await;
    let definition = definition(json!({
        "id": "malformed",
        "submission_requirements": [{"rule": "all", "from": "missing"}],
        "input_descriptors": [descriptor("card", &["A"], given_name_is("JOHN"))]
    }));

    let error = exchange
        .create_vp(&[ResidentCard::default().record().await], &definition, &options())
        .await
        .unwrap_err();
    assert!(matches!(error.root(), PresentationExchangeError::Definition(_)));
}

#[test]
fn records_are_identified_by_credential_id() {
    let record: CredentialRecord = serde_json::from_value(json!({
        "record_id": "record-1",
        "contexts": [],
        "expanded_types": [],
        "schema_ids": [],
        "subject_ids": [],
        "proof_types": [],
        "value": {}
    }))
    .unwrap();
    assert_eq!(record.id().as_str(), "record-1");
}
