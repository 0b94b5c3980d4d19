// Property-based tests for the cookie-format session credential

use common::credential::{SessionCredential, SESSION_FIELD};
use proptest::collection::hash_map;
use proptest::prelude::*;

fn cookie_pairs() -> impl Strategy<Value = Vec<(String, String)>> {
    hash_map(
        "[A-Za-z][A-Za-z0-9_]{0,11}",
        "[A-Za-z0-9%+/=._-]{0,16}",
        0..8,
    )
    .prop_map(|pairs| pairs.into_iter().collect())
}

fn from_pairs(pairs: &[(String, String)]) -> SessionCredential {
    let mut credential = SessionCredential::new();
    for (name, value) in pairs {
        credential.set(name, value);
    }
    credential
}

/// *For any* set of cookie pairs, rendering the credential and parsing
/// it back yields the same credential, embedded `=` in values included.
#[test]
fn property_display_parse_round_trip() {
    proptest!(|(pairs in cookie_pairs())| {
        let credential = from_pairs(&pairs);
        let reparsed = SessionCredential::parse(&credential.to_string());
        prop_assert_eq!(reparsed, credential);
    });
}

/// *For any* credential and rotation, applying the rotation a second
/// time changes nothing after the first application.
#[test]
fn property_merge_is_idempotent() {
    proptest!(|(base in cookie_pairs(), update in cookie_pairs())| {
        let mut credential = from_pairs(&base);
        let rotation = from_pairs(&update);

        credential.merge(&rotation);
        let after_first = credential.clone();
        credential.merge(&rotation);

        prop_assert_eq!(credential, after_first);
    });
}

/// *For any* merge, fields named in the update carry the update's value
/// and fields only in the base keep theirs.
#[test]
fn property_merge_last_writer_wins() {
    proptest!(|(base in cookie_pairs(), update in cookie_pairs())| {
        let mut credential = from_pairs(&base);
        credential.merge(&from_pairs(&update));

        for (name, value) in &update {
            prop_assert_eq!(credential.get(name), Some(value.as_str()));
        }
        for (name, value) in &base {
            if !update.iter().any(|(n, _)| n == name) {
                prop_assert_eq!(credential.get(name), Some(value.as_str()));
            }
        }
    });
}

/// *For any* merge, fields already present keep their positions; new
/// fields only ever append at the end.
#[test]
fn property_merge_keeps_existing_field_positions() {
    proptest!(|(base in cookie_pairs(), update in cookie_pairs())| {
        let mut credential = from_pairs(&base);
        credential.merge(&from_pairs(&update));

        let merged: Vec<&str> = credential.iter().map(|(n, _)| n).collect();
        for (position, (name, _)) in base.iter().enumerate() {
            prop_assert_eq!(merged[position], name.as_str());
        }
        prop_assert!(merged.len() >= base.len());
    });
}

/// *For any* two updates with no field name in common, applying them in
/// either order yields the same set of assignments.
#[test]
fn property_disjoint_merges_commute_as_sets() {
    proptest!(|(base in cookie_pairs(), first in cookie_pairs(), second in cookie_pairs())| {
        let second: Vec<(String, String)> = second
            .into_iter()
            .filter(|(name, _)| !first.iter().any(|(n, _)| n == name))
            .collect();

        let mut one_way = from_pairs(&base);
        one_way.merge(&from_pairs(&first));
        one_way.merge(&from_pairs(&second));

        let mut other_way = from_pairs(&base);
        other_way.merge(&from_pairs(&second));
        other_way.merge(&from_pairs(&first));

        let mut lhs: Vec<(String, String)> = one_way
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        let mut rhs: Vec<(String, String)> = other_way
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        lhs.sort();
        rhs.sort();
        prop_assert_eq!(lhs, rhs);
    });
}

/// *For any* input string, parsing never panics and the parsed form is
/// a fixed point: parsing its rendering reproduces it exactly.
#[test]
fn property_parse_is_stable_on_arbitrary_input() {
    proptest!(|(raw in ".{0,64}")| {
        let first = SessionCredential::parse(&raw);
        let second = SessionCredential::parse(&first.to_string());
        prop_assert_eq!(second, first);
    });
}

/// *For any* credential, the session accessor answers exactly when the
/// session field itself is present.
#[test]
fn property_session_id_requires_the_exact_field() {
    proptest!(|(pairs in cookie_pairs(), id in "[A-Za-z0-9]{1,24}")| {
        let mut credential = from_pairs(&pairs);

        if credential.get(SESSION_FIELD).is_none() {
            prop_assert_eq!(credential.session_id(), None);
        }

        credential.set(SESSION_FIELD, &id);
        prop_assert_eq!(credential.session_id(), Some(id.as_str()));
    });
}
