//! # State Mapper
//!
//! Conversion between [`DesiredSpec`] and the control plane's [`WirePayload`],
//! and the single definition of "nothing changed".
//!
//! The API keeps encryption entities in a list, but their order carries no
//! meaning. [`equivalent`] therefore compares entities as a multiset keyed by
//! `(public_key_id, provider_id)` and field patterns as sets. Every "has
//! anything changed" decision in the crate goes through [`diff_fields`] or
//! [`equivalent`].

use crate::profile::wire::{quantity_of, WireEntities, WireEntity, WireFieldPatterns, WirePayload};
use crate::profile::{DesiredSpec, EncryptionEntity, RemoteRecord};
use crate::provider::FetchedProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Top-level profile fields that can differ between two specs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    Comment,
    /// The encryption entity set, including any entity's field patterns
    Entities,
}

impl ProfileField {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Name => "name",
            ProfileField::Comment => "comment",
            ProfileField::Entities => "encryption_entities",
        }
    }
}

/// Map a desired spec onto the wire, preserving entity and pattern order
#[must_use]
pub fn to_wire(spec: &DesiredSpec, caller_reference: &str) -> WirePayload {
    let items: Vec<WireEntity> = spec
        .entities
        .iter()
        .map(|entity| WireEntity {
            public_key_id: entity.public_key_id.clone(),
            provider_id: entity.provider_id.clone(),
            field_patterns: WireFieldPatterns {
                quantity: quantity_of(entity.field_patterns.len()),
                items: entity.field_patterns.clone(),
            },
        })
        .collect();

    WirePayload {
        name: spec.name.clone(),
        caller_reference: caller_reference.to_string(),
        comment: (!spec.comment.is_empty()).then(|| spec.comment.clone()),
        encryption_entities: WireEntities {
            quantity: quantity_of(items.len()),
            items,
        },
    }
}

/// Map a wire payload back to spec shape. Quantities are ignored; items are authoritative.
#[must_use]
pub fn from_wire(payload: &WirePayload) -> DesiredSpec {
    DesiredSpec {
        name: payload.name.clone(),
        comment: payload.comment.clone().unwrap_or_default(),
        entities: payload
            .encryption_entities
            .items
            .iter()
            .map(|entity| EncryptionEntity {
                public_key_id: entity.public_key_id.clone(),
                provider_id: entity.provider_id.clone(),
                field_patterns: entity.field_patterns.items.clone(),
            })
            .collect(),
    }
}

/// Materialise a remote record from a fetched profile
#[must_use]
pub fn record_from_fetched(id: &str, fetched: &FetchedProfile) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        etag: fetched.etag.clone(),
        caller_reference: fetched.payload.caller_reference.clone(),
        spec: from_wire(&fetched.payload),
        pending: false,
    }
}

type CanonicalEntity<'a> = (&'a str, &'a str, BTreeSet<&'a str>);

/// Sorted entity list with pattern sets; equal lists mean equal multisets
fn canonical_entities(entities: &[EncryptionEntity]) -> Vec<CanonicalEntity<'_>> {
    let mut canonical: Vec<CanonicalEntity<'_>> = entities
        .iter()
        .map(|entity| {
            (
                entity.public_key_id.as_str(),
                entity.provider_id.as_str(),
                entity.field_patterns.iter().map(String::as_str).collect(),
            )
        })
        .collect();
    canonical.sort();
    canonical
}

/// Top-level fields that differ between `a` and `b`
#[must_use]
pub fn diff_fields(a: &DesiredSpec, b: &DesiredSpec) -> BTreeSet<ProfileField> {
    let mut fields = BTreeSet::new();
    if a.name != b.name {
        fields.insert(ProfileField::Name);
    }
    if a.comment != b.comment {
        fields.insert(ProfileField::Comment);
    }
    if canonical_entities(&a.entities) != canonical_entities(&b.entities) {
        fields.insert(ProfileField::Entities);
    }
    fields
}

/// Whether two specs describe the same remote configuration
#[must_use]
pub fn equivalent(a: &DesiredSpec, b: &DesiredSpec) -> bool {
    diff_fields(a, b).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(entities: Vec<EncryptionEntity>) -> DesiredSpec {
        DesiredSpec::new("profile", "some comment", entities)
    }

    #[test]
    fn test_to_wire_preserves_order_and_counts() {
        let desired = spec(vec![
            EncryptionEntity::new("pk-2", "p", ["B", "A"]),
            EncryptionEntity::new("pk-1", "p", ["C"]),
        ]);
        let wire = to_wire(&desired, "ref");

        assert_eq!(wire.encryption_entities.quantity, 2);
        assert_eq!(wire.encryption_entities.items[0].public_key_id, "pk-2");
        assert_eq!(
            wire.encryption_entities.items[0].field_patterns.items,
            vec!["B".to_string(), "A".to_string()]
        );
        assert_eq!(wire.encryption_entities.items[0].field_patterns.quantity, 2);
        assert_eq!(wire.comment.as_deref(), Some("some comment"));
        assert_eq!(wire.caller_reference, "ref");
    }

    #[test]
    fn test_empty_comment_is_omitted_on_wire() {
        let mut desired = spec(vec![EncryptionEntity::new("pk", "p", ["A"])]);
        desired.comment.clear();
        let wire = to_wire(&desired, "ref");
        assert_eq!(wire.comment, None);
        assert_eq!(from_wire(&wire).comment, "");
    }

    #[test]
    fn test_from_wire_inverts_to_wire() {
        let desired = spec(vec![
            EncryptionEntity::new("pk-1", "p", ["DateOfBirth", "FirstName"]),
            EncryptionEntity::new("pk-2", "q", ["LastName"]),
        ]);
        assert_eq!(from_wire(&to_wire(&desired, "ref")), desired);
    }

    #[test]
    fn test_entity_order_is_ignored() {
        let a = spec(vec![
            EncryptionEntity::new("pk-1", "p", ["A"]),
            EncryptionEntity::new("pk-2", "p", ["B"]),
        ]);
        let b = spec(vec![
            EncryptionEntity::new("pk-2", "p", ["B"]),
            EncryptionEntity::new("pk-1", "p", ["A"]),
        ]);
        assert!(equivalent(&a, &b));
    }

    #[test]
    fn test_pattern_order_and_duplicates_are_ignored() {
        let a = spec(vec![EncryptionEntity::new("pk-1", "p", ["A", "B", "A"])]);
        let b = spec(vec![EncryptionEntity::new("pk-1", "p", ["B", "A"])]);
        assert!(equivalent(&a, &b));
    }

    #[test]
    fn test_entity_multiplicity_matters() {
        let a = spec(vec![
            EncryptionEntity::new("pk-1", "p", ["A"]),
            EncryptionEntity::new("pk-1", "p", ["A"]),
        ]);
        let b = spec(vec![EncryptionEntity::new("pk-1", "p", ["A"])]);
        assert_eq!(
            diff_fields(&a, &b),
            BTreeSet::from([ProfileField::Entities])
        );
    }

    #[test]
    fn test_diff_reports_each_field() {
        let a = spec(vec![EncryptionEntity::new("pk-1", "p", ["A"])]);
        let mut b = a.clone();
        b.comment = "other".to_string();
        assert_eq!(diff_fields(&a, &b), BTreeSet::from([ProfileField::Comment]));

        b.name = "renamed".to_string();
        b.entities[0].field_patterns.push("B".to_string());
        assert_eq!(
            diff_fields(&a, &b),
            BTreeSet::from([
                ProfileField::Name,
                ProfileField::Comment,
                ProfileField::Entities
            ])
        );
    }

    #[test]
    fn test_provider_change_is_entity_change() {
        let a = spec(vec![EncryptionEntity::new("pk-1", "p", ["A"])]);
        let b = spec(vec![EncryptionEntity::new("pk-1", "q", ["A"])]);
        assert!(!equivalent(&a, &b));
    }
}
