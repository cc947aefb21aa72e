//! # Profile
//!
//! Domain types for a field-level encryption profile.
//!
//! - [`DesiredSpec`]: what the caller declares
//! - [`EncryptionEntity`]: one public key / provider binding and the fields it encrypts
//! - [`RemoteRecord`]: the last observed remote state, including its concurrency token
//!
//! The wire shape sent to the control plane lives in [`wire`].

pub mod wire;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Desired state of a field-level encryption profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DesiredSpec {
    /// Human identifier of the profile; unique per account
    pub name: String,
    #[serde(default)]
    pub comment: String,
    /// Ordered as declared; compared as a multiset
    #[serde(rename = "encryption_entities")]
    pub entities: Vec<EncryptionEntity>,
}

/// A public key and provider pair together with the field patterns it encrypts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EncryptionEntity {
    /// Identifier of a separately managed public key
    pub public_key_id: String,
    pub provider_id: String,
    /// Glob-like field names, compared as a set. Duplicates are tolerated here.
    pub field_patterns: Vec<String>,
}

/// Authoritative remote state as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Assigned by the control plane at creation
    pub id: String,
    /// Version token; changes on every successful mutation
    pub etag: String,
    /// Idempotency token sent with the original create
    pub caller_reference: String,
    pub spec: DesiredSpec,
    /// Set while a create has landed but no read has observed the profile yet
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

/// Malformed desired specification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("profile name must not be empty")]
    EmptyName,
    #[error("profile '{0}' must declare at least one encryption entity")]
    NoEntities(String),
    #[error("encryption entity {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
    #[error("encryption entity {index} must declare at least one field pattern")]
    NoFieldPatterns { index: usize },
    #[error("{section} quantity {quantity} does not match {items} items")]
    QuantityMismatch {
        section: &'static str,
        quantity: i32,
        items: usize,
    },
}

impl DesiredSpec {
    pub fn new(
        name: impl Into<String>,
        comment: impl Into<String>,
        entities: Vec<EncryptionEntity>,
    ) -> Self {
        Self {
            name: name.into(),
            comment: comment.into(),
            entities,
        }
    }

    /// Check the invariants every desired spec must satisfy before any remote call
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }
        if self.entities.is_empty() {
            return Err(SpecError::NoEntities(self.name.clone()));
        }
        for (index, entity) in self.entities.iter().enumerate() {
            if entity.public_key_id.trim().is_empty() {
                return Err(SpecError::EmptyField {
                    index,
                    field: "public_key_id",
                });
            }
            if entity.provider_id.trim().is_empty() {
                return Err(SpecError::EmptyField {
                    index,
                    field: "provider_id",
                });
            }
            if entity.field_patterns.is_empty() {
                return Err(SpecError::NoFieldPatterns { index });
            }
        }
        Ok(())
    }
}

impl RemoteRecord {
    /// Record for a profile whose create succeeded but was never confirmed by a read
    #[must_use]
    pub fn unconfirmed(
        id: impl Into<String>,
        etag: impl Into<String>,
        caller_reference: impl Into<String>,
        spec: DesiredSpec,
    ) -> Self {
        Self {
            id: id.into(),
            etag: etag.into(),
            caller_reference: caller_reference.into(),
            spec,
            pending: true,
        }
    }
}

impl EncryptionEntity {
    pub fn new<I, S>(public_key_id: impl Into<String>, provider_id: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            public_key_id: public_key_id.into(),
            provider_id: provider_id.into(),
            field_patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}
