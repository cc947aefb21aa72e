//! # Wire Payload
//!
//! Shape of a profile configuration as the control plane exchanges it.
//!
//! Lists are wrapped in a `Quantity`/`Items` pair, the same nesting the
//! CloudFront API uses for `EncryptionEntities` and `FieldPatterns`.

use super::SpecError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WirePayload {
    pub name: String,
    pub caller_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub encryption_entities: WireEntities,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireEntities {
    pub quantity: i32,
    #[serde(default)]
    pub items: Vec<WireEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireEntity {
    pub public_key_id: String,
    pub provider_id: String,
    pub field_patterns: WireFieldPatterns,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireFieldPatterns {
    pub quantity: i32,
    #[serde(default)]
    pub items: Vec<String>,
}

impl WirePayload {
    /// Reject payloads whose declared quantities disagree with their items
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::QuantityMismatch`] for the first inconsistent list.
    pub fn validate(&self) -> Result<(), SpecError> {
        check_quantity(
            "EncryptionEntities",
            self.encryption_entities.quantity,
            self.encryption_entities.items.len(),
        )?;
        for entity in &self.encryption_entities.items {
            check_quantity(
                "FieldPatterns",
                entity.field_patterns.quantity,
                entity.field_patterns.items.len(),
            )?;
        }
        Ok(())
    }
}

fn check_quantity(section: &'static str, quantity: i32, items: usize) -> Result<(), SpecError> {
    if usize::try_from(quantity).ok() == Some(items) {
        Ok(())
    } else {
        Err(SpecError::QuantityMismatch {
            section,
            quantity,
            items,
        })
    }
}

/// Saturating conversion for list lengths; the API caps these far below `i32::MAX`
pub(crate) fn quantity_of(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}
