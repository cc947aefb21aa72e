//! # Drift Detection
//!
//! Compares the last known remote record with a fresh lookup.

use crate::controller::finder::Lookup;
use crate::controller::mapper::{diff_fields, ProfileField};
use crate::profile::RemoteRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Divergence between last known and freshly observed remote state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "fields")]
pub enum DriftReport {
    InSync,
    /// The listed top-level fields differ
    Modified(BTreeSet<ProfileField>),
    /// The profile no longer exists remotely
    Vanished,
    /// A create landed but no read has observed the profile yet
    Pending,
}

impl DriftReport {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftReport::InSync => "in_sync",
            DriftReport::Modified(_) => "modified",
            DriftReport::Vanished => "vanished",
            DriftReport::Pending => "pending",
        }
    }

    #[must_use]
    pub fn is_in_sync(&self) -> bool {
        matches!(self, DriftReport::InSync)
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftReport::Modified(fields) => {
                let names: Vec<&str> = fields.iter().map(ProfileField::as_str).collect();
                write!(f, "modified ({})", names.join(", "))
            }
            other => f.write_str(other.as_str()),
        }
    }
}

/// Classify the difference between `last_known` and `fresh`
#[must_use]
pub fn detect(last_known: &RemoteRecord, fresh: &Lookup) -> DriftReport {
    match fresh {
        Lookup::NotFound => DriftReport::Vanished,
        Lookup::Found(record) => {
            let fields = diff_fields(&last_known.spec, &record.spec);
            if fields.is_empty() {
                DriftReport::InSync
            } else {
                DriftReport::Modified(fields)
            }
        }
    }
}
