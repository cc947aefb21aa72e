//! # Plan
//!
//! Side-effect free preview of what reconciling a desired spec would do.

use crate::config::NameChangePolicy;
use crate::controller::mapper::{diff_fields, ProfileField};
use crate::profile::{DesiredSpec, RemoteRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Planned action for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "fields")]
pub enum Plan {
    Noop,
    WillUpdate(BTreeSet<ProfileField>),
    WillCreate,
    /// Delete followed by create; the profile gets a new identifier
    WillRecreate,
}

impl Plan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Plan::Noop)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Plan::Noop => f.write_str("no changes"),
            Plan::WillCreate => f.write_str("create"),
            Plan::WillRecreate => f.write_str("replace (delete, then create)"),
            Plan::WillUpdate(fields) => {
                let names: Vec<&str> = fields.iter().map(ProfileField::as_str).collect();
                write!(f, "update in place ({})", names.join(", "))
            }
        }
    }
}

/// Compare the desired spec with the last known record
///
/// `last_known` is `None` when no profile is tracked, including after a
/// refresh reported it vanished.
#[must_use]
pub fn compare_plan(
    desired: &DesiredSpec,
    last_known: Option<&RemoteRecord>,
    policy: NameChangePolicy,
) -> Plan {
    let Some(record) = last_known else {
        return Plan::WillCreate;
    };

    let fields = diff_fields(&record.spec, desired);
    if fields.is_empty() {
        Plan::Noop
    } else if fields.contains(&ProfileField::Name) && policy == NameChangePolicy::Recreate {
        Plan::WillRecreate
    } else {
        Plan::WillUpdate(fields)
    }
}
