//! # Finder
//!
//! Read-only lookup of a profile by identifier. A missing profile is a normal
//! answer ([`Lookup::NotFound`]), not an error, so callers can tell "deleted
//! out of band" apart from a failed call.

use crate::controller::mapper::record_from_fetched;
use crate::profile::RemoteRecord;
use crate::provider::{RemoteClient, RemoteError};
use std::sync::Arc;
use tracing::debug;

/// Result of looking a profile up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(RemoteRecord),
    NotFound,
}

impl Lookup {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    #[must_use]
    pub fn into_record(self) -> Option<RemoteRecord> {
        match self {
            Lookup::Found(record) => Some(record),
            Lookup::NotFound => None,
        }
    }
}

/// Fetches the current remote representation of a profile
#[derive(Clone)]
pub struct Finder {
    client: Arc<dyn RemoteClient>,
}

impl std::fmt::Debug for Finder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finder").finish_non_exhaustive()
    }
}

impl Finder {
    #[must_use]
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self { client }
    }

    /// Look a profile up by identifier
    ///
    /// # Errors
    ///
    /// Any failure other than "no such profile" is returned unchanged, so a
    /// transient failure stays retryable. [`RemoteError::NotFound`] is never
    /// returned.
    pub async fn find_by_id(&self, id: &str) -> Result<Lookup, RemoteError> {
        match self.client.get(id).await {
            Ok(fetched) => Ok(Lookup::Found(record_from_fetched(id, &fetched))),
            Err(RemoteError::NotFound(message)) => {
                debug!(profile.id = %id, reason = %message, "Profile not found");
                Ok(Lookup::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mapper::to_wire;
    use crate::profile::{DesiredSpec, EncryptionEntity};
    use crate::provider::memory::{Fault, InMemoryRemoteClient, RemoteCall};

    fn spec() -> DesiredSpec {
        DesiredSpec::new(
            "profile",
            "",
            vec![EncryptionEntity::new("pk-1", "provider", ["DateOfBirth"])],
        )
    }

    #[tokio::test]
    async fn test_found_record_carries_id_etag_and_reference() {
        let client = InMemoryRemoteClient::new();
        let created = client.create(&to_wire(&spec(), "ref-1")).await.unwrap();
        let finder = Finder::new(Arc::new(client));

        let record = finder
            .find_by_id(&created.id)
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(record.id, created.id);
        assert_eq!(record.etag, created.etag);
        assert_eq!(record.caller_reference, "ref-1");
        assert_eq!(record.spec, spec());
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_an_error() {
        let finder = Finder::new(Arc::new(InMemoryRemoteClient::new()));
        assert_eq!(finder.find_by_id("FLE-missing").await, Ok(Lookup::NotFound));
    }

    #[tokio::test]
    async fn test_transient_failure_is_passed_through() {
        let client = InMemoryRemoteClient::new();
        client.inject(RemoteCall::Get, Fault::transient()).await;
        let finder = Finder::new(Arc::new(client));

        let err = finder.find_by_id("FLE-any").await.unwrap_err();
        assert!(err.is_transient());
    }
}
