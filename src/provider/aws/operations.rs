//! # CloudFront Profile Operations
//!
//! Implements RemoteClient trait for CloudFront field-level encryption profiles.

use super::{classify, from_sdk_config, to_sdk_config, CloudFrontProfiles};
use crate::profile::wire::WirePayload;
use crate::provider::{CreatedProfile, FetchedProfile, RemoteClient, RemoteError};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, debug_span, warn, Instrument};

#[async_trait]
impl RemoteClient for CloudFrontProfiles {
    async fn create(&self, payload: &WirePayload) -> Result<CreatedProfile, RemoteError> {
        let span = debug_span!("aws.cloudfront.fle_profile.create", profile.name = %payload.name);
        let start = Instant::now();

        async move {
            let config = to_sdk_config(payload)?;
            let output = self
                .client
                .create_field_level_encryption_profile()
                .field_level_encryption_profile_config(config)
                .send()
                .await
                .map_err(|e| {
                    let err = classify("CreateFieldLevelEncryptionProfile", &e);
                    warn!(error = %err, "CloudFront create failed");
                    err
                })?;

            let id = output
                .field_level_encryption_profile()
                .map(|profile| profile.id().to_string())
                .ok_or_else(|| {
                    RemoteError::Transient("create response carried no profile".to_string())
                })?;
            let etag = output.e_tag().unwrap_or_default().to_string();
            debug!(
                profile.id = %id,
                duration_ms = start.elapsed().as_millis(),
                "CloudFront create succeeded"
            );
            Ok(CreatedProfile { id, etag })
        }
        .instrument(span)
        .await
    }

    async fn get(&self, id: &str) -> Result<FetchedProfile, RemoteError> {
        let span = debug_span!("aws.cloudfront.fle_profile.get", profile.id = id);

        async move {
            let output = self
                .client
                .get_field_level_encryption_profile()
                .id(id)
                .send()
                .await
                .map_err(|e| classify("GetFieldLevelEncryptionProfile", &e))?;

            let config = output
                .field_level_encryption_profile()
                .and_then(|profile| profile.field_level_encryption_profile_config())
                .ok_or_else(|| {
                    RemoteError::Transient(format!("get response for {id} carried no config"))
                })?;
            Ok(FetchedProfile {
                payload: from_sdk_config(config),
                etag: output.e_tag().unwrap_or_default().to_string(),
            })
        }
        .instrument(span)
        .await
    }

    async fn update(
        &self,
        id: &str,
        etag: &str,
        payload: &WirePayload,
    ) -> Result<String, RemoteError> {
        let span = debug_span!("aws.cloudfront.fle_profile.update", profile.id = id);

        async move {
            let config = to_sdk_config(payload)?;
            let output = self
                .client
                .update_field_level_encryption_profile()
                .id(id)
                .if_match(etag)
                .field_level_encryption_profile_config(config)
                .send()
                .await
                .map_err(|e| {
                    let err = classify("UpdateFieldLevelEncryptionProfile", &e);
                    warn!(error = %err, "CloudFront update failed");
                    err
                })?;
            Ok(output.e_tag().unwrap_or_default().to_string())
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, id: &str, etag: &str) -> Result<(), RemoteError> {
        let span = debug_span!("aws.cloudfront.fle_profile.delete", profile.id = id);

        async move {
            self.client
                .delete_field_level_encryption_profile()
                .id(id)
                .if_match(etag)
                .send()
                .await
                .map_err(|e| classify("DeleteFieldLevelEncryptionProfile", &e))?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}
