//! # CloudFront Field-Level Encryption Client
//!
//! Client for interacting with the CloudFront field-level encryption profile API.
//!
//! This module provides functionality to:
//! - Build an SDK client from the default credential chain
//! - Translate between [`WirePayload`] and the SDK's configuration types
//! - Classify SDK failures into [`RemoteError`]
//!
//! Credential resolution is left entirely to the AWS SDK default chain.

mod operations;

use crate::profile::wire::{WireEntities, WireEntity, WireFieldPatterns, WirePayload};
use crate::provider::{ConflictKind, RemoteError};
use aws_config::SdkConfig;
use aws_sdk_cloudfront::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudfront::types::{
    EncryptionEntities, EncryptionEntity, FieldLevelEncryptionProfileConfig, FieldPatterns,
};
use aws_sdk_cloudfront::Client as CloudFrontClient;
use tracing::info;

/// CloudFront-backed [`RemoteClient`](crate::provider::RemoteClient)
pub struct CloudFrontProfiles {
    client: CloudFrontClient,
}

impl std::fmt::Debug for CloudFrontProfiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFrontProfiles").finish_non_exhaustive()
    }
}

impl CloudFrontProfiles {
    /// Create a client using the default credential chain.
    ///
    /// CloudFront is a global service; `region` only selects the signing endpoint
    /// and defaults to whatever the environment configures.
    pub async fn new(region: Option<String>) -> Self {
        let sdk_config = Self::create_default_config(region).await;
        Self::from_sdk_config(&sdk_config)
    }

    #[must_use]
    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self {
            client: CloudFrontClient::new(sdk_config),
        }
    }

    #[must_use]
    pub fn from_client(client: CloudFrontClient) -> Self {
        Self { client }
    }

    async fn create_default_config(region: Option<String>) -> SdkConfig {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            info!("Using AWS region {} for CloudFront requests", region);
            loader = loader.region(aws_config::Region::new(region));
        }
        loader.load().await
    }
}

/// Build the SDK configuration for a payload
fn to_sdk_config(payload: &WirePayload) -> Result<FieldLevelEncryptionProfileConfig, RemoteError> {
    let mut items = Vec::with_capacity(payload.encryption_entities.items.len());
    for entity in &payload.encryption_entities.items {
        let patterns = FieldPatterns::builder()
            .quantity(entity.field_patterns.quantity)
            .set_items(Some(entity.field_patterns.items.clone()))
            .build()
            .map_err(|e| RemoteError::Invalid(e.to_string()))?;
        let item = EncryptionEntity::builder()
            .public_key_id(&entity.public_key_id)
            .provider_id(&entity.provider_id)
            .field_patterns(patterns)
            .build()
            .map_err(|e| RemoteError::Invalid(e.to_string()))?;
        items.push(item);
    }

    let entities = EncryptionEntities::builder()
        .quantity(payload.encryption_entities.quantity)
        .set_items(Some(items))
        .build()
        .map_err(|e| RemoteError::Invalid(e.to_string()))?;

    FieldLevelEncryptionProfileConfig::builder()
        .name(&payload.name)
        .caller_reference(&payload.caller_reference)
        .set_comment(payload.comment.clone())
        .encryption_entities(entities)
        .build()
        .map_err(|e| RemoteError::Invalid(e.to_string()))
}

/// Read a payload back out of the SDK configuration
fn from_sdk_config(config: &FieldLevelEncryptionProfileConfig) -> WirePayload {
    let (quantity, items) = config
        .encryption_entities()
        .map(|entities| {
            let items = entities
                .items()
                .iter()
                .map(|entity| {
                    let (pattern_quantity, patterns) = entity
                        .field_patterns()
                        .map(|p| (p.quantity(), p.items().to_vec()))
                        .unwrap_or_default();
                    WireEntity {
                        public_key_id: entity.public_key_id().to_string(),
                        provider_id: entity.provider_id().to_string(),
                        field_patterns: WireFieldPatterns {
                            quantity: pattern_quantity,
                            items: patterns,
                        },
                    }
                })
                .collect();
            (entities.quantity(), items)
        })
        .unwrap_or_default();

    WirePayload {
        name: config.name().to_string(),
        caller_reference: config.caller_reference().to_string(),
        comment: config.comment().map(ToString::to_string),
        encryption_entities: WireEntities { quantity, items },
    }
}

/// Map an SDK failure onto the reconciler's error taxonomy
fn classify<E, R>(operation: &str, err: &SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{operation}: {}", DisplayErrorContext(err));
    match err {
        SdkError::ServiceError(_) => classify_code(err.code(), message),
        SdkError::ConstructionFailure(_) => RemoteError::Invalid(message),
        // Timeouts, dispatch failures and unparseable responses
        _ => RemoteError::Transient(message),
    }
}

fn classify_code(code: Option<&str>, message: String) -> RemoteError {
    match code.unwrap_or_default() {
        "NoSuchFieldLevelEncryptionProfile" => RemoteError::NotFound(message),
        "PreconditionFailed" | "InvalidIfMatchVersion" => {
            RemoteError::conflict(ConflictKind::StaleEtag, message)
        }
        "FieldLevelEncryptionProfileAlreadyExists" => {
            RemoteError::conflict(ConflictKind::NameTaken, message)
        }
        "FieldLevelEncryptionProfileInUse" => RemoteError::conflict(ConflictKind::InUse, message),
        "Throttling" | "ThrottlingException" | "RequestLimitExceeded" | "ServiceUnavailable"
        | "InternalError" | "InternalFailure" => RemoteError::Transient(message),
        _ => RemoteError::Invalid(message),
    }
}
