//! Field-Level Encryption Profile Controller Library
//!
//! Reconciles CloudFront field-level encryption profiles towards a declared
//! desired state: create, refresh with drift detection, update under etag
//! concurrency control, idempotent delete, and import.
//!
//! The control plane is reached through the [`provider::RemoteClient`] trait.
//! [`provider::CloudFrontProfiles`] talks to AWS; [`provider::InMemoryRemoteClient`]
//! runs everything in process with fault injection.

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod profile;
pub mod provider;
