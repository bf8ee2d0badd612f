//! One-time startup sequence executed before the server handles requests.
//!
//! The sequence is strictly ordered: dial the relational store and ensure the
//! catalog exists, bring the schema up to the shape this binary expects
//! (including a one-time data backfill when the versioning table first
//! appears), provision the object store bucket, and construct the
//! Kubernetes-facing collaborator clients. Transient infrastructure failures
//! are absorbed by [`RetryDialer`] up to a configured budget; everything else
//! is fatal and surfaces as a [`BootstrapError`], which the binary turns into
//! process termination. No partially initialized state ever escapes this
//! module.

mod backfill;
mod client_manager;
mod db;
mod error;
mod object_store;
mod provision;
mod retry;
mod schema;

pub use backfill::backfill_pipeline_versions;
pub use client_manager::ClientManager;
pub use db::connect_database;
pub use error::{BootstrapError, BootstrapResult};
pub use object_store::{ObjectStoreHandle, provision_object_store};
pub use retry::RetryDialer;
pub use schema::SchemaMigrator;
