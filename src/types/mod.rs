//! Identifier newtypes shared across the crate.

pub mod ids;

pub use ids::{DeliveryId, InstallationId, RepoId};
