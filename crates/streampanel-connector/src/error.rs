//! Facade error types
//!
//! Hard faults only. Expected remote failures (an API refusing a share, a
//! panel rejecting a create) are normalized into result values such as
//! [`crate::types::ShareOutcome`] rather than errors, so callers can
//! aggregate partial failures without unwinding.

use thiserror::Error;

use crate::ids::{PackageId, PanelId, ServerId};

/// Error that can occur during facade operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A single remote operation exceeded its bounded window.
    #[error("{operation} timed out after {timeout_secs} seconds")]
    Timeout { operation: String, timeout_secs: u64 },

    /// Remote API returned an error response.
    #[error("remote API error: {message}")]
    Api { message: String },

    /// Transport-level fault (connection refused, spawn failure).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Plex server is not present in the loaded catalog.
    #[error("Plex server not found: {server_id}")]
    ServerNotFound { server_id: ServerId },

    /// Package is not present in the loaded catalog.
    #[error("package not found: {package_id}")]
    PackageNotFound { package_id: PackageId },

    /// IPTV panel is not present in the loaded catalog.
    #[error("IPTV panel not found: {panel_id}")]
    PanelNotFound { panel_id: PanelId },

    /// Caller supplied an unusable configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Persistence-layer failure from one of the backing stores.
    #[error("store error: {message}")]
    Store { message: String },
}

impl ServiceError {
    /// Build an API error from any displayable message.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Build a store error from any displayable message.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

/// Result type for facade operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
