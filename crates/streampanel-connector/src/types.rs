//! Facade type definitions
//!
//! Catalog entries, normalized operation results, and the request/response
//! shapes exchanged with the remote media services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ids::{PackageId, PanelId, ServerId};

/// Kind of subscription service a user can be provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Plex media server access.
    Plex,
    /// IPTV panel subscription.
    Iptv,
}

impl ServiceKind {
    /// Get the string representation used in persisted records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Plex => "plex",
            ServiceKind::Iptv => "iptv",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = ParseServiceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plex" => Ok(ServiceKind::Plex),
            "iptv" => Ok(ServiceKind::Iptv),
            _ => Err(ParseServiceKindError(s.to_string())),
        }
    }
}

/// Error parsing a service kind from a string.
#[derive(Debug, Clone, Error)]
#[error("invalid service kind '{0}', expected: plex, iptv")]
pub struct ParseServiceKindError(String);

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// A known Plex media server from the persisted configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexServer {
    /// Server id in the persisted configuration.
    pub id: ServerId,
    /// Display name.
    pub name: String,
    /// Machine identifier on the Plex side.
    pub machine_id: String,
}

/// One server's library selection within a Plex package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMapping {
    /// Target server.
    pub server_id: ServerId,
    /// Library section ids to share.
    pub library_ids: Vec<String>,
}

/// A named bundle of Plex server/library selections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexPackage {
    pub id: PackageId,
    pub name: String,
    /// Per-server library selections this package expands to.
    pub mappings: Vec<PackageMapping>,
}

/// A known IPTV panel from the persisted configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IptvPanel {
    pub id: PanelId,
    pub name: String,
}

/// A purchasable IPTV package on a panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IptvPackage {
    pub id: PackageId,
    pub panel_id: PanelId,
    pub name: String,
    /// Simultaneous connections the package grants.
    pub connections: u32,
    /// Subscription length in months.
    pub duration_months: u32,
}

// ---------------------------------------------------------------------------
// Normalized operation results
// ---------------------------------------------------------------------------

/// Normalized outcome of a single per-server share operation.
///
/// Expected remote failures surface here, not as errors, so parallel
/// siblings are never cancelled by one failing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShareOutcome {
    /// Successful share.
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Failed share with an operator-readable reason.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Per-server result of a package-expansion share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerShareResult {
    pub server_id: ServerId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of sharing a whole package across its servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageShareReport {
    /// True only when every per-server share succeeded.
    pub all_success: bool,
    pub results: Vec<ServerShareResult>,
}

impl PackageShareReport {
    /// Servers whose share failed.
    #[must_use]
    pub fn failed_servers(&self) -> Vec<ServerId> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.server_id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// IPTV panel request/response shapes
// ---------------------------------------------------------------------------

/// Request to create a subscriber line on an IPTV panel.
///
/// Credentials are optional; panels generate them when absent and report the
/// effective values back in [`PanelAccount`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelCreateRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub package: IptvPackage,
    pub bouquet_ids: Vec<i64>,
    pub is_trial: bool,
    pub notes: Option<String>,
}

/// Response from a panel account creation.
///
/// `expiration` is whatever the panel emitted; panels disagree on both the
/// field and the format, so it stays loosely typed until the expiration
/// heuristics interpret it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelAccount {
    /// Line identifier on the panel. Absent means the create did not take.
    pub line_id: Option<String>,
    pub username: String,
    pub password: String,
    pub connections: Option<u32>,
    pub expiration: Option<Value>,
}

/// Account info as reported by a panel lookup.
///
/// Panels expose the expiry under different names (`expiration`,
/// `expiry_date`, `exp`); all three are carried so callers can apply the
/// observed fallback order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelAccountInfo {
    pub max_connections: Option<u32>,
    pub expiration: Option<Value>,
    pub expiry_date: Option<Value>,
    pub exp: Option<Value>,
    pub username: Option<String>,
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// IPTV-Editor shapes
// ---------------------------------------------------------------------------

/// Request to create an IPTV-Editor account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorCreateRequest {
    pub username: String,
    pub password: String,
    pub playlist_id: Option<String>,
    pub note: Option<String>,
}

/// Response from an IPTV-Editor account creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorAccount {
    /// Editor-side account id. Absent means the create did not take.
    pub id: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Persisted IPTV-Editor account record, upserted keyed by user + playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorAccountRecord {
    pub editor_id: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub max_connections: Option<u32>,
    pub expiration: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// User record updates
// ---------------------------------------------------------------------------

/// Partial update of a user's IPTV fields. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IptvUserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub line_id: Option<String>,
    pub connections: Option<u32>,
    pub expiration: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_kind_roundtrip() {
        assert_eq!("plex".parse::<ServiceKind>().unwrap(), ServiceKind::Plex);
        assert_eq!("IPTV".parse::<ServiceKind>().unwrap(), ServiceKind::Iptv);
        assert!("vod".parse::<ServiceKind>().is_err());
        assert_eq!(ServiceKind::Iptv.to_string(), "iptv");
    }

    #[test]
    fn share_outcome_constructors() {
        let ok = ShareOutcome::success();
        assert!(ok.success);
        assert!(ok.error.is_none());

        let failed = ShareOutcome::failure("library not found");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("library not found"));
    }

    #[test]
    fn report_failed_servers() {
        let report = PackageShareReport {
            all_success: false,
            results: vec![
                ServerShareResult {
                    server_id: ServerId::new(1),
                    success: true,
                    error: None,
                },
                ServerShareResult {
                    server_id: ServerId::new(2),
                    success: false,
                    error: Some("timeout".to_string()),
                },
            ],
        };
        assert_eq!(report.failed_servers(), vec![ServerId::new(2)]);
    }
}
