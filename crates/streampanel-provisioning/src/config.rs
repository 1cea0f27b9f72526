//! Provisioning configuration
//!
//! The transient per-job parameter bag the HTTP layer builds from the admin
//! request. Passed once into the processor and not retained; a service absent
//! from the bag means that stage is not applicable to the job.

use serde::{Deserialize, Serialize};

use streampanel_connector::ids::{PackageId, PanelId, ServerId, UserId};

/// The user record a job provisions, as the caller created it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Per-service configuration for one provisioning job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub plex: Option<PlexConfig>,
    pub iptv: Option<IptvConfig>,
    pub iptv_editor: Option<IptvEditorConfig>,
}

/// An explicit server/library selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSelection {
    pub server_id: ServerId,
    pub library_ids: Vec<String>,
}

/// Plex stage parameters.
///
/// Exactly one mode should be populated; precedence when several are present
/// is skip-provisioning, then manual selection, then package. None populated
/// fails the stage before any remote call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlexConfig {
    /// Package-based mode: expand this package to server/library mappings.
    pub package_id: Option<PackageId>,
    /// Manual selection mode: share exactly these server/library pairs.
    pub servers: Option<Vec<ServerSelection>>,
    /// Skip-provisioning mode: the user already has access (re-linking an
    /// existing Plex identity); persist these mappings without remote calls.
    pub skip_provisioning: Option<Vec<ServerSelection>>,
    /// Identity to share with.
    pub email: String,
    /// Welcome email template; absent means no email is sent.
    pub welcome_template_id: Option<i64>,
}

/// IPTV stage parameters. Two mutually exclusive modes: link-existing
/// (`is_linked_user` plus a known `line_id`) and create-new.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IptvConfig {
    pub panel_id: PanelId,

    /// Link-existing mode marker.
    #[serde(default)]
    pub is_linked_user: bool,
    /// Known panel line id, required for link-existing mode.
    pub line_id: Option<String>,
    /// Already-linked IPTV-Editor account to register immediately.
    pub linked_editor_account_id: Option<i64>,

    /// Create-new mode: explicit package, or best-effort matched from
    /// `connections` + `duration_months` when absent.
    pub package_id: Option<PackageId>,
    pub connections: Option<u32>,
    pub duration_months: Option<u32>,

    /// Desired credentials; panels generate them when absent.
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default)]
    pub bouquet_ids: Vec<i64>,
    #[serde(default)]
    pub is_trial: bool,
    pub notes: Option<String>,

    /// Playlist the editor account record is keyed under.
    pub playlist_id: Option<String>,
    /// Welcome email template; absent means no email is sent.
    pub welcome_template_id: Option<i64>,
}

/// IPTV-Editor stage parameters.
///
/// Credentials here are a fallback; freshly created IPTV credentials take
/// precedence when the IPTV stage produced them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IptvEditorConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub playlist_id: Option<String>,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_from_sparse_json() {
        let config: ProvisioningConfig = serde_json::from_str(
            r#"{"plex": {"package_id": 7, "email": "a@b.com"}}"#,
        )
        .unwrap();

        let plex = config.plex.unwrap();
        assert_eq!(plex.package_id, Some(PackageId::new(7)));
        assert_eq!(plex.email, "a@b.com");
        assert!(plex.servers.is_none());
        assert!(config.iptv.is_none());
        assert!(config.iptv_editor.is_none());
    }

    #[test]
    fn iptv_config_defaults() {
        let config: IptvConfig = serde_json::from_str(r#"{"panel_id": 9}"#).unwrap();
        assert_eq!(config.panel_id, PanelId::new(9));
        assert!(!config.is_linked_user);
        assert!(!config.is_trial);
        assert!(config.bouquet_ids.is_empty());
        assert!(config.package_id.is_none());
    }
}
