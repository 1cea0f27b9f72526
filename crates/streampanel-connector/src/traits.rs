//! Capability traits
//!
//! One trait per external collaborator. The provisioning pipeline only ever
//! talks to remote services and persistence through these seams, so tests can
//! substitute hand-rolled mocks and the HTTP layer can wire real clients at
//! startup.

use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::ids::{PanelId, ServerId, UserId};
use crate::types::{
    EditorAccount, EditorAccountRecord, EditorCreateRequest, IptvPackage, IptvPanel,
    IptvUserUpdate, PanelAccount, PanelAccountInfo, PanelCreateRequest, PlexPackage, PlexServer,
    ServiceKind,
};

/// Remote Plex API operations.
#[async_trait]
pub trait PlexApi: Send + Sync {
    /// Share the given library sections with an identity on one server.
    ///
    /// An expected remote refusal is an `Err` here; the facade normalizes it
    /// into a [`crate::types::ShareOutcome`] before callers see it.
    async fn share_libraries(
        &self,
        email: &str,
        server: &PlexServer,
        library_ids: &[String],
    ) -> ServiceResult<()>;
}

/// Remote IPTV panel API operations.
#[async_trait]
pub trait IptvPanelApi: Send + Sync {
    /// Create a subscriber line on the panel.
    async fn create_user(
        &self,
        panel: &IptvPanel,
        request: &PanelCreateRequest,
    ) -> ServiceResult<PanelAccount>;

    /// Fetch current account info for a line.
    async fn get_user_info(
        &self,
        panel: &IptvPanel,
        line_id: &str,
    ) -> ServiceResult<PanelAccountInfo>;
}

/// Remote IPTV-Editor API operations.
#[async_trait]
pub trait IptvEditorApi: Send + Sync {
    /// Create an editor account.
    async fn create_user(&self, request: &EditorCreateRequest) -> ServiceResult<EditorAccount>;
}

/// Outbound email capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the configured welcome email for a freshly provisioned service.
    async fn send_welcome(
        &self,
        user_id: UserId,
        kind: ServiceKind,
        template_id: Option<i64>,
    ) -> ServiceResult<()>;
}

/// User/account store operations the pipeline needs.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist IPTV credentials, connections and expiration on the user row.
    async fn apply_iptv_provision(
        &self,
        user_id: UserId,
        update: &IptvUserUpdate,
    ) -> ServiceResult<()>;

    /// Toggle the IPTV-Editor enablement flag.
    async fn set_editor_enabled(&self, user_id: UserId, enabled: bool) -> ServiceResult<()>;
}

/// Persisted record of a library share granted to a user.
#[async_trait]
pub trait ShareStore: Send + Sync {
    async fn record_share(
        &self,
        user_id: UserId,
        server_id: ServerId,
        library_ids: &[String],
    ) -> ServiceResult<()>;
}

/// Portal payment/service-request store.
#[async_trait]
pub trait ServiceRequestStore: Send + Sync {
    /// Mark all pending/verified requests for this user + service as
    /// completed. Returns the number of rows affected.
    async fn complete_pending(&self, user_id: UserId, kind: ServiceKind) -> ServiceResult<u64>;
}

/// Persisted IPTV-Editor account records.
#[async_trait]
pub trait EditorAccountStore: Send + Sync {
    /// Idempotent upsert keyed by user + playlist.
    async fn upsert(
        &self,
        user_id: UserId,
        playlist_id: Option<&str>,
        record: &EditorAccountRecord,
    ) -> ServiceResult<()>;
}

/// Persisted Plex configuration the facade loads its catalogs from.
#[async_trait]
pub trait PlexCatalogSource: Send + Sync {
    async fn load_servers(&self) -> ServiceResult<Vec<PlexServer>>;
    async fn load_packages(&self) -> ServiceResult<Vec<PlexPackage>>;
}

/// Persisted IPTV configuration the facade loads its catalogs from.
#[async_trait]
pub trait IptvCatalogSource: Send + Sync {
    async fn load_panels(&self) -> ServiceResult<Vec<IptvPanel>>;
    async fn load_packages(&self) -> ServiceResult<Vec<IptvPackage>>;
}
