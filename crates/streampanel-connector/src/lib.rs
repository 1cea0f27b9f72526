//! # Streampanel Connector Framework
//!
//! Capability traits and facades for the external services the subscription
//! panel provisions against: Plex media servers, IPTV panels, and the
//! IPTV-Editor. Persistence collaborators (user store, share store,
//! service-request store, editor-account store) are traits here as well, so
//! the provisioning pipeline stays decoupled from the database layer.
//!
//! The two stateful facades ([`plex::PlexService`], [`iptv::IptvService`])
//! each own an in-memory catalog of known servers/panels and packages,
//! loaded once from persisted configuration and rebuilt wholesale on an
//! explicit reload. Remote operations are bounded by
//! [`REMOTE_OP_TIMEOUT_SECS`]; a timeout fails that one operation, never the
//! whole stage.

pub mod error;
pub mod ids;
pub mod iptv;
pub mod plex;
pub mod traits;
pub mod types;

pub use error::{ServiceError, ServiceResult};
pub use ids::{JobId, PackageId, PanelId, ServerId, UserId};
pub use iptv::IptvService;
pub use plex::PlexService;
pub use types::ServiceKind;

/// Bounded window for any single remote operation, in seconds.
///
/// A call exceeding this is treated as a failure for that one server or
/// operation, not a fatal error for the whole stage.
pub const REMOTE_OP_TIMEOUT_SECS: u64 = 30;
