//! Plex facade
//!
//! Owns the in-memory catalog of known Plex servers and packages and wraps
//! the remote share operation with the per-operation timeout policy. The
//! catalog is loaded once at initialization and rebuilt wholesale on an
//! explicit reload; it is never kept continuously in sync.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::ids::{PackageId, ServerId, UserId};
use crate::traits::{PlexApi, PlexCatalogSource};
use crate::types::{PackageShareReport, PlexPackage, PlexServer, ServerShareResult, ShareOutcome};
use crate::REMOTE_OP_TIMEOUT_SECS;

/// Facade over the remote Plex API plus the persisted server/package catalog.
pub struct PlexService {
    api: Arc<dyn PlexApi>,
    servers: RwLock<HashMap<ServerId, PlexServer>>,
    packages: RwLock<HashMap<PackageId, PlexPackage>>,
}

impl PlexService {
    /// Load the facade, reading the server and package catalogs once.
    pub async fn load(
        api: Arc<dyn PlexApi>,
        source: &dyn PlexCatalogSource,
    ) -> ServiceResult<Self> {
        let service = Self {
            api,
            servers: RwLock::new(HashMap::new()),
            packages: RwLock::new(HashMap::new()),
        };
        service.reload(source).await?;
        Ok(service)
    }

    /// Rebuild both catalogs wholesale from the persisted configuration.
    ///
    /// Callers must not issue share operations concurrently with a reload;
    /// reload is a rare, explicit action, not part of steady-state job
    /// processing.
    pub async fn reload(&self, source: &dyn PlexCatalogSource) -> ServiceResult<()> {
        let servers: HashMap<ServerId, PlexServer> = source
            .load_servers()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let packages: HashMap<PackageId, PlexPackage> = source
            .load_packages()
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        info!(
            servers = servers.len(),
            packages = packages.len(),
            "Loaded Plex catalog"
        );

        *self.servers.write().await = servers;
        *self.packages.write().await = packages;
        Ok(())
    }

    /// Look up a server in the loaded catalog.
    pub async fn get_server(&self, server_id: ServerId) -> Option<PlexServer> {
        self.servers.read().await.get(&server_id).cloned()
    }

    /// Look up a package in the loaded catalog.
    pub async fn get_package(&self, package_id: PackageId) -> Option<PlexPackage> {
        self.packages.read().await.get(&package_id).cloned()
    }

    /// Share libraries with an identity on a single server.
    ///
    /// Unknown server, remote refusal and timeout all normalize to a failed
    /// [`ShareOutcome`]; this never returns an error, so parallel callers can
    /// aggregate without cancelling siblings.
    #[instrument(skip(self, library_ids), fields(libraries = library_ids.len()))]
    pub async fn share_libraries_on_server(
        &self,
        email: &str,
        server_id: ServerId,
        library_ids: &[String],
    ) -> ShareOutcome {
        let Some(server) = self.get_server(server_id).await else {
            warn!(%server_id, "Share requested for server missing from catalog");
            return ShareOutcome::failure(format!("Plex server not found: {server_id}"));
        };

        let window = Duration::from_secs(REMOTE_OP_TIMEOUT_SECS);
        match timeout(window, self.api.share_libraries(email, &server, library_ids)).await {
            Ok(Ok(())) => {
                debug!(%server_id, server = %server.name, "Shared libraries on server");
                ShareOutcome::success()
            }
            Ok(Err(err)) => {
                warn!(%server_id, error = %err, "Share failed on server");
                ShareOutcome::failure(err.to_string())
            }
            Err(_) => {
                warn!(%server_id, timeout_secs = REMOTE_OP_TIMEOUT_SECS, "Share timed out");
                ShareOutcome::failure(format!(
                    "share on server {server_id} timed out after {REMOTE_OP_TIMEOUT_SECS} seconds"
                ))
            }
        }
    }

    /// Expand a package to its server/library mappings and share them all.
    ///
    /// The per-server shares run concurrently; one failure never cancels the
    /// others, and the report carries every per-server result.
    #[instrument(skip(self))]
    pub async fn share_libraries_by_package(
        &self,
        email: &str,
        package_id: PackageId,
        user_id: UserId,
    ) -> ServiceResult<PackageShareReport> {
        let package = self
            .get_package(package_id)
            .await
            .ok_or(ServiceError::PackageNotFound { package_id })?;

        let shares = package.mappings.iter().map(|mapping| async move {
            let outcome = self
                .share_libraries_on_server(email, mapping.server_id, &mapping.library_ids)
                .await;
            ServerShareResult {
                server_id: mapping.server_id,
                success: outcome.success,
                error: outcome.error,
            }
        });

        let results = join_all(shares).await;
        let all_success = results.iter().all(|r| r.success);

        info!(
            %package_id,
            %user_id,
            servers = results.len(),
            all_success,
            "Package share fan-out finished"
        );

        Ok(PackageShareReport {
            all_success,
            results,
        })
    }
}
