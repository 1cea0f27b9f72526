//! IPTV panel facade
//!
//! Owns the in-memory catalog of known panels and packages, wraps panel
//! account creation with the timeout policy, and provides the best-effort
//! account sync used after creation and after editor linking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::ids::{PackageId, PanelId};
use crate::traits::{IptvCatalogSource, IptvPanelApi};
use crate::types::{IptvPackage, IptvPanel, PanelAccount, PanelAccountInfo, PanelCreateRequest};
use crate::REMOTE_OP_TIMEOUT_SECS;

/// Facade over the remote IPTV panel API plus the panel/package catalog.
pub struct IptvService {
    api: Arc<dyn IptvPanelApi>,
    panels: RwLock<HashMap<PanelId, IptvPanel>>,
    packages: RwLock<HashMap<PackageId, IptvPackage>>,
}

impl IptvService {
    /// Load the facade, reading the panel and package catalogs once.
    pub async fn load(
        api: Arc<dyn IptvPanelApi>,
        source: &dyn IptvCatalogSource,
    ) -> ServiceResult<Self> {
        let service = Self {
            api,
            panels: RwLock::new(HashMap::new()),
            packages: RwLock::new(HashMap::new()),
        };
        service.reload(source).await?;
        Ok(service)
    }

    /// Rebuild both catalogs wholesale from the persisted configuration.
    pub async fn reload(&self, source: &dyn IptvCatalogSource) -> ServiceResult<()> {
        let panels: HashMap<PanelId, IptvPanel> = source
            .load_panels()
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let packages: HashMap<PackageId, IptvPackage> = source
            .load_packages()
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        info!(
            panels = panels.len(),
            packages = packages.len(),
            "Loaded IPTV catalog"
        );

        *self.panels.write().await = panels;
        *self.packages.write().await = packages;
        Ok(())
    }

    /// Look up a panel in the loaded catalog.
    pub async fn get_panel(&self, panel_id: PanelId) -> Option<IptvPanel> {
        self.panels.read().await.get(&panel_id).cloned()
    }

    /// Look up a package in the loaded catalog.
    pub async fn get_package(&self, package_id: PackageId) -> Option<IptvPackage> {
        self.packages.read().await.get(&package_id).cloned()
    }

    /// Best-effort package match for a panel, narrowing progressively.
    ///
    /// Preference order: exact connections + duration match, then
    /// connections only, then duration only, then the lowest-id package on
    /// the panel. `None` only when the panel has no packages at all.
    pub async fn find_package(
        &self,
        panel_id: PanelId,
        connections: Option<u32>,
        duration_months: Option<u32>,
    ) -> Option<IptvPackage> {
        let packages = self.packages.read().await;
        let candidates: Vec<&IptvPackage> = packages
            .values()
            .filter(|p| p.panel_id == panel_id)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        if let (Some(conns), Some(months)) = (connections, duration_months) {
            if let Some(exact) = candidates
                .iter()
                .find(|p| p.connections == conns && p.duration_months == months)
            {
                return Some((*exact).clone());
            }
        }
        if let Some(conns) = connections {
            if let Some(by_conns) = candidates.iter().find(|p| p.connections == conns) {
                return Some((*by_conns).clone());
            }
        }
        if let Some(months) = duration_months {
            if let Some(by_months) = candidates.iter().find(|p| p.duration_months == months) {
                return Some((*by_months).clone());
            }
        }
        candidates
            .iter()
            .min_by_key(|p| p.id.value())
            .map(|p| (*p).clone())
    }

    /// Create a subscriber line on a panel, with timeout normalization.
    #[instrument(skip(self, request), fields(username = ?request.username))]
    pub async fn create_user_on_panel(
        &self,
        panel_id: PanelId,
        request: &PanelCreateRequest,
    ) -> ServiceResult<PanelAccount> {
        let panel = self
            .get_panel(panel_id)
            .await
            .ok_or(ServiceError::PanelNotFound { panel_id })?;

        let window = Duration::from_secs(REMOTE_OP_TIMEOUT_SECS);
        match timeout(window, self.api.create_user(&panel, request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                operation: format!("create user on panel {panel_id}"),
                timeout_secs: REMOTE_OP_TIMEOUT_SECS,
            }),
        }
    }

    /// Best-effort fetch of current account info for a line.
    ///
    /// Any failure (unknown panel, remote error, timeout) is logged and
    /// yields `None`; callers proceed with whatever data they already have.
    pub async fn sync_account(&self, panel_id: PanelId, line_id: &str) -> Option<PanelAccountInfo> {
        let Some(panel) = self.get_panel(panel_id).await else {
            warn!(%panel_id, line_id, "Account sync requested for panel missing from catalog");
            return None;
        };

        let window = Duration::from_secs(REMOTE_OP_TIMEOUT_SECS);
        match timeout(window, self.api.get_user_info(&panel, line_id)).await {
            Ok(Ok(info)) => Some(info),
            Ok(Err(err)) => {
                warn!(%panel_id, line_id, error = %err, "Panel account sync failed");
                None
            }
            Err(_) => {
                warn!(%panel_id, line_id, timeout_secs = REMOTE_OP_TIMEOUT_SECS, "Panel account sync timed out");
                None
            }
        }
    }
}
