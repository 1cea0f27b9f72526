//! Provisioning processor
//!
//! Drives one job's Plex, IPTV and IPTV-Editor stages to completion,
//! writing every outcome into the job registry. Nothing escapes `run`: a
//! sub-workflow error becomes a failed stage status and the next independent
//! sub-workflow still runs. The IPTV stage must finish before the
//! IPTV-Editor stage because the editor account is created with the panel
//! credentials the IPTV stage captured.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use streampanel_connector::ids::{JobId, PackageId, PanelId};
use streampanel_connector::traits::{
    EditorAccountStore, IptvEditorApi, Mailer, ServiceRequestStore, ShareStore, UserStore,
};
use streampanel_connector::types::{
    EditorAccountRecord, EditorCreateRequest, IptvUserUpdate, PanelCreateRequest, ServiceKind,
};
use streampanel_connector::{IptvService, PlexService};

use crate::config::{
    IptvConfig, IptvEditorConfig, PlexConfig, ProvisioningConfig, ServerSelection, UserData,
};
use crate::effects::best_effort;
use crate::expiration::{expiration_from_info, expiration_from_months, parse_expiration};
use crate::registry::JobRegistry;
use crate::stage::{ProvisionStage, StageState};

/// Panel credentials captured by the IPTV stage for the editor stage.
#[derive(Debug, Clone)]
struct IptvCredentials {
    username: String,
    password: String,
    line_id: String,
}

/// What the IPTV sub-workflow handed to the editor sub-workflow.
struct IptvOutcome {
    /// Whether an IPTV sub-workflow was requested at all.
    requested: bool,
    /// Usable panel credentials, when provisioning yielded them.
    credentials: Option<IptvCredentials>,
    /// The editor stage was already concluded (nested completion or
    /// dependency short-circuit); the editor sub-workflow must not run.
    editor_done: bool,
    /// Panel to re-sync against after editor creation.
    panel_id: Option<PanelId>,
}

/// Successful result of one IPTV mode, before it is written to the registry.
struct IptvSuccess {
    message: String,
    credentials: Option<IptvCredentials>,
    editor_done: bool,
}

/// Orchestrates the provisioning stages for one job at a time.
///
/// Shared across jobs behind an `Arc`; each job runs a single logical
/// invocation of [`ProvisioningProcessor::run`], so per-stage registry
/// writes are last-writer-wins without further coordination.
pub struct ProvisioningProcessor {
    registry: Arc<JobRegistry>,
    plex: Arc<PlexService>,
    iptv: Arc<IptvService>,
    editor: Arc<dyn IptvEditorApi>,
    mailer: Arc<dyn Mailer>,
    users: Arc<dyn UserStore>,
    shares: Arc<dyn ShareStore>,
    requests: Arc<dyn ServiceRequestStore>,
    editor_accounts: Arc<dyn EditorAccountStore>,
}

impl ProvisioningProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<JobRegistry>,
        plex: Arc<PlexService>,
        iptv: Arc<IptvService>,
        editor: Arc<dyn IptvEditorApi>,
        mailer: Arc<dyn Mailer>,
        users: Arc<dyn UserStore>,
        shares: Arc<dyn ShareStore>,
        requests: Arc<dyn ServiceRequestStore>,
        editor_accounts: Arc<dyn EditorAccountStore>,
    ) -> Self {
        Self {
            registry,
            plex,
            iptv,
            editor,
            mailer,
            users,
            shares,
            requests,
            editor_accounts,
        }
    }

    /// Fire-and-forget entry point for the HTTP layer.
    ///
    /// The handler returns the job id immediately; this task owns the `run`
    /// call and nothing awaits it, so `run` itself is the error boundary.
    pub fn spawn(
        self: &Arc<Self>,
        job_id: JobId,
        user: UserData,
        config: ProvisioningConfig,
    ) -> JoinHandle<()> {
        let processor = Arc::clone(self);
        tokio::spawn(async move {
            processor.run(job_id, &user, config).await;
        })
    }

    /// Run every applicable stage for one job. Never returns an error; the
    /// registry is the sole channel for outcomes.
    #[instrument(skip(self, user, config), fields(user_id = %user.id))]
    pub async fn run(&self, job_id: JobId, user: &UserData, config: ProvisioningConfig) {
        info!(%job_id, "Provisioning started");

        // The caller created the user row before queueing the job.
        self.registry
            .update_stage(
                &job_id,
                ProvisionStage::User,
                StageState::Completed,
                "User record created",
            )
            .await;

        self.run_plex(&job_id, user, config.plex.as_ref()).await;
        let iptv = self.run_iptv(&job_id, user, config.iptv.as_ref()).await;
        self.run_iptv_editor(&job_id, user, config.iptv_editor.as_ref(), &iptv)
            .await;

        info!(%job_id, "Provisioning finished");
    }

    // -----------------------------------------------------------------------
    // Plex sub-workflow
    // -----------------------------------------------------------------------

    async fn run_plex(&self, job_id: &JobId, user: &UserData, config: Option<&PlexConfig>) {
        let Some(config) = config else {
            // Keeps the roll-up rule correct for jobs without Plex.
            self.registry
                .update_stage(
                    job_id,
                    ProvisionStage::Plex,
                    StageState::Completed,
                    "Plex not enabled",
                )
                .await;
            return;
        };

        self.registry
            .update_stage(
                job_id,
                ProvisionStage::Plex,
                StageState::Processing,
                "Sharing Plex libraries",
            )
            .await;

        match self.provision_plex(user, config).await {
            Ok(message) => {
                self.registry
                    .update_stage(job_id, ProvisionStage::Plex, StageState::Completed, message)
                    .await;
                self.run_side_actions(user, ServiceKind::Plex, config.welcome_template_id)
                    .await;
            }
            Err(message) => {
                self.registry
                    .update_stage(job_id, ProvisionStage::Plex, StageState::Failed, message)
                    .await;
            }
        }
    }

    async fn provision_plex(&self, user: &UserData, config: &PlexConfig) -> Result<String, String> {
        if let Some(shares) = &config.skip_provisioning {
            // Re-linking an existing Plex identity: persist the supplied
            // mappings without touching the remote API.
            for selection in shares {
                self.shares
                    .record_share(user.id, selection.server_id, &selection.library_ids)
                    .await
                    .map_err(|err| err.to_string())?;
            }
            return Ok(format!(
                "Linked existing Plex access on {} server(s)",
                shares.len()
            ));
        }

        if let Some(selections) = &config.servers {
            return self.share_manual(user, config, selections).await;
        }

        if let Some(package_id) = config.package_id {
            return self.share_by_package(user, config, package_id).await;
        }

        Err("No package or server configuration provided".to_string())
    }

    /// Manual selection mode: share every server concurrently; one failure
    /// never cancels siblings, and succeeded shares are persisted even when
    /// the stage ends failed.
    async fn share_manual(
        &self,
        user: &UserData,
        config: &PlexConfig,
        selections: &[ServerSelection],
    ) -> Result<String, String> {
        let shares = selections.iter().map(|selection| async move {
            let outcome = self
                .plex
                .share_libraries_on_server(&config.email, selection.server_id, &selection.library_ids)
                .await;
            (selection, outcome)
        });

        let mut errors = Vec::new();
        for (selection, outcome) in join_all(shares).await {
            if outcome.success {
                if let Err(err) = self
                    .shares
                    .record_share(user.id, selection.server_id, &selection.library_ids)
                    .await
                {
                    errors.push(format!(
                        "server {}: failed to record share: {err}",
                        selection.server_id
                    ));
                }
            } else {
                errors.push(format!(
                    "server {}: {}",
                    selection.server_id,
                    outcome.error.unwrap_or_else(|| "unknown error".to_string())
                ));
            }
        }

        if errors.is_empty() {
            Ok(format!(
                "Libraries shared on {} server(s)",
                selections.len()
            ))
        } else {
            Err(format!(
                "Plex sharing failed on {} of {} server(s): {}",
                errors.len(),
                selections.len(),
                errors.join("; ")
            ))
        }
    }

    /// Package-based mode: the facade expands and parallelizes; successful
    /// per-server shares are persisted regardless of the aggregate outcome.
    async fn share_by_package(
        &self,
        user: &UserData,
        config: &PlexConfig,
        package_id: PackageId,
    ) -> Result<String, String> {
        let package = self
            .plex
            .get_package(package_id)
            .await
            .ok_or_else(|| format!("Plex package not found: {package_id}"))?;

        let report = self
            .plex
            .share_libraries_by_package(&config.email, package_id, user.id)
            .await
            .map_err(|err| err.to_string())?;

        for result in &report.results {
            if !result.success {
                continue;
            }
            let Some(mapping) = package
                .mappings
                .iter()
                .find(|m| m.server_id == result.server_id)
            else {
                continue;
            };
            if let Err(err) = self
                .shares
                .record_share(user.id, result.server_id, &mapping.library_ids)
                .await
            {
                warn!(user_id = %user.id, server_id = %result.server_id, error = %err,
                    "Failed to record package share");
            }
        }

        if report.all_success {
            Ok(format!(
                "Libraries shared via package '{}' on {} server(s)",
                package.name,
                report.results.len()
            ))
        } else {
            let errors: Vec<String> = report
                .results
                .iter()
                .filter(|r| !r.success)
                .map(|r| {
                    format!(
                        "server {}: {}",
                        r.server_id,
                        r.error.clone().unwrap_or_else(|| "unknown error".to_string())
                    )
                })
                .collect();
            Err(format!(
                "Plex sharing failed on {} of {} server(s): {}",
                errors.len(),
                report.results.len(),
                errors.join("; ")
            ))
        }
    }

    // -----------------------------------------------------------------------
    // IPTV sub-workflow
    // -----------------------------------------------------------------------

    async fn run_iptv(
        &self,
        job_id: &JobId,
        user: &UserData,
        config: Option<&IptvConfig>,
    ) -> IptvOutcome {
        let Some(config) = config else {
            // Dependency short-circuit: without IPTV there is nothing for
            // the editor stage to link against either.
            self.registry
                .update_stage(
                    job_id,
                    ProvisionStage::Iptv,
                    StageState::Completed,
                    "IPTV not enabled",
                )
                .await;
            self.registry
                .update_stage(
                    job_id,
                    ProvisionStage::IptvEditor,
                    StageState::Completed,
                    "IPTV not enabled",
                )
                .await;
            return IptvOutcome {
                requested: false,
                credentials: None,
                editor_done: true,
                panel_id: None,
            };
        };

        self.registry
            .update_stage(
                job_id,
                ProvisionStage::Iptv,
                StageState::Processing,
                "Provisioning IPTV account",
            )
            .await;

        let result = if config.is_linked_user && config.line_id.is_some() {
            self.link_existing_iptv(job_id, user, config).await
        } else {
            self.create_iptv(user, config).await
        };

        match result {
            Ok(success) => {
                self.registry
                    .update_stage(
                        job_id,
                        ProvisionStage::Iptv,
                        StageState::Completed,
                        success.message,
                    )
                    .await;
                IptvOutcome {
                    requested: true,
                    credentials: success.credentials,
                    editor_done: success.editor_done,
                    panel_id: Some(config.panel_id),
                }
            }
            Err(message) => {
                self.registry
                    .update_stage(job_id, ProvisionStage::Iptv, StageState::Failed, message)
                    .await;
                IptvOutcome {
                    requested: true,
                    credentials: None,
                    editor_done: false,
                    panel_id: Some(config.panel_id),
                }
            }
        }
    }

    /// Link-existing mode: reuse an already-existing panel line instead of
    /// creating one. The fetch is best-effort; supplied credentials carry
    /// the day when the panel cannot be reached.
    async fn link_existing_iptv(
        &self,
        job_id: &JobId,
        user: &UserData,
        config: &IptvConfig,
    ) -> Result<IptvSuccess, String> {
        let line_id = config
            .line_id
            .clone()
            .ok_or_else(|| "Link-existing mode requires a line id".to_string())?;

        let info = self.iptv.sync_account(config.panel_id, &line_id).await;

        let username = config
            .username
            .clone()
            .or_else(|| info.as_ref().and_then(|i| i.username.clone()));
        let password = config
            .password
            .clone()
            .or_else(|| info.as_ref().and_then(|i| i.password.clone()));
        let connections = info
            .as_ref()
            .and_then(|i| i.max_connections)
            .or(config.connections);
        let expiration = info.as_ref().and_then(expiration_from_info);

        self.users
            .apply_iptv_provision(
                user.id,
                &IptvUserUpdate {
                    username: username.clone(),
                    password: password.clone(),
                    line_id: Some(line_id.clone()),
                    connections,
                    expiration,
                },
            )
            .await
            .map_err(|err| err.to_string())?;

        // A supplied editor account id concludes the editor stage here,
        // without waiting for the separate sub-workflow.
        let mut editor_done = false;
        if let Some(editor_id) = config.linked_editor_account_id {
            let record = EditorAccountRecord {
                editor_id,
                username: username.clone(),
                password: password.clone(),
                max_connections: connections,
                expiration,
            };
            match self
                .editor_accounts
                .upsert(user.id, config.playlist_id.as_deref(), &record)
                .await
            {
                Ok(()) => {
                    if let Err(err) = self.users.set_editor_enabled(user.id, true).await {
                        warn!(user_id = %user.id, error = %err, "Failed to enable editor flag");
                    }
                    self.registry
                        .update_stage(
                            job_id,
                            ProvisionStage::IptvEditor,
                            StageState::Completed,
                            "Linked existing IPTV Editor account",
                        )
                        .await;
                    editor_done = true;
                }
                Err(err) => {
                    warn!(user_id = %user.id, editor_id, error = %err,
                        "Failed to register linked editor account");
                }
            }
        }

        let credentials = match (username, password) {
            (Some(u), Some(p)) => Some(IptvCredentials {
                username: u,
                password: p,
                line_id: line_id.clone(),
            }),
            _ => None,
        };

        Ok(IptvSuccess {
            message: format!("Linked existing IPTV line {line_id}"),
            credentials,
            editor_done,
        })
    }

    /// Create-new mode: resolve a package, create the panel account, sync it
    /// back, persist the results.
    async fn create_iptv(&self, user: &UserData, config: &IptvConfig) -> Result<IptvSuccess, String> {
        let package = match config.package_id {
            Some(package_id) => self.iptv.get_package(package_id).await,
            None => {
                self.iptv
                    .find_package(config.panel_id, config.connections, config.duration_months)
                    .await
            }
        };
        let Some(package) = package else {
            return Err(format!(
                "IPTV package not found for panel {}",
                config.panel_id
            ));
        };

        let request = PanelCreateRequest {
            username: config.username.clone(),
            password: config.password.clone(),
            package: package.clone(),
            bouquet_ids: config.bouquet_ids.clone(),
            is_trial: config.is_trial,
            notes: config.notes.clone(),
        };
        let account = self
            .iptv
            .create_user_on_panel(config.panel_id, &request)
            .await
            .map_err(|err| err.to_string())?;

        let Some(line_id) = account.line_id.clone().filter(|l| !l.is_empty()) else {
            return Err("IPTV creation failed - no line_id returned".to_string());
        };

        // The just-created response may be incomplete or eventually
        // consistent; a fresh fetch is authoritative when it succeeds.
        let synced = self.iptv.sync_account(config.panel_id, &line_id).await;

        let expiration = synced
            .as_ref()
            .and_then(expiration_from_info)
            .or_else(|| account.expiration.as_ref().and_then(parse_expiration))
            .or_else(|| expiration_from_months(package.duration_months));
        let connections = synced
            .as_ref()
            .and_then(|i| i.max_connections)
            .or(account.connections)
            .or(Some(package.connections));

        self.users
            .apply_iptv_provision(
                user.id,
                &IptvUserUpdate {
                    username: Some(account.username.clone()),
                    password: Some(account.password.clone()),
                    line_id: Some(line_id.clone()),
                    connections,
                    expiration,
                },
            )
            .await
            .map_err(|err| err.to_string())?;

        self.run_side_actions(user, ServiceKind::Iptv, config.welcome_template_id)
            .await;

        // Operationally necessary for the admin to relay to the end user;
        // only an authenticated admin ever reads this.
        let message = format!(
            "IPTV account created. Username: {}, Password: {}, Connections: {}, Expires: {}",
            account.username,
            account.password,
            connections.map_or_else(|| "unknown".to_string(), |c| c.to_string()),
            expiration.map_or_else(
                || "unknown".to_string(),
                |e| e.format("%Y-%m-%d %H:%M:%S").to_string()
            ),
        );

        Ok(IptvSuccess {
            message,
            credentials: Some(IptvCredentials {
                username: account.username,
                password: account.password,
                line_id,
            }),
            editor_done: false,
        })
    }

    // -----------------------------------------------------------------------
    // IPTV-Editor sub-workflow
    // -----------------------------------------------------------------------

    async fn run_iptv_editor(
        &self,
        job_id: &JobId,
        user: &UserData,
        config: Option<&IptvEditorConfig>,
        iptv: &IptvOutcome,
    ) {
        let Some(config) = config else {
            return;
        };

        if iptv.editor_done {
            debug!(%job_id, "Editor stage already concluded by the IPTV stage");
            return;
        }

        // The one hard inter-stage dependency: creating an editor account
        // without panel credentials would silently produce a broken account.
        if iptv.requested && iptv.credentials.is_none() {
            self.registry
                .update_stage(
                    job_id,
                    ProvisionStage::IptvEditor,
                    StageState::Failed,
                    "Skipped - IPTV panel provisioning failed",
                )
                .await;
            return;
        }

        self.registry
            .update_stage(
                job_id,
                ProvisionStage::IptvEditor,
                StageState::Processing,
                "Creating IPTV Editor account",
            )
            .await;

        match self.create_editor(user, config, iptv).await {
            Ok(message) => {
                self.registry
                    .update_stage(
                        job_id,
                        ProvisionStage::IptvEditor,
                        StageState::Completed,
                        message,
                    )
                    .await;
            }
            Err(message) => {
                self.registry
                    .update_stage(
                        job_id,
                        ProvisionStage::IptvEditor,
                        StageState::Failed,
                        message,
                    )
                    .await;
            }
        }
    }

    async fn create_editor(
        &self,
        user: &UserData,
        config: &IptvEditorConfig,
        iptv: &IptvOutcome,
    ) -> Result<String, String> {
        // Freshly created panel credentials take precedence over explicitly
        // supplied editor credentials.
        let (username, password) = match &iptv.credentials {
            Some(creds) => (creds.username.clone(), creds.password.clone()),
            None => match (config.username.clone(), config.password.clone()) {
                (Some(u), Some(p)) => (u, p),
                _ => return Err("No credentials available for IPTV Editor".to_string()),
            },
        };

        let request = EditorCreateRequest {
            username: username.clone(),
            password: password.clone(),
            playlist_id: config.playlist_id.clone(),
            note: config.note.clone(),
        };
        let account = self
            .editor
            .create_user(&request)
            .await
            .map_err(|err| err.to_string())?;

        let Some(editor_id) = account.id else {
            return Err("IPTV Editor creation failed - no ID returned".to_string());
        };

        let mut record = EditorAccountRecord {
            editor_id,
            username: Some(account.username.unwrap_or(username)),
            password: Some(account.password.unwrap_or(password)),
            max_connections: None,
            expiration: None,
        };
        self.editor_accounts
            .upsert(user.id, config.playlist_id.as_deref(), &record)
            .await
            .map_err(|err| err.to_string())?;
        self.users
            .set_editor_enabled(user.id, true)
            .await
            .map_err(|err| err.to_string())?;

        // Editor linking can shift connections/expiration on the panel side;
        // fetch once more and propagate whatever drifted.
        if let (Some(panel_id), Some(creds)) = (iptv.panel_id, iptv.credentials.as_ref()) {
            if let Some(info) = self.iptv.sync_account(panel_id, &creds.line_id).await {
                let expiration = expiration_from_info(&info);
                let connections = info.max_connections;
                if expiration.is_some() || connections.is_some() {
                    best_effort(
                        "post-editor panel sync (user record)",
                        self.users.apply_iptv_provision(
                            user.id,
                            &IptvUserUpdate {
                                username: None,
                                password: None,
                                line_id: None,
                                connections,
                                expiration,
                            },
                        ),
                    )
                    .await;

                    record.max_connections = connections;
                    record.expiration = expiration;
                    best_effort(
                        "post-editor panel sync (editor record)",
                        self.editor_accounts.upsert(
                            user.id,
                            config.playlist_id.as_deref(),
                            &record,
                        ),
                    )
                    .await;
                }
            }
        }

        Ok(format!("IPTV Editor account created (id {editor_id})"))
    }

    // -----------------------------------------------------------------------
    // Shared best-effort side actions
    // -----------------------------------------------------------------------

    /// Auto-complete pending portal requests and send the configured welcome
    /// email after a successful stage. Neither may fail the stage.
    async fn run_side_actions(
        &self,
        user: &UserData,
        kind: ServiceKind,
        welcome_template_id: Option<i64>,
    ) {
        best_effort(
            "auto-complete service requests",
            self.requests.complete_pending(user.id, kind),
        )
        .await;

        if let Some(template_id) = welcome_template_id {
            best_effort(
                "welcome email",
                self.mailer.send_welcome(user.id, kind, Some(template_id)),
            )
            .await;
        }
    }
}
