//! Pipeline orchestrator
//!
//! Drives a deploy run through Validate, Setup, Screenshots, Build, Deploy
//! and Finalize. A failing phase stops the run and completed phases are not
//! reverted. Every run ends in a [`RunReport`] that is also announced through
//! the notifier.

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tenantry_client::TelegramClient;
use tenantry_core::domain::pipeline::{
    DeploySource, DeployStatus, DeployTarget, ExistingBuildAction, Phase, PipelineEvent,
    PipelineRun, Platform, PlatformReport, RunOutcome, RunReport,
};
use tenantry_core::domain::release::ReleaseTag;
use tenantry_core::domain::tenant::{TenantConfig, validate_tenant_id};
use tenantry_core::domain::version::{AppVersion, VersionStrategy};
use tenantry_core::{Error, Result};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::Config;
use crate::pipeline::request::{
    CancellationFlag, DeployRequest, ExistingBuildRequest, RollbackReport, RollbackRequest,
};
use crate::pool::ConnectionPool;
use crate::repository::screenshots::{clear_screenshots, screenshots_dir, validate_screenshots};
use crate::repository::{
    BackendPlatform, BuildToolchain, FirestorePlatform, FlutterToolchain, GitCli,
    KeystoreGenerator, KeytoolGenerator, LogNotifier, Notifier, ScreenshotGenerator,
    ScriptScreenshotGenerator, TelegramNotifier, VersionControl,
};
use crate::service::{
    BranchLifecycle, KeystoreManager, TagStore, TenantDirectory, TenantStore, VersionManager,
};

/// Bound on a single notification attempt
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Document holding the release flags the app reads at startup
const RELEASE_COLLECTION: &str = "app_config";
const RELEASE_DOCUMENT: &str = "release";

/// External systems the orchestrator talks to
pub struct Collaborators {
    pub vcs: Arc<dyn VersionControl>,
    pub platform: Arc<dyn BackendPlatform>,
    pub toolchain: Arc<dyn BuildToolchain>,
    /// `None` when no screenshot command is configured
    pub screenshots: Option<Arc<dyn ScreenshotGenerator>>,
    pub notifier: Arc<dyn Notifier>,
    pub keystores: Arc<dyn KeystoreGenerator>,
}

impl Collaborators {
    /// Subprocess and HTTP adapters for a configuration
    pub fn from_config(config: &Config) -> Self {
        let notifier: Arc<dyn Notifier> = match &config.telegram {
            Some(telegram) => Arc::new(TelegramNotifier::new(
                TelegramClient::new(telegram.bot_token.clone()),
                telegram.chat_id.clone(),
            )),
            None => Arc::new(LogNotifier),
        };

        let screenshots = config.screenshot_command.as_ref().map(|command| {
            Arc::new(ScriptScreenshotGenerator::new(
                command.clone(),
                config.repo_root.clone(),
                config.screenshot_timeout,
            )) as Arc<dyn ScreenshotGenerator>
        });

        Self {
            vcs: Arc::new(GitCli::new(
                config.repo_root.clone(),
                config.remote.clone(),
                config.git_timeout,
            )),
            platform: Arc::new(FirestorePlatform::new(config.pool_construct_timeout)),
            toolchain: Arc::new(FlutterToolchain::new(
                config.project_dir.clone(),
                config.dependency_timeout,
                config.build_timeout,
                config.deploy_timeout,
            )),
            screenshots,
            notifier,
            keystores: Arc::new(KeytoolGenerator::new(config.dependency_timeout)),
        }
    }
}

/// A tenant that passed validation
struct ValidatedTenant {
    config: TenantConfig,
    /// Service account for the tenant's own backend project
    credential: Option<PathBuf>,
}

/// Mutable state of a run in progress
struct Progress {
    run: PipelineRun,
    platforms: Vec<PlatformReport>,
    screenshots: Option<usize>,
    release_tag: Option<String>,
    flags_updated: bool,
}

impl Progress {
    fn new(run: PipelineRun) -> Self {
        let platforms = run.platforms.iter().map(|p| PlatformReport::new(*p)).collect();
        Self {
            run,
            platforms,
            screenshots: None,
            release_tag: None,
            flags_updated: false,
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.run.phase = phase;
        info!("Entering {}", phase);
    }

    fn deployed(&self) -> Vec<Platform> {
        self.platforms
            .iter()
            .filter(|p| p.deployed())
            .map(|p| p.platform)
            .collect()
    }

    fn finish(self, outcome: RunOutcome) -> RunReport {
        RunReport {
            run: self.run,
            outcome,
            platforms: self.platforms,
            screenshots: self.screenshots,
            release_tag: self.release_tag,
            flags_updated: self.flags_updated,
            finished_at: Utc::now(),
        }
    }
}

pub struct PipelineOrchestrator {
    config: Config,
    tenants: TenantStore,
    directory: TenantDirectory,
    branches: BranchLifecycle,
    versions: VersionManager,
    keystores: KeystoreManager,
    toolchain: Arc<dyn BuildToolchain>,
    screenshots: Option<Arc<dyn ScreenshotGenerator>>,
    notifier: Arc<dyn Notifier>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator with its own connection pool
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let tags = Arc::new(TagStore::new(collaborators.vcs, config.push_retry));
        let pool = ConnectionPool::new(config.pool_capacity, config.pool_construct_timeout);

        Ok(Self {
            tenants: TenantStore::new(config.repo_root.clone(), config.clients_dir.clone()),
            directory: TenantDirectory::new(pool, collaborators.platform, config.master.clone()),
            branches: BranchLifecycle::new(Arc::clone(&tags), config.trunk_branch.clone()),
            versions: VersionManager::new(config.repo_root.clone(), config.manifest_path(), tags),
            keystores: KeystoreManager::new(config.credentials_dir.clone(), collaborators.keystores),
            toolchain: collaborators.toolchain,
            screenshots: collaborators.screenshots,
            notifier: collaborators.notifier,
            config,
        })
    }

    /// Creates an orchestrator backed by the real tools
    pub fn from_config(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config);
        Self::new(config, collaborators)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tenants(&self) -> &TenantStore {
        &self.tenants
    }

    pub fn directory(&self) -> &TenantDirectory {
        &self.directory
    }

    pub fn branches(&self) -> &BranchLifecycle {
        &self.branches
    }

    pub fn versions(&self) -> &VersionManager {
        &self.versions
    }

    pub fn keystores(&self) -> &KeystoreManager {
        &self.keystores
    }

    /// Closes every pooled backend handle, master included
    pub async fn shutdown(&self) -> Result<()> {
        self.directory.pool().close_all().await
    }

    // =========================================================================
    // Full run
    // =========================================================================

    /// Runs the full pipeline for one tenant
    ///
    /// Failures never escape as `Err`: they end the run and are recorded in
    /// the report's outcome, together with whatever was deployed before.
    pub async fn run(&self, request: DeployRequest, cancel: &CancellationFlag) -> RunReport {
        let run = PipelineRun::new(
            request.tenant_id.clone(),
            request.platforms.clone(),
            request.targets.clone(),
        );
        let span = info_span!("pipeline", run_id = %run.id, tenant = %run.tenant_id);

        async move {
            let mut progress = Progress::new(run);
            self.notify(&started_event(&progress.run)).await;
            let outcome = self.drive(&mut progress, &request, cancel).await;
            self.conclude(progress, outcome).await
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        progress: &mut Progress,
        request: &DeployRequest,
        cancel: &CancellationFlag,
    ) -> RunOutcome {
        let tenant_id = request.tenant_id.as_str();

        progress.enter(Phase::Validate);
        if let Err(e) = request.validate() {
            return failed(Phase::Validate, e);
        }
        let needs_backend = progress.run.has_production_target();
        let tenant = match self
            .validate_tenant(tenant_id, &request.platforms, true, needs_backend)
            .await
        {
            Ok(tenant) => tenant,
            Err(e) => return failed(Phase::Validate, e),
        };

        if let Some(outcome) = checkpoint(progress, Phase::Setup, cancel) {
            return outcome;
        }
        let version = match self.setup(tenant_id, request.version).await {
            Ok(version) => version,
            Err(e) => return failed(Phase::Setup, e),
        };
        progress.run.version = Some(version);

        let public: Vec<Platform> = progress
            .run
            .targets
            .iter()
            .filter(|(_, target)| target.is_public_store())
            .map(|(platform, _)| *platform)
            .collect();
        if public.is_empty() {
            debug!("No public store target, skipping screenshots");
        } else {
            if let Some(outcome) = checkpoint(progress, Phase::Screenshots, cancel) {
                return outcome;
            }
            match self
                .capture_screenshots(tenant_id, &public, request.skip_screenshots)
                .await
            {
                Ok(count) => progress.screenshots = Some(count),
                Err(e) => return failed(Phase::Screenshots, e),
            }
        }

        if let Some(outcome) = checkpoint(progress, Phase::Build, cancel) {
            return outcome;
        }
        if let Err(e) = self.build_all(progress).await {
            return failed(Phase::Build, e);
        }

        if progress.run.targets.is_empty() {
            info!("Build-only run, nothing to deploy");
            return RunOutcome::Succeeded;
        }

        if let Some(outcome) = checkpoint(progress, Phase::Deploy, cancel) {
            return outcome;
        }
        let jobs: Vec<(Platform, DeployTarget, DeploySource)> = progress
            .platforms
            .iter()
            .filter_map(|report| {
                let target = progress.run.targets.get(&report.platform)?;
                let artifact = report.artifact.clone()?;
                Some((report.platform, *target, DeploySource::Built(artifact)))
            })
            .collect();
        let deploy_error = self.deploy_all(tenant_id, jobs, &mut progress.platforms).await;

        if progress.deployed().is_empty() {
            let error = deploy_error.unwrap_or_else(|| Error::validation("Nothing was deployed"));
            return failed(Phase::Deploy, error);
        }

        // Uploads already happened, so the release is tagged even when only
        // some platforms went through
        progress.enter(Phase::Finalize);
        let update_flags = deploy_error.is_none() && progress.run.has_production_target();
        let finalized = self.finalize(progress, &tenant, &version, update_flags).await;

        match (deploy_error, finalized) {
            (None, Ok(())) => RunOutcome::Succeeded,
            (None, Err(e)) => failed(Phase::Finalize, e),
            (Some(e), Ok(())) => failed(Phase::Deploy, e),
            (Some(e), Err(finalize_error)) => {
                warn!("Finalizing a partial deploy failed: {}", finalize_error);
                failed(Phase::Deploy, e)
            }
        }
    }

    async fn conclude(&self, progress: Progress, outcome: RunOutcome) -> RunReport {
        let report = progress.finish(outcome);
        match &report.outcome {
            RunOutcome::Succeeded => info!("Run succeeded"),
            RunOutcome::Failed { phase, error } => error!("Run failed in {}: {}", phase, error),
            RunOutcome::Cancelled { phase } => warn!("Run cancelled before {}", phase),
        }
        self.notify(&outcome_event(&report)).await;
        report
    }

    /// Loads the tenant and checks everything a run depends on
    ///
    /// # Arguments
    /// * `check_signing` - Require valid Android signing material
    /// * `needs_backend` - Require a service account for the tenant project
    async fn validate_tenant(
        &self,
        tenant_id: &str,
        platforms: &[Platform],
        check_signing: bool,
        needs_backend: bool,
    ) -> Result<ValidatedTenant> {
        let config = self.tenants.load(tenant_id)?;
        self.tenants.check_credentials(tenant_id, &config)?;
        let mut credential = self.tenants.service_account(&config);

        if self.directory.has_master() {
            match self.directory.record(tenant_id).await? {
                Some(record) if !record.active => {
                    return Err(Error::validation(format!(
                        "Tenant '{}' is marked inactive in the directory",
                        tenant_id
                    )));
                }
                Some(record) => {
                    if let Some(path) = record.credentials_path {
                        credential = Some(self.tenants.resolve(Path::new(&path)));
                    }
                }
                None => warn!("{} has no directory entry, using its own credentials", tenant_id),
            }
        }

        if check_signing && platforms.contains(&Platform::Android) {
            self.keystores.validate(tenant_id)?;
        }

        if needs_backend && credential.is_none() {
            return Err(Error::validation(format!(
                "Production deploys update release flags, which needs a service account for '{}'",
                tenant_id
            )));
        }

        info!("Validated {} ({})", tenant_id, config.display_name());
        Ok(ValidatedTenant { config, credential })
    }

    async fn setup(&self, tenant_id: &str, strategy: VersionStrategy) -> Result<AppVersion> {
        let branch = self.branches.ensure_deploy_branch(tenant_id).await?;
        self.versions.apply(tenant_id, &branch, strategy).await
    }

    /// Generates store screenshots, or reuses those on disk
    ///
    /// # Returns
    /// Total number of screenshots across the platforms
    async fn capture_screenshots(&self, tenant_id: &str, platforms: &[Platform], reuse: bool) -> Result<usize> {
        let mut total = 0;
        for platform in platforms {
            let dir = screenshots_dir(&self.config.repo_root, tenant_id, *platform);
            match (&self.screenshots, reuse) {
                (_, true) => info!("Reusing existing {} screenshots", platform),
                (None, false) => warn!(
                    "No screenshot command configured, validating existing {} screenshots",
                    platform
                ),
                (Some(generator), false) => {
                    clear_screenshots(&dir)?;
                    generator.generate(tenant_id, *platform, &dir).await?;
                }
            }
            let count = validate_screenshots(&dir)?;
            info!("{} {} screenshot(s) ready", count, platform);
            total += count;
        }
        Ok(total)
    }

    /// Builds each platform in order, stopping at the first failure
    ///
    /// Artifacts of platforms that finished stay in the report.
    async fn build_all(&self, progress: &mut Progress) -> Result<()> {
        let tenant_id = progress.run.tenant_id.clone();
        for report in progress.platforms.iter_mut() {
            match self.toolchain.build(report.platform, &tenant_id).await {
                Ok(artifact) => {
                    info!("Built {} artifact {}", report.platform, artifact.path.display());
                    report.artifact = Some(artifact);
                }
                Err(e) => {
                    report.build_error = Some(e.to_string());
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Uploads every job, independently of each other
    ///
    /// # Returns
    /// The first deploy error, if any
    async fn deploy_all(
        &self,
        tenant_id: &str,
        jobs: Vec<(Platform, DeployTarget, DeploySource)>,
        reports: &mut [PlatformReport],
    ) -> Option<Error> {
        let mut first_error = None;

        for (platform, target, source) in jobs {
            let status = match self.toolchain.deploy(platform, target, tenant_id, &source).await {
                Ok(()) => {
                    info!("Deployed {} to {}", platform, target);
                    DeployStatus::Succeeded { target }
                }
                Err(e) => {
                    error!("Deploying {} to {} failed: {}", platform, target, e);
                    let status = DeployStatus::Failed {
                        target,
                        error: e.to_string(),
                    };
                    first_error.get_or_insert(e);
                    status
                }
            };
            if let Some(report) = reports.iter_mut().find(|r| r.platform == platform) {
                report.deploy = status;
            }
        }

        first_error
    }

    async fn finalize(
        &self,
        progress: &mut Progress,
        tenant: &ValidatedTenant,
        version: &AppVersion,
        update_flags: bool,
    ) -> Result<()> {
        let tenant_id = progress.run.tenant_id.clone();
        let tag = self
            .branches
            .tag_release(&tenant_id, &version.semver(), version.build)
            .await?;
        info!("Tagged release {}", tag);
        progress.release_tag = Some(tag);

        if update_flags {
            self.publish_release_flags(&tenant_id, tenant, version).await?;
            progress.flags_updated = true;
        }
        Ok(())
    }

    /// Writes the released version and feature flags to the tenant backend
    async fn publish_release_flags(
        &self,
        tenant_id: &str,
        tenant: &ValidatedTenant,
        version: &AppVersion,
    ) -> Result<()> {
        let credential = tenant.credential.clone().ok_or_else(|| {
            Error::validation(format!("No service account configured for '{}'", tenant_id))
        })?;
        let project_id = &tenant.config.firebase_project_id;
        let handle = self
            .directory
            .tenant_handle(tenant_id, project_id, credential)
            .await?;

        let feature_flags: Map<String, Value> = tenant
            .config
            .feature_flags
            .iter()
            .map(|(name, enabled)| (name.clone(), Value::Bool(*enabled)))
            .collect();

        let mut fields = Map::new();
        fields.insert("latestVersion".to_string(), Value::String(version.semver()));
        fields.insert("latestBuild".to_string(), Value::from(version.build));
        fields.insert("maintenanceMode".to_string(), Value::Bool(false));
        fields.insert("featureFlags".to_string(), Value::Object(feature_flags));

        handle
            .documents(None)
            .update_fields(RELEASE_COLLECTION, RELEASE_DOCUMENT, fields)
            .await?;
        info!("Updated release flags in {}", project_id);
        Ok(())
    }

    // =========================================================================
    // Existing builds
    // =========================================================================

    /// Sends a build that is already uploaded to store review
    pub async fn submit_for_review(&self, request: ExistingBuildRequest, cancel: &CancellationFlag) -> RunReport {
        self.run_existing(request, ExistingBuildAction::SubmitForReview, cancel)
            .await
    }

    /// Moves a build that is already uploaded to the production track
    pub async fn promote_to_production(&self, request: ExistingBuildRequest, cancel: &CancellationFlag) -> RunReport {
        self.run_existing(request, ExistingBuildAction::Promote, cancel)
            .await
    }

    async fn run_existing(
        &self,
        request: ExistingBuildRequest,
        action: ExistingBuildAction,
        cancel: &CancellationFlag,
    ) -> RunReport {
        let targets: BTreeMap<Platform, DeployTarget> = request
            .platforms
            .iter()
            .map(|p| (*p, DeployTarget::Production))
            .collect();
        let run = PipelineRun::new(request.tenant_id.clone(), request.platforms.clone(), targets);
        let span = info_span!("pipeline", run_id = %run.id, tenant = %run.tenant_id, %action);

        async move {
            let mut progress = Progress::new(run);
            self.notify(&started_event(&progress.run)).await;
            let outcome = self
                .drive_existing(&mut progress, &request, action, cancel)
                .await;
            self.conclude(progress, outcome).await
        }
        .instrument(span)
        .await
    }

    async fn drive_existing(
        &self,
        progress: &mut Progress,
        request: &ExistingBuildRequest,
        action: ExistingBuildAction,
        cancel: &CancellationFlag,
    ) -> RunOutcome {
        progress.enter(Phase::Validate);
        if let Err(e) = request.validate() {
            return failed(Phase::Validate, e);
        }
        if let Err(e) = self
            .validate_tenant(&request.tenant_id, &request.platforms, false, false)
            .await
        {
            return failed(Phase::Validate, e);
        }

        if let Some(outcome) = checkpoint(progress, Phase::Deploy, cancel) {
            return outcome;
        }
        let jobs = request
            .platforms
            .iter()
            .map(|platform| {
                let source = DeploySource::Existing {
                    build_id: request.build_id.clone(),
                    action,
                };
                (*platform, DeployTarget::Production, source)
            })
            .collect();

        match self
            .deploy_all(&request.tenant_id, jobs, &mut progress.platforms)
            .await
        {
            Some(e) => failed(Phase::Deploy, e),
            None => RunOutcome::Succeeded,
        }
    }

    // =========================================================================
    // Rollback
    // =========================================================================

    /// Returns a tenant to an earlier release tag
    ///
    /// Leaves a `-rollback-` marker tag, optionally rebuilds and redeploys
    /// from the tag, and always checks the deploy branch out again before
    /// returning.
    ///
    /// Any failure is reported to the notifier before it is returned.
    pub async fn rollback(&self, request: RollbackRequest) -> Result<RollbackReport> {
        let span = info_span!("rollback", tenant = %request.tenant_id);
        let tenant_id = request.tenant_id.clone();
        let requested = request.tag.clone();

        async move {
            let result = self.rollback_inner(request).await;
            if let Err(e) = &result {
                error!("Rollback of {} failed: {}", tenant_id, e);
                self.notify(&PipelineEvent::RollbackFailed {
                    tenant_id,
                    tag: requested,
                    error: e.to_string(),
                })
                .await;
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn rollback_inner(&self, request: RollbackRequest) -> Result<RollbackReport> {
        let tenant_id = request.tenant_id.as_str();
        validate_tenant_id(tenant_id)?;
        self.branches.ensure_clean().await?;

        let tag = self
            .resolve_rollback_tag(tenant_id, request.tag.as_deref())
            .await?;
        if request.redeploy.contains_key(&Platform::Android) {
            self.keystores.validate(tenant_id)?;
        }

        self.branches.rollback_to(&tag).await?;
        info!("Rolling {} back to {}", tenant_id, tag);

        let detached = self.rollback_detached(tenant_id, &tag, &request.redeploy).await;
        let returned = self.branches.return_to_branch(tenant_id).await;
        let (marker, platforms) = detached?;
        returned?;

        let (redeployed, redeploy_failed): (Vec<&PlatformReport>, Vec<&PlatformReport>) =
            platforms.iter().partition(|p| p.deployed());
        self.notify(&PipelineEvent::RolledBack {
            tenant_id: tenant_id.to_string(),
            tag: tag.clone(),
            marker: marker.clone(),
            redeployed: redeployed.iter().map(|p| p.platform).collect(),
            redeploy_failed: redeploy_failed.iter().map(|p| p.platform).collect(),
        })
        .await;

        Ok(RollbackReport {
            tenant_id: tenant_id.to_string(),
            tag,
            marker,
            platforms,
        })
    }

    /// Explicit tag, or the release created before the most recent one
    async fn resolve_rollback_tag(&self, tenant_id: &str, requested: Option<&str>) -> Result<String> {
        if let Some(tag) = requested {
            return match ReleaseTag::parse(tag) {
                Some(parsed) if parsed.client_name == tenant_id => Ok(tag.to_string()),
                Some(parsed) => Err(Error::validation(format!(
                    "Tag '{}' belongs to '{}', not '{}'",
                    tag, parsed.client_name, tenant_id
                ))),
                None => Err(Error::validation(format!("'{}' is not a release tag", tag))),
            };
        }

        let releases = self.branches.list_releases(tenant_id).await?;
        if releases.len() < 2 {
            return Err(Error::validation(format!(
                "'{}' has {} release(s), there is no earlier release to roll back to",
                tenant_id,
                releases.len()
            )));
        }
        Ok(releases[releases.len() - 2].to_string())
    }

    /// Work done while HEAD is detached at the rollback tag
    async fn rollback_detached(
        &self,
        tenant_id: &str,
        tag: &str,
        redeploy: &BTreeMap<Platform, DeployTarget>,
    ) -> Result<(String, Vec<PlatformReport>)> {
        let marker = self.branches.mark_rollback(tag, Utc::now()).await?;
        info!("Recorded rollback marker {}", marker);

        let mut reports = Vec::new();
        for (platform, target) in redeploy {
            let mut report = PlatformReport::new(*platform);
            match self.toolchain.build(*platform, tenant_id).await {
                Ok(artifact) => {
                    let source = DeploySource::Built(artifact.clone());
                    report.artifact = Some(artifact);
                    report.deploy = match self
                        .toolchain
                        .deploy(*platform, *target, tenant_id, &source)
                        .await
                    {
                        Ok(()) => DeployStatus::Succeeded { target: *target },
                        Err(e) => {
                            error!("Redeploying {} failed: {}", platform, e);
                            DeployStatus::Failed {
                                target: *target,
                                error: e.to_string(),
                            }
                        }
                    };
                }
                Err(e) => {
                    error!("Rebuilding {} failed: {}", platform, e);
                    report.build_error = Some(e.to_string());
                }
            }
            reports.push(report);
        }

        Ok((marker, reports))
    }

    /// Best-effort notification; failures are logged and dropped
    async fn notify(&self, event: &PipelineEvent) {
        match tokio::time::timeout(NOTIFY_TIMEOUT, self.notifier.notify(event)).await {
            Ok(Ok(())) => debug!("Notified: {}", event.summary()),
            Ok(Err(e)) => warn!("Notification failed: {}", e),
            Err(_) => warn!("Notification timed out after {:?}", NOTIFY_TIMEOUT),
        }
    }
}

fn failed(phase: Phase, error: Error) -> RunOutcome {
    RunOutcome::Failed { phase, error }
}

/// Enters `phase` unless the run was cancelled
fn checkpoint(progress: &mut Progress, phase: Phase, cancel: &CancellationFlag) -> Option<RunOutcome> {
    if cancel.is_cancelled() {
        warn!("Cancellation requested, stopping before {}", phase);
        return Some(RunOutcome::Cancelled { phase });
    }
    progress.enter(phase);
    None
}

fn started_event(run: &PipelineRun) -> PipelineEvent {
    PipelineEvent::Started {
        tenant_id: run.tenant_id.clone(),
        run_id: run.id,
        platforms: run.platforms.clone(),
    }
}

fn outcome_event(report: &RunReport) -> PipelineEvent {
    let tenant_id = report.run.tenant_id.clone();
    let run_id = report.run.id;
    match &report.outcome {
        RunOutcome::Succeeded => PipelineEvent::Succeeded {
            tenant_id,
            run_id,
            version: report.run.version,
            release_tag: report.release_tag.clone(),
        },
        RunOutcome::Failed { phase, error } => PipelineEvent::Failed {
            tenant_id,
            run_id,
            phase: *phase,
            error: error.to_string(),
            deployed: report
                .platforms
                .iter()
                .filter(|p| p.deployed())
                .map(|p| p.platform)
                .collect(),
        },
        RunOutcome::Cancelled { phase } => PipelineEvent::Cancelled {
            tenant_id,
            run_id,
            phase: *phase,
        },
    }
}
