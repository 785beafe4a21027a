//! In-memory fakes of every repository trait

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tenantry_core::domain::keystore::KeystoreProperties;
use tenantry_core::domain::pipeline::{Artifact, DeploySource, DeployTarget, PipelineEvent, Platform};
use tenantry_core::{Error, Result};

use crate::repository::git::{ChangeKind, ChangedPath};
use crate::repository::{
    BackendPlatform, BackendSession, BuildToolchain, DocumentStore, KeystoreGenerator, Notifier,
    ScreenshotGenerator, VersionControl,
};

// =============================================================================
// Version control
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    Branch(String),
    Detached(String),
}

#[derive(Debug)]
pub struct VcsState {
    pub dirty: Vec<ChangedPath>,
    pub branches: BTreeSet<String>,
    pub remote_branches: BTreeSet<String>,
    pub head: Head,
    /// Local tags in creation order, with their messages
    pub tags: Vec<(String, String)>,
    pub pushed_tags: Vec<String>,
    pub commits: Vec<String>,
    pub push_failures: VecDeque<Error>,
    /// Every mutating call, in order
    pub calls: Vec<String>,
}

/// Git stand-in with a local repository and one remote
pub struct FakeVcs {
    state: Mutex<VcsState>,
}

impl FakeVcs {
    /// Clean tree on `main`, which also exists on the remote
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VcsState {
                dirty: Vec::new(),
                branches: BTreeSet::from(["main".to_string()]),
                remote_branches: BTreeSet::from(["main".to_string()]),
                head: Head::Branch("main".to_string()),
                tags: Vec::new(),
                pushed_tags: Vec::new(),
                commits: Vec::new(),
                push_failures: VecDeque::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, VcsState> {
        self.state.lock().unwrap()
    }

    pub fn make_dirty(&self, paths: &[&str]) {
        self.state().dirty = paths
            .iter()
            .map(|p| ChangedPath {
                kind: ChangeKind::Modified,
                path: p.to_string(),
            })
            .collect();
    }

    /// Queues errors returned by the next pushes, branch or tag
    pub fn fail_next_pushes(&self, errors: Vec<Error>) {
        self.state().push_failures.extend(errors);
    }

    pub fn add_release_tag(&self, name: &str) {
        let mut state = self.state();
        state.tags.push((name.to_string(), format!("Release {}", name)));
        state.pushed_tags.push(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn head(&self) -> Head {
        self.state().head.clone()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.state().tags.iter().map(|(name, _)| name.clone()).collect()
    }
}

fn git_error(command: &str, stderr: &str) -> Error {
    Error::from_tool_failure(command, Some(1), stderr)
}

fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn status(&self) -> Result<Vec<ChangedPath>> {
        Ok(self.state().dirty.clone())
    }

    async fn current_branch(&self) -> Result<Option<String>> {
        Ok(match &self.state().head {
            Head::Branch(name) => Some(name.clone()),
            Head::Detached(_) => None,
        })
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.state().branches.contains(branch))
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("checkout {}", branch));
        if !state.branches.contains(branch) {
            return Err(git_error(
                "git checkout",
                &format!("error: pathspec '{}' did not match", branch),
            ));
        }
        state.head = Head::Branch(branch.to_string());
        Ok(())
    }

    async fn checkout_detached(&self, reference: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("checkout --detach {}", reference));
        state.head = Head::Detached(reference.to_string());
        Ok(())
    }

    async fn create_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("branch {} {}", branch, start_point));
        if !state.branches.insert(branch.to_string()) {
            return Err(git_error(
                "git checkout -b",
                &format!("fatal: a branch named '{}' already exists", branch),
            ));
        }
        state.head = Head::Branch(branch.to_string());
        Ok(())
    }

    async fn pull(&self, branch: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("pull {}", branch));
        if !state.remote_branches.contains(branch) {
            return Err(git_error(
                "git pull",
                &format!("fatal: couldn't find remote ref {}", branch),
            ));
        }
        Ok(())
    }

    async fn push_branch(&self, branch: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("push {}", branch));
        if let Some(err) = state.push_failures.pop_front() {
            return Err(err);
        }
        state.remote_branches.insert(branch.to_string());
        Ok(())
    }

    async fn commit_paths(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        let mut state = self.state();
        state
            .calls
            .push(format!("commit {} file(s)", paths.len()));
        state.commits.push(message.to_string());
        Ok(())
    }

    async fn create_tag(&self, name: &str, message: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("tag {}", name));
        if state.tags.iter().any(|(n, _)| n == name) {
            return Err(git_error(
                "git tag",
                &format!("fatal: tag '{}' already exists", name),
            ));
        }
        state.tags.push((name.to_string(), message.to_string()));
        Ok(())
    }

    async fn push_tag(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("push tag {}", name));
        if let Some(err) = state.push_failures.pop_front() {
            return Err(err);
        }
        state.pushed_tags.push(name.to_string());
        Ok(())
    }

    async fn list_tags(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .state()
            .tags
            .iter()
            .filter(|(name, _)| matches_pattern(name, pattern))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state().tags.iter().any(|(n, _)| n == name))
    }
}

// =============================================================================
// Backend
// =============================================================================

type DocumentKey = (String, String, String, String);

/// Backend platform whose documents live in a shared map
#[derive(Default)]
pub struct FakeBackend {
    /// (project, database, collection, id) -> document
    documents: Arc<Mutex<BTreeMap<DocumentKey, Map<String, Value>>>>,
    constructed: AtomicUsize,
    closed: Arc<AtomicUsize>,
    failing_projects: Mutex<HashSet<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, project: &str, collection: &str, id: &str, document: Value) {
        let fields = document.as_object().cloned().unwrap_or_default();
        self.documents.lock().unwrap().insert(
            (project.to_string(), "(default)".to_string(), collection.to_string(), id.to_string()),
            fields,
        );
    }

    pub fn get(&self, project: &str, collection: &str, id: &str) -> Option<Value> {
        self.documents
            .lock()
            .unwrap()
            .get(&(project.to_string(), "(default)".to_string(), collection.to_string(), id.to_string()))
            .cloned()
            .map(Value::Object)
    }

    pub fn fail_project(&self, project: &str) {
        self.failing_projects.lock().unwrap().insert(project.to_string());
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendPlatform for FakeBackend {
    async fn construct_handle(&self, _credential: &Path, project_id: &str) -> Result<Box<dyn BackendSession>> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        if self.failing_projects.lock().unwrap().contains(project_id) {
            return Err(Error::Backend(format!("permission denied for {}", project_id)));
        }
        Ok(Box::new(FakeSession {
            project: project_id.to_string(),
            documents: Arc::clone(&self.documents),
            closed: Arc::clone(&self.closed),
            is_closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct FakeSession {
    project: String,
    documents: Arc<Mutex<BTreeMap<DocumentKey, Map<String, Value>>>>,
    closed: Arc<AtomicUsize>,
    is_closed: Arc<AtomicBool>,
}

#[async_trait]
impl BackendSession for FakeSession {
    fn documents(&self, database: Option<&str>) -> Arc<dyn DocumentStore> {
        Arc::new(FakeDocuments {
            project: self.project.clone(),
            database: database.unwrap_or("(default)").to_string(),
            documents: Arc::clone(&self.documents),
        })
    }

    async fn close(&self) -> Result<()> {
        if !self.is_closed.swap(true, Ordering::SeqCst) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct FakeDocuments {
    project: String,
    database: String,
    documents: Arc<Mutex<BTreeMap<DocumentKey, Map<String, Value>>>>,
}

impl FakeDocuments {
    fn key(&self, collection: &str, id: &str) -> DocumentKey {
        (
            self.project.clone(),
            self.database.clone(),
            collection.to_string(),
            id.to_string(),
        )
    }
}

#[async_trait]
impl DocumentStore for FakeDocuments {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(&self.key(collection, id))
            .cloned()
            .map(Value::Object))
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<()> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents.entry(self.key(collection, id)).or_default();
        document.extend(fields);
        Ok(())
    }
}

// =============================================================================
// Toolchain
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployCall {
    pub platform: Platform,
    pub target: DeployTarget,
    pub tenant_id: String,
    pub source: DeploySource,
}

/// Toolchain that records builds and uploads
#[derive(Default)]
pub struct FakeToolchain {
    pub builds: Mutex<Vec<(Platform, String)>>,
    pub deploys: Mutex<Vec<DeployCall>>,
    failing_builds: Mutex<HashSet<Platform>>,
    failing_deploys: Mutex<HashSet<Platform>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_build(&self, platform: Platform) {
        self.failing_builds.lock().unwrap().insert(platform);
    }

    pub fn fail_deploy(&self, platform: Platform) {
        self.failing_deploys.lock().unwrap().insert(platform);
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }

    pub fn deploy_calls(&self) -> Vec<DeployCall> {
        self.deploys.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildToolchain for FakeToolchain {
    async fn build(&self, platform: Platform, tenant_id: &str) -> Result<Artifact> {
        self.builds
            .lock()
            .unwrap()
            .push((platform, tenant_id.to_string()));
        if self.failing_builds.lock().unwrap().contains(&platform) {
            return Err(Error::ExternalTool {
                command: format!("flutter build {}", platform),
                code: Some(1),
                stderr: "Gradle task bundleRelease failed".to_string(),
            });
        }
        Ok(Artifact {
            platform,
            path: PathBuf::from(format!("/build/{}/{}.artifact", tenant_id, platform)),
        })
    }

    async fn deploy(
        &self,
        platform: Platform,
        target: DeployTarget,
        tenant_id: &str,
        source: &DeploySource,
    ) -> Result<()> {
        self.deploys.lock().unwrap().push(DeployCall {
            platform,
            target,
            tenant_id: tenant_id.to_string(),
            source: source.clone(),
        });
        if self.failing_deploys.lock().unwrap().contains(&platform) {
            return Err(Error::ExternalTool {
                command: format!("fastlane deploy_{}", target),
                code: Some(1),
                stderr: "App Store Connect rejected the upload".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Screenshots, notifications, keystores
// =============================================================================

/// Screenshot generator that writes placeholder captures
#[derive(Default)]
pub struct FakeScreenshots {
    pub calls: AtomicUsize,
    /// When set, generation succeeds but writes nothing
    pub produce_nothing: AtomicBool,
}

#[async_trait]
impl ScreenshotGenerator for FakeScreenshots {
    async fn generate(&self, _tenant_id: &str, _platform: Platform, output_dir: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.produce_nothing.load(Ordering::SeqCst) {
            return Ok(());
        }
        std::fs::create_dir_all(output_dir).unwrap();
        std::fs::write(output_dir.join("01_home.png"), b"png").unwrap();
        std::fs::write(output_dir.join("02_rewards.png"), b"png").unwrap();
        Ok(())
    }
}

/// Notifier that keeps every event
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<PipelineEvent>>,
    pub failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &PipelineEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::TransientNetwork("telegram unreachable".to_string()));
        }
        Ok(())
    }
}

/// Keystore generator that writes a placeholder file
#[derive(Default)]
pub struct FakeKeystoreGenerator {
    pub generated: AtomicUsize,
}

#[async_trait]
impl KeystoreGenerator for FakeKeystoreGenerator {
    async fn generate(&self, path: &Path, properties: &KeystoreProperties, _distinguished_name: &str) -> Result<()> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        std::fs::write(path, format!("keystore:{}", properties.store_password)).unwrap();
        Ok(())
    }
}
