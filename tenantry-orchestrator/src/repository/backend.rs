//! Backend platform repository
//!
//! A backend session is an authenticated connection to one backend project.
//! Sessions are expensive to open (a token has to be minted from a service
//! account), so they are owned by the connection pool and shared through
//! [`TenantHandle`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tenantry_client::{ClientError, FirestoreClient};
use tenantry_core::{Error, Result};
use tracing::{debug, info};

use crate::pool::{PoolKey, PooledHandle};
use crate::process::CommandSpec;

/// Document reads and partial writes against one database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document as plain JSON, `None` if it does not exist
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Writes the given top-level fields, leaving the others untouched
    async fn update_fields(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<()>;
}

/// An open, authenticated connection to one backend project
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Document store of the default database, or of a named one
    fn documents(&self, database: Option<&str>) -> Arc<dyn DocumentStore>;

    /// Releases the connection; later document calls fail
    async fn close(&self) -> Result<()>;
}

/// Repository trait for the backend-as-a-service platform
#[async_trait]
pub trait BackendPlatform: Send + Sync {
    /// Opens a session for a project with a service-account credential
    async fn construct_handle(&self, credential: &Path, project_id: &str) -> Result<Box<dyn BackendSession>>;
}

/// A pooled backend session with its identity
pub struct TenantHandle {
    key: PoolKey,
    credential: PathBuf,
    project_id: String,
    created_at: DateTime<Utc>,
    session: Box<dyn BackendSession>,
}

impl fmt::Debug for TenantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantHandle")
            .field("key", &self.key)
            .field("credential", &self.credential)
            .field("project_id", &self.project_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl TenantHandle {
    pub fn new(
        key: PoolKey,
        credential: PathBuf,
        project_id: impl Into<String>,
        session: Box<dyn BackendSession>,
    ) -> Self {
        Self {
            key,
            credential,
            project_id: project_id.into(),
            created_at: Utc::now(),
            session,
        }
    }

    /// Opens a handle through the platform
    pub async fn open(
        platform: Arc<dyn BackendPlatform>,
        key: PoolKey,
        credential: PathBuf,
        project_id: String,
    ) -> Result<Self> {
        let session = platform.construct_handle(&credential, &project_id).await?;
        Ok(Self::new(key, credential, project_id, session))
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn credential(&self) -> &Path {
        &self.credential
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn documents(&self, database: Option<&str>) -> Arc<dyn DocumentStore> {
        self.session.documents(database)
    }
}

#[async_trait]
impl PooledHandle for TenantHandle {
    async fn close(&self) -> Result<()> {
        debug!("Closing backend session for {} ({})", self.key, self.project_id);
        self.session.close().await
    }
}

/// Maps an HTTP client failure into the error taxonomy
pub fn map_client_error(err: ClientError) -> Error {
    if err.is_transient() {
        Error::TransientNetwork(err.to_string())
    } else {
        Error::Backend(err.to_string())
    }
}

// =============================================================================
// Firestore
// =============================================================================

/// Firestore over REST, authenticated through `gcloud`
pub struct FirestorePlatform {
    /// Overrides the public endpoint (e.g. the local emulator)
    base_url: Option<String>,
    token_timeout: Duration,
}

impl FirestorePlatform {
    pub fn new(token_timeout: Duration) -> Self {
        Self {
            base_url: None,
            token_timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Mints an OAuth access token for a service-account file
    async fn access_token(&self, credential: &Path) -> Result<String> {
        let output = CommandSpec::new("gcloud")
            .args(["auth", "print-access-token"])
            .env(
                "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE",
                credential.to_string_lossy(),
            )
            .timeout(self.token_timeout)
            .run()
            .await?;

        let token = output.stdout.trim().to_string();
        if token.is_empty() {
            return Err(Error::Backend(format!(
                "gcloud returned an empty access token for {}",
                credential.display()
            )));
        }
        Ok(token)
    }
}

#[async_trait]
impl BackendPlatform for FirestorePlatform {
    async fn construct_handle(&self, credential: &Path, project_id: &str) -> Result<Box<dyn BackendSession>> {
        if !credential.is_file() {
            return Err(Error::validation(format!(
                "Service account file not found: {}",
                credential.display()
            )));
        }

        let token = self.access_token(credential).await?;
        let client = match &self.base_url {
            Some(url) => FirestoreClient::with_base_url(url.clone(), project_id, token),
            None => FirestoreClient::new(project_id, token),
        };

        info!("Opened Firestore session for project {}", project_id);
        Ok(Box::new(FirestoreSession {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct FirestoreSession {
    client: FirestoreClient,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl BackendSession for FirestoreSession {
    fn documents(&self, database: Option<&str>) -> Arc<dyn DocumentStore> {
        let client = match database {
            Some(database) => self.client.for_database(database),
            None => self.client.clone(),
        };
        Arc::new(FirestoreDocuments {
            client,
            closed: Arc::clone(&self.closed),
        })
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FirestoreDocuments {
    client: FirestoreClient,
    closed: Arc<AtomicBool>,
}

impl FirestoreDocuments {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Backend(format!(
                "Session for project {} is closed",
                self.client.project_id()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocuments {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        self.client
            .get_document(collection, id)
            .await
            .map_err(map_client_error)
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<()> {
        self.ensure_open()?;
        self.client
            .update_fields(collection, id, &fields)
            .await
            .map_err(map_client_error)
    }
}
