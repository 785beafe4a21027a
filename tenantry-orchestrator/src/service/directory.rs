//! Tenant directory
//!
//! The coordination backend keeps one `clients/{tenant}` document per tenant
//! with the location of its credentials and an activation flag. It is read
//! through the master handle, which the pool opens lazily and never evicts.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tenantry_core::domain::tenant::TenantRecord;
use tenantry_core::{Error, Result};
use tracing::{debug, info};

use crate::config::MasterBackend;
use crate::pool::{ConnectionPool, PoolKey};
use crate::repository::{BackendPlatform, TenantHandle};

const CLIENTS_COLLECTION: &str = "clients";

pub struct TenantDirectory {
    pool: ConnectionPool<TenantHandle>,
    platform: Arc<dyn BackendPlatform>,
    master: Option<MasterBackend>,
}

impl TenantDirectory {
    pub fn new(
        pool: ConnectionPool<TenantHandle>,
        platform: Arc<dyn BackendPlatform>,
        master: Option<MasterBackend>,
    ) -> Self {
        Self {
            pool,
            platform,
            master,
        }
    }

    pub fn pool(&self) -> &ConnectionPool<TenantHandle> {
        &self.pool
    }

    /// Whether a coordination backend is configured
    pub fn has_master(&self) -> bool {
        self.master.is_some()
    }

    /// The master handle, opened on first use
    pub async fn master(&self) -> Result<Arc<TenantHandle>> {
        let master = self.master.clone().ok_or_else(|| {
            Error::validation("No master backend is configured (TENANTRY_MASTER_CREDENTIALS)")
        })?;
        let platform = Arc::clone(&self.platform);

        self.pool
            .acquire(PoolKey::Master, move || {
                TenantHandle::open(platform, PoolKey::Master, master.credentials, master.project_id)
            })
            .await
    }

    /// Reads the tenant's record, `None` if the directory has no entry
    pub async fn record(&self, tenant_id: &str) -> Result<Option<TenantRecord>> {
        let master = self.master().await?;
        let document = master
            .documents(None)
            .get(CLIENTS_COLLECTION, tenant_id)
            .await?;

        match document {
            Some(value) => {
                let record = serde_json::from_value(value).map_err(|e| {
                    Error::Backend(format!("Malformed directory entry for '{}': {}", tenant_id, e))
                })?;
                debug!("Directory entry for {}: {:?}", tenant_id, record);
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Sets the tenant's activation flag
    pub async fn set_active(&self, tenant_id: &str, active: bool) -> Result<()> {
        let master = self.master().await?;
        let mut fields = Map::new();
        fields.insert("active".to_string(), Value::Bool(active));
        master
            .documents(None)
            .update_fields(CLIENTS_COLLECTION, tenant_id, fields)
            .await?;
        info!("Marked {} as {}", tenant_id, if active { "active" } else { "inactive" });
        Ok(())
    }

    /// Pooled handle to the tenant's own backend project
    ///
    /// # Arguments
    /// * `tenant_id` - Pool key of the handle
    /// * `project_id` - Backend project of the tenant
    /// * `credential` - Service-account file used if the handle is not open
    pub async fn tenant_handle(
        &self,
        tenant_id: &str,
        project_id: &str,
        credential: PathBuf,
    ) -> Result<Arc<TenantHandle>> {
        let key = PoolKey::tenant(tenant_id);
        let platform = Arc::clone(&self.platform);
        let project_id = project_id.to_string();
        let handle_key = key.clone();

        self.pool
            .acquire(key, move || {
                TenantHandle::open(platform, handle_key, credential, project_id)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use serde_json::json;
    use std::time::Duration;

    fn directory(backend: Arc<FakeBackend>, master: bool) -> TenantDirectory {
        let master = master.then(|| MasterBackend {
            credentials: PathBuf::from("/secure/master.json"),
            project_id: "tenantry-master".to_string(),
        });
        TenantDirectory::new(
            ConnectionPool::new(2, Duration::from_secs(5)),
            backend,
            master,
        )
    }

    #[tokio::test]
    async fn test_record_and_activation() {
        let backend = Arc::new(FakeBackend::new());
        backend.put(
            "tenantry-master",
            "clients",
            "acme",
            json!({ "credentialsPath": "/secure/acme.json", "active": false }),
        );
        let directory = directory(Arc::clone(&backend), true);

        let record = directory.record("acme").await.unwrap().unwrap();
        assert_eq!(record.credentials_path.as_deref(), Some("/secure/acme.json"));
        assert!(!record.active);

        directory.set_active("acme", true).await.unwrap();
        assert!(directory.record("acme").await.unwrap().unwrap().active);
        assert_eq!(
            backend.get("tenantry-master", "clients", "acme").unwrap()["credentialsPath"],
            "/secure/acme.json"
        );

        assert_eq!(directory.record("ghost").await.unwrap(), None);
        // One master handle, reused
        assert_eq!(backend.constructed(), 1);
        assert_eq!(directory.pool().tenant_count(), 0);
    }

    #[tokio::test]
    async fn test_master_survives_tenant_eviction() {
        let backend = Arc::new(FakeBackend::new());
        let directory = directory(Arc::clone(&backend), true);
        directory.master().await.unwrap();

        for tenant in ["a", "b", "c"] {
            directory
                .tenant_handle(tenant, &format!("{}-project", tenant), PathBuf::from("/k.json"))
                .await
                .unwrap();
        }

        let pool = directory.pool();
        assert!(pool.contains(&PoolKey::Master));
        assert!(!pool.contains(&PoolKey::tenant("a")));
        assert_eq!(pool.tenant_count(), 2);
        assert_eq!(backend.closed(), 1);

        pool.close_all().await.unwrap();
        assert_eq!(backend.closed(), 4);
    }

    #[tokio::test]
    async fn test_missing_master_is_a_validation_error() {
        let directory = directory(Arc::new(FakeBackend::new()), false);
        assert!(!directory.has_master());
        assert!(matches!(
            directory.record("acme").await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_tenant_handle_is_not_cached() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail_project("acme-project");
        let directory = directory(Arc::clone(&backend), false);

        for _ in 0..2 {
            let err = directory
                .tenant_handle("acme", "acme-project", PathBuf::from("/k.json"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Backend(_)));
        }
        assert_eq!(backend.constructed(), 2);
        assert!(!directory.pool().contains(&PoolKey::tenant("acme")));
    }
}
