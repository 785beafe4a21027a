//! Tenant configuration store
//!
//! Each tenant has a JSON configuration at `{clients_dir}/{tenant}.json`.
//! Credential paths inside it are relative to the repository root unless
//! absolute.

use std::path::{Path, PathBuf};
use tenantry_core::domain::tenant::{TenantConfig, validate_tenant_id};
use tenantry_core::{Error, Result};
use tracing::debug;

pub struct TenantStore {
    repo_root: PathBuf,
    clients_dir: PathBuf,
}

impl TenantStore {
    pub fn new(repo_root: impl Into<PathBuf>, clients_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            clients_dir: clients_dir.into(),
        }
    }

    pub fn config_path(&self, tenant_id: &str) -> PathBuf {
        self.clients_dir.join(format!("{}.json", tenant_id))
    }

    /// Loads and validates a tenant's configuration
    pub fn load(&self, tenant_id: &str) -> Result<TenantConfig> {
        validate_tenant_id(tenant_id)?;

        let path = self.config_path(tenant_id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::validation(format!(
                    "Unknown tenant '{}': {} does not exist",
                    tenant_id,
                    path.display()
                )));
            }
            Err(e) => return Err(Error::io(format!("Failed to read {}", path.display()), e)),
        };

        let config: TenantConfig = serde_json::from_str(&contents).map_err(|e| {
            Error::validation(format!("Invalid JSON in {}: {}", path.display(), e))
        })?;
        config.validate(tenant_id)?;

        debug!("Loaded configuration for {}", tenant_id);
        Ok(config)
    }

    /// Tenant identifiers with a configuration file, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.clients_dir).map_err(|e| {
            Error::io(format!("Failed to read {}", self.clients_dir.display()), e)
        })?;

        let mut tenants: Vec<String> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|id| validate_tenant_id(id).is_ok())
            .collect();
        tenants.sort();
        Ok(tenants)
    }

    /// Resolves a credential path from a configuration
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    /// Service-account file of the tenant, if configured
    pub fn service_account(&self, config: &TenantConfig) -> Option<PathBuf> {
        config
            .credentials
            .service_account
            .as_deref()
            .map(|p| self.resolve(p))
    }

    /// Fails unless at least one configured credential exists on disk
    pub fn check_credentials(&self, tenant_id: &str, config: &TenantConfig) -> Result<()> {
        let credentials = &config.credentials;
        let configured: Vec<PathBuf> = [
            &credentials.service_account,
            &credentials.google_services,
            &credentials.google_service_info,
        ]
        .into_iter()
        .flatten()
        .map(|p| self.resolve(p))
        .collect();

        if configured.iter().any(|p| p.is_file()) {
            return Ok(());
        }

        let listed = configured
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::validation(format!(
            "No backend credential for '{}' exists on disk (looked for: {})",
            tenant_id, listed
        )))
    }
}
