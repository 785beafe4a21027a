//! Android signing material
//!
//! Each tenant has one upload keystore and its `key.properties` under
//! `{credentials_dir}/{tenant}/android/`. Existing material is never
//! overwritten: regeneration must be confirmed and moves the old files to
//! `archive/{timestamp}/` first.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tenantry_core::domain::keystore::KeystoreProperties;
use tenantry_core::domain::tenant::{TenantConfig, validate_tenant_id};
use tenantry_core::{Conflict, Error, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::KeystoreGenerator;

const KEYSTORE_FILE: &str = "upload-keystore.jks";
const PROPERTIES_FILE: &str = "key.properties";
const KEY_ALIAS: &str = "upload";

/// Outcome of [`KeystoreManager::ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeystoreStatus {
    /// Material was already present and left alone
    Existing(KeystoreProperties),
    /// New material was generated
    Generated(KeystoreProperties),
}

impl KeystoreStatus {
    pub fn properties(&self) -> &KeystoreProperties {
        match self {
            KeystoreStatus::Existing(p) | KeystoreStatus::Generated(p) => p,
        }
    }
}

pub struct KeystoreManager {
    credentials_dir: PathBuf,
    generator: Arc<dyn KeystoreGenerator>,
}

impl KeystoreManager {
    pub fn new(credentials_dir: impl Into<PathBuf>, generator: Arc<dyn KeystoreGenerator>) -> Self {
        Self {
            credentials_dir: credentials_dir.into(),
            generator,
        }
    }

    pub fn android_dir(&self, tenant_id: &str) -> PathBuf {
        self.credentials_dir.join(tenant_id).join("android")
    }

    pub fn keystore_path(&self, tenant_id: &str) -> PathBuf {
        self.android_dir(tenant_id).join(KEYSTORE_FILE)
    }

    pub fn properties_path(&self, tenant_id: &str) -> PathBuf {
        self.android_dir(tenant_id).join(PROPERTIES_FILE)
    }

    /// Generates signing material unless it already exists
    ///
    /// Half-present material (a keystore without properties or the reverse)
    /// is reported instead of being completed.
    pub async fn ensure(&self, tenant_id: &str, config: &TenantConfig) -> Result<KeystoreStatus> {
        validate_tenant_id(tenant_id)?;
        let keystore = self.keystore_path(tenant_id);
        let properties = self.properties_path(tenant_id);

        match (keystore.exists(), properties.exists()) {
            (true, true) => {
                info!("Keystore for {} already exists", tenant_id);
                Ok(KeystoreStatus::Existing(self.validate(tenant_id)?))
            }
            (false, false) => Ok(KeystoreStatus::Generated(self.generate(tenant_id, config).await?)),
            (true, false) => Err(incomplete(&keystore, &properties)),
            (false, true) => Err(incomplete(&properties, &keystore)),
        }
    }

    /// Replaces the signing material, archiving what was there
    ///
    /// # Arguments
    /// * `confirmed` - Must be true when material exists; otherwise the call
    ///   fails with [`Conflict::KeystoreExists`] and nothing changes
    ///
    /// # Returns
    /// The new properties and the archive directory, if anything was archived
    pub async fn regenerate(
        &self,
        tenant_id: &str,
        config: &TenantConfig,
        confirmed: bool,
    ) -> Result<(KeystoreProperties, Option<PathBuf>)> {
        validate_tenant_id(tenant_id)?;
        let existing: Vec<PathBuf> = [self.keystore_path(tenant_id), self.properties_path(tenant_id)]
            .into_iter()
            .filter(|p| p.exists())
            .collect();

        if existing.is_empty() {
            return Ok((self.generate(tenant_id, config).await?, None));
        }

        if !confirmed {
            return Err(Conflict::KeystoreExists(
                self.keystore_path(tenant_id).display().to_string(),
            )
            .into());
        }

        let archive = self
            .android_dir(tenant_id)
            .join("archive")
            .join(Utc::now().format("%Y%m%d%H%M%S").to_string());
        create_dir(&archive)?;
        for path in &existing {
            if let Some(name) = path.file_name() {
                let target = archive.join(name);
                std::fs::rename(path, &target).map_err(|e| {
                    Error::io(format!("Failed to archive {}", path.display()), e)
                })?;
            }
        }
        warn!("Archived signing material of {} to {}", tenant_id, archive.display());

        Ok((self.generate(tenant_id, config).await?, Some(archive)))
    }

    /// Checks that `key.properties` parses and points at an existing keystore
    pub fn validate(&self, tenant_id: &str) -> Result<KeystoreProperties> {
        let path = self.properties_path(tenant_id);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::validation(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let properties = KeystoreProperties::parse(&contents)?;

        let store_file = Path::new(&properties.store_file);
        let store_file = if store_file.is_absolute() {
            store_file.to_path_buf()
        } else {
            self.android_dir(tenant_id).join(store_file)
        };
        if !store_file.is_file() {
            return Err(Error::validation(format!(
                "Keystore {} referenced by {} does not exist",
                store_file.display(),
                path.display()
            )));
        }

        Ok(properties)
    }

    async fn generate(&self, tenant_id: &str, config: &TenantConfig) -> Result<KeystoreProperties> {
        create_dir(&self.android_dir(tenant_id))?;

        let keystore = self.keystore_path(tenant_id);
        let properties = KeystoreProperties {
            store_password: Uuid::new_v4().simple().to_string(),
            key_password: Uuid::new_v4().simple().to_string(),
            key_alias: KEY_ALIAS.to_string(),
            store_file: keystore.to_string_lossy().into_owned(),
        };
        let distinguished_name = format!("CN={}, O={}", config.display_name(), config.client_code);

        self.generator
            .generate(&keystore, &properties, &distinguished_name)
            .await?;

        let path = self.properties_path(tenant_id);
        std::fs::write(&path, properties.to_string())
            .map_err(|e| Error::io(format!("Failed to write {}", path.display()), e))?;

        info!("Generated keystore for {}", tenant_id);
        Ok(properties)
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::io(format!("Failed to create {}", dir.display()), e))
}

fn incomplete(present: &Path, missing: &Path) -> Error {
    Error::validation(format!(
        "Signing material is incomplete: {} exists but {} is missing",
        present.display(),
        missing.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeKeystoreGenerator;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn config() -> TenantConfig {
        serde_json::from_str(
            r#"{
                "clientCode": "acme",
                "appName": "Acme Rewards",
                "bundleId": "com.acme.rewards",
                "firebaseProjectId": "acme-rewards",
                "credentials": { "serviceAccount": "sa.json" }
            }"#,
        )
        .unwrap()
    }

    fn manager(dir: &TempDir) -> (KeystoreManager, Arc<FakeKeystoreGenerator>) {
        let generator = Arc::new(FakeKeystoreGenerator::default());
        (
            KeystoreManager::new(dir.path(), Arc::clone(&generator) as Arc<dyn KeystoreGenerator>),
            generator,
        )
    }

    #[tokio::test]
    async fn test_ensure_generates_once() {
        let dir = TempDir::new().unwrap();
        let (keystores, generator) = manager(&dir);

        let first = keystores.ensure("acme", &config()).await.unwrap();
        assert!(matches!(first, KeystoreStatus::Generated(_)));
        assert_eq!(first.properties().key_alias, "upload");
        assert_ne!(first.properties().store_password, first.properties().key_password);

        let second = keystores.ensure("acme", &config()).await.unwrap();
        assert_eq!(second, KeystoreStatus::Existing(first.properties().clone()));
        assert_eq!(generator.generated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_regenerate_requires_confirmation_and_archives() {
        let dir = TempDir::new().unwrap();
        let (keystores, generator) = manager(&dir);
        let original = keystores.ensure("acme", &config()).await.unwrap();

        let err = keystores.regenerate("acme", &config(), false).await.unwrap_err();
        assert!(matches!(err.conflict(), Some(Conflict::KeystoreExists(_))));
        assert_eq!(keystores.validate("acme").unwrap(), *original.properties());

        let (fresh, archive) = keystores.regenerate("acme", &config(), true).await.unwrap();
        let archive = archive.unwrap();
        assert!(archive.join("upload-keystore.jks").is_file());
        let archived = std::fs::read_to_string(archive.join("key.properties")).unwrap();
        assert_eq!(archived, original.properties().to_string());

        assert_ne!(fresh.store_password, original.properties().store_password);
        assert_eq!(keystores.validate("acme").unwrap(), fresh);
        assert_eq!(generator.generated.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_incomplete_material_is_reported() {
        let dir = TempDir::new().unwrap();
        let (keystores, generator) = manager(&dir);
        std::fs::create_dir_all(keystores.android_dir("acme")).unwrap();
        std::fs::write(keystores.keystore_path("acme"), b"jks").unwrap();

        let err = keystores.ensure("acme", &config()).await.unwrap_err();
        assert!(err.to_string().contains("incomplete"));
        assert_eq!(generator.generated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validate_detects_missing_store_file() {
        let dir = TempDir::new().unwrap();
        let (keystores, _) = manager(&dir);
        std::fs::create_dir_all(keystores.android_dir("acme")).unwrap();
        std::fs::write(
            keystores.properties_path("acme"),
            "storePassword=a\nkeyPassword=b\nkeyAlias=upload\nstoreFile=gone.jks\n",
        )
        .unwrap();

        let err = keystores.validate("acme").unwrap_err();
        assert!(err.to_string().contains("gone.jks"));
    }
}
