//! Android keystore generation

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tenantry_core::Result;
use tenantry_core::domain::keystore::KeystoreProperties;
use tracing::info;

use crate::process::CommandSpec;

/// Repository trait for creating signing keystores
#[async_trait]
pub trait KeystoreGenerator: Send + Sync {
    /// Creates a keystore at `path` with the alias and passwords in `properties`
    async fn generate(&self, path: &Path, properties: &KeystoreProperties, distinguished_name: &str) -> Result<()>;
}

/// `keytool -genkeypair` implementation of KeystoreGenerator
pub struct KeytoolGenerator {
    timeout: Duration,
    validity_days: u32,
}

impl KeytoolGenerator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            // Play requires upload keys valid past 2033
            validity_days: 10_000,
        }
    }
}

#[async_trait]
impl KeystoreGenerator for KeytoolGenerator {
    async fn generate(&self, path: &Path, properties: &KeystoreProperties, distinguished_name: &str) -> Result<()> {
        info!("Generating keystore {}", path.display());
        CommandSpec::new("keytool")
            .args(keytool_args(path, properties, distinguished_name, self.validity_days))
            .timeout(self.timeout)
            .run()
            .await?;
        Ok(())
    }
}

fn keytool_args(
    path: &Path,
    properties: &KeystoreProperties,
    distinguished_name: &str,
    validity_days: u32,
) -> Vec<String> {
    vec![
        "-genkeypair".to_string(),
        "-noprompt".to_string(),
        "-keystore".to_string(),
        path.to_string_lossy().into_owned(),
        "-storetype".to_string(),
        "JKS".to_string(),
        "-alias".to_string(),
        properties.key_alias.clone(),
        "-keyalg".to_string(),
        "RSA".to_string(),
        "-keysize".to_string(),
        "2048".to_string(),
        "-validity".to_string(),
        validity_days.to_string(),
        "-storepass".to_string(),
        properties.store_password.clone(),
        "-keypass".to_string(),
        properties.key_password.clone(),
        "-dname".to_string(),
        distinguished_name.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keytool_args() {
        let properties = KeystoreProperties {
            store_password: "s3cret".to_string(),
            key_password: "k3y".to_string(),
            key_alias: "upload".to_string(),
            store_file: "upload-keystore.jks".to_string(),
        };
        let args = keytool_args(
            Path::new("/creds/acme/upload-keystore.jks"),
            &properties,
            "CN=Acme",
            10_000,
        );

        let value_of = |flag: &str| {
            let idx = args.iter().position(|a| a == flag).unwrap();
            args[idx + 1].clone()
        };
        assert_eq!(value_of("-keystore"), "/creds/acme/upload-keystore.jks");
        assert_eq!(value_of("-alias"), "upload");
        assert_eq!(value_of("-storepass"), "s3cret");
        assert_eq!(value_of("-keypass"), "k3y");
        assert_eq!(value_of("-dname"), "CN=Acme");
    }
}
