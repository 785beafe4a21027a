//! Tenant domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Per-tenant configuration document
///
/// Stored as JSON keyed by the tenant identifier. Field names are camelCase
/// on disk (`clientCode`, `bundleId`, `firebaseProjectId`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    pub client_code: String,
    #[serde(default)]
    pub app_name: Option<String>,
    pub bundle_id: String,
    pub firebase_project_id: String,
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub credentials: BackendCredentials,
}

/// Backend credential locations for a tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCredentials {
    /// Service-account JSON used to open an admin handle
    #[serde(default)]
    pub service_account: Option<PathBuf>,
    /// Android client config (`google-services.json`)
    #[serde(default)]
    pub google_services: Option<PathBuf>,
    /// iOS client config (`GoogleService-Info.plist`)
    #[serde(default)]
    pub google_service_info: Option<PathBuf>,
}

impl BackendCredentials {
    /// Whether at least one credential is configured
    pub fn has_any(&self) -> bool {
        self.service_account.is_some()
            || self.google_services.is_some()
            || self.google_service_info.is_some()
    }
}

/// Tenant metadata held by the coordination backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    #[serde(default)]
    pub credentials_path: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Validates a tenant identifier
///
/// Identifiers become branch and tag path components, so they are restricted
/// to lowercase ASCII letters, digits, `-` and `_`.
pub fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    if tenant_id.is_empty() {
        return Err(Error::validation("Tenant identifier cannot be empty"));
    }

    if tenant_id.len() > 64 {
        return Err(Error::validation(format!(
            "Tenant identifier '{}' is longer than 64 characters",
            tenant_id
        )));
    }

    let valid = tenant_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if !valid {
        return Err(Error::validation(format!(
            "Tenant identifier '{}' may only contain a-z, 0-9, '-' and '_'",
            tenant_id
        )));
    }

    Ok(())
}

impl TenantConfig {
    /// Validates the configuration for the given tenant
    ///
    /// Collects every problem so the operator can fix them in one pass.
    pub fn validate(&self, tenant_id: &str) -> Result<()> {
        validate_tenant_id(tenant_id)?;

        let mut problems = Vec::new();

        if self.client_code != tenant_id {
            problems.push(format!(
                "clientCode '{}' does not match tenant '{}'",
                self.client_code, tenant_id
            ));
        }

        if !is_reverse_dns(&self.bundle_id) {
            problems.push(format!(
                "bundleId '{}' is not a reverse-DNS identifier",
                self.bundle_id
            ));
        }

        if self.firebase_project_id.trim().is_empty() {
            problems.push("firebaseProjectId cannot be empty".to_string());
        }

        if !self.credentials.has_any() {
            problems.push("no backend credential is configured".to_string());
        }

        for (name, value) in &self.colors {
            if !is_hex_color(value) {
                problems.push(format!("color '{}' has invalid value '{}'", name, value));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Tenant '{}' configuration is invalid: {}",
                tenant_id,
                problems.join("; ")
            )))
        }
    }

    /// Display name, falling back to the client code
    pub fn display_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(&self.client_code)
    }
}

fn is_reverse_dns(bundle_id: &str) -> bool {
    let parts: Vec<&str> = bundle_id.split('.').collect();
    parts.len() >= 2
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
}
