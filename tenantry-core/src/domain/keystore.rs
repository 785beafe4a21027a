//! Android signing properties
//!
//! `key.properties` is a flat `key=value` file read by the Gradle build to
//! locate the upload keystore.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Contents of an Android `key.properties` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreProperties {
    pub store_password: String,
    pub key_password: String,
    pub key_alias: String,
    pub store_file: String,
}

impl KeystoreProperties {
    /// Parses `key.properties` contents
    ///
    /// Blank lines and `#`/`!` comments are skipped. The value is everything
    /// after the first `=`, kept verbatim apart from the line ending, since
    /// passwords may legitimately contain `=` or surrounding spaces.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut store_password = None;
        let mut key_password = None;
        let mut key_alias = None;
        let mut store_file = None;

        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }

            let (key, value) = trimmed.split_once('=').ok_or_else(|| {
                Error::validation(format!(
                    "key.properties line {} is not a key=value pair",
                    idx + 1
                ))
            })?;

            let slot = match key.trim() {
                "storePassword" => &mut store_password,
                "keyPassword" => &mut key_password,
                "keyAlias" => &mut key_alias,
                "storeFile" => &mut store_file,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }

        let require = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::validation(format!("key.properties is missing '{}'", name)))
        };

        Ok(Self {
            store_password: require(store_password, "storePassword")?,
            key_password: require(key_password, "keyPassword")?,
            key_alias: require(key_alias, "keyAlias")?,
            store_file: require(store_file, "storeFile")?,
        })
    }
}

impl FromStr for KeystoreProperties {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeystoreProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "storePassword={}", self.store_password)?;
        writeln!(f, "keyPassword={}", self.key_password)?;
        writeln!(f, "keyAlias={}", self.key_alias)?;
        writeln!(f, "storeFile={}", self.store_file)
    }
}
