//! Tenantry HTTP Clients
//!
//! Thin, typed HTTP clients for the external services the deployment system
//! talks to:
//! - Firestore REST, for tenant metadata and remote feature flags
//! - Telegram Bot API, for pipeline notifications
//!
//! # Example
//!
//! ```no_run
//! use tenantry_client::FirestoreClient;
//!
//! # async fn example() -> tenantry_client::Result<()> {
//! let client = FirestoreClient::new("acme-loyalty", "ya29.token");
//!
//! if let Some(doc) = client.get_document("clients", "acme").await? {
//!     println!("active: {}", doc["active"]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
mod firestore;
mod telegram;

pub use error::{ClientError, Result};
pub use firestore::{FirestoreClient, decode_fields, encode_fields};
pub use telegram::TelegramClient;

use serde::de::DeserializeOwned;

// =============================================================================
// Response Handlers
// =============================================================================

/// Handle an API response and deserialize JSON
///
/// Checks the status code and returns an appropriate error if the request
/// failed, or deserializes the response body if successful.
pub(crate) async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Handle an API response whose body is not needed
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}
