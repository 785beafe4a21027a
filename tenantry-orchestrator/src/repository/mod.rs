//! Repository layer
//!
//! Repositories wrap the external collaborators of the deployment flow
//! (version control, backend platform, build toolchain, screenshot capture,
//! notifications, keystore tooling) behind traits without business logic.
//!
//! All repositories are trait-based so services can be tested with fakes.

pub mod backend;
pub mod git;
pub mod keytool;
pub mod notifier;
pub mod screenshots;
pub mod toolchain;

// Re-export traits
pub use backend::{BackendPlatform, BackendSession, DocumentStore};
pub use git::VersionControl;
pub use keytool::KeystoreGenerator;
pub use notifier::Notifier;
pub use screenshots::ScreenshotGenerator;
pub use toolchain::BuildToolchain;

// Re-export implementations
pub use backend::{FirestorePlatform, TenantHandle};
pub use git::GitCli;
pub use keytool::KeytoolGenerator;
pub use notifier::{LogNotifier, TelegramNotifier};
pub use screenshots::ScriptScreenshotGenerator;
pub use toolchain::FlutterToolchain;
