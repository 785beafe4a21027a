//! Service Module
//!
//! Domain logic between the pipeline and the repositories.
//! Services own no external state of their own; everything they change
//! lives in the working tree, the remote, or the backend.

pub mod branch;
pub mod directory;
pub mod keystore;
pub mod tag_store;
pub mod tenant;
pub mod version;

pub use branch::BranchLifecycle;
pub use directory::TenantDirectory;
pub use keystore::{KeystoreManager, KeystoreStatus};
pub use tag_store::TagStore;
pub use tenant::TenantStore;
pub use version::VersionManager;
