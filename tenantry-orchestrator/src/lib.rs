//! Tenantry Orchestrator
//!
//! Runtime of the white-label deployment system.
//!
//! Architecture:
//! - Configuration: repository layout, pool sizing, timeouts, retry policy
//! - Repositories: boundaries to git, the backend platform, the mobile
//!   toolchain, screenshot capture, notifications and keytool
//! - Pool: bounded, single-flight cache of backend handles
//! - Services: tags, deploy branches, versions, tenants, signing material
//! - Pipeline: the phase state machine that ties them together

pub mod config;
pub mod pipeline;
pub mod pool;
pub mod process;
pub mod repository;
pub mod retry;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, MasterBackend, RetryPolicy, TelegramTarget};
pub use pipeline::{
    CancellationFlag, Collaborators, DeployRequest, ExistingBuildRequest, PipelineOrchestrator,
    RollbackReport, RollbackRequest,
};
pub use pool::{ConnectionPool, PoolKey, PooledHandle};
