//! Deployment pipeline
//!
//! The orchestrator is the only entry point that changes tenant state; the
//! CLI builds requests and renders the reports it returns.

pub mod orchestrator;
pub mod request;

pub use orchestrator::{Collaborators, PipelineOrchestrator};
pub use request::{
    CancellationFlag, DeployRequest, ExistingBuildRequest, RollbackReport, RollbackRequest,
};
