//! Tenantry Core
//!
//! Core types and text formats for the Tenantry white-label deployment system.
//!
//! This crate contains:
//! - Domain types: tenants, versions, release tags, keystores, pipeline runs
//! - The error taxonomy shared by every other crate

pub mod domain;
pub mod error;

pub use error::{Conflict, Error, Result};
