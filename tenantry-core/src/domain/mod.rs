//! Core domain types
//!
//! This module contains the domain structures shared across Tenantry crates.
//! The text formats that are written to disk or to the version-control
//! remote (version line, release tag names, keystore properties) each come
//! with an explicit parser and formatter.

pub mod keystore;
pub mod pipeline;
pub mod release;
pub mod tenant;
pub mod version;
