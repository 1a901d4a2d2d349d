//! Shared types, error model, and configuration for Articulate.
//!
//! This crate is the foundation depended on by all other Articulate crates.
//! It provides:
//! - [`ArticulateError`]: the unified error type
//! - Domain types ([`EquivalentCourse`], [`CourseEquivalenceFact`], [`AgreementKey`], ...)
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssistConfig, DefaultsConfig, RunConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{ArticulateError, Result};
pub use types::{
    AgreementKey, CourseEquivalenceFact, DedupPolicy, DepartmentDirectory, EquivalentCourse,
    Institution,
};
