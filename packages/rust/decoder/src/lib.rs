//! Decoding of transfer-API articulation agreements.
//!
//! This crate provides:
//! - [`repair`]: turns a double-encoded agreement payload into an [`ArticulationDocument`]
//! - [`extract_facts`]: walks the agreement tree and yields course-equivalence facts
//! - [`EquivalenceMap`]: folds facts from many queries into one mapping
//!
//! Everything here is pure and in-memory; fetching and persistence live elsewhere.

pub mod aggregate;
pub mod document;
pub mod repair;
pub mod walker;

pub use aggregate::EquivalenceMap;
pub use document::{ARTICULATIONS_PATH, ArticulationDocument};
pub use repair::{repair, repair_text};
pub use walker::{COURSE_TYPE, Facts, extract_facts};
