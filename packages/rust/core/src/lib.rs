//! Pipeline orchestration for Articulate.
//!
//! This crate ties the transfer-API client, the agreement decoder and the
//! output sink together into an end-to-end run (see [`pipeline::run_pipeline`]).

pub mod directory;
pub mod output;
pub mod pipeline;
