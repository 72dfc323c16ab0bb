#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for readme-forge
//!
//! This library gathers repository context from a source-control provider, enriches it
//! through an LLM, and hands the result back either synchronously or through a push
//! channel with a pull-based fallback.
//!
//! # Module Organization
//!
//! - [`context`]: Provider calls, pagination, commit aggregation, and SHA-keyed caching
//! - [`delivery`]: Channel registry, fallback store, and the background worker pool
//! - [`service`]: The façade request handlers call into
//! - `commands`: Command-line interface and configuration

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

mod commands;

#[doc(hidden)]
pub mod context;

#[doc(hidden)]
pub mod delivery;

#[doc(hidden)]
pub mod service;

pub use crate::commands::{Host, run};
