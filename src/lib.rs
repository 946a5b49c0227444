#![forbid(unsafe_code)]

//! chat-media-janitor (cmj) — media-retention and disk-pressure eviction
//! engine for a federated chat deployment.
//!
//! Two eviction triggers:
//! 1. **Retention** — age-based removal keyed by per-MIME-class day thresholds
//! 2. **Pressure** — disk-usage-triggered removal that runs until usage falls
//!    at or below a configured threshold or candidates are exhausted
//!
//! Run outcomes are summarized once per meaningfully-changed result: a
//! fingerprint-based dedup gate suppresses repeat notifications of an
//! unchanged state.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use chat_media_janitor::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use chat_media_janitor::core::config::Config;
//! use chat_media_janitor::engine::executor::EvictionExecutor;
//! ```

pub mod prelude;

pub mod core;
pub mod engine;
pub mod monitor;
pub mod notify;
pub mod store;
