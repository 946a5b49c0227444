//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use chat_media_janitor::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, PolicyConfig};
pub use crate::core::errors::{JanitorError, Result};

// Monitor
pub use crate::monitor::disk::DiskInspector;
#[cfg(unix)]
pub use crate::monitor::disk::StatvfsInspector;

// Store
pub use crate::store::{CandidateFilter, CandidateStore, DeleteError, MediaRecord, MimeClass};

// Engine
pub use crate::engine::Mode;
pub use crate::engine::diagnostics::RunDiagnostics;
pub use crate::engine::executor::EvictionExecutor;
pub use crate::engine::selector::{EvictionPlan, build_plan};

// Notify
pub use crate::notify::dedup::{DedupGate, FingerprintStore, GateDecision};
pub use crate::notify::{ChatSender, EventRedactor, PrefixSource};
