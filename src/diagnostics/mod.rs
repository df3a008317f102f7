//! Diagnostics for batch runs.
//!
//! Every scenario a batch touches leaves a trace here: what was processed,
//! which windows had to be clamped, and which scenarios failed and why.

pub mod log;

// Re-export commonly used types
pub use log::{DiagnosticEntry, DiagnosticsLog, DiagnosticsStats, Severity};
