//! Trace model and loading.
//!
//! Traces come from the power analyzer as CSV exports. The loader reads the
//! value and timestamp columns; everything downstream borrows the result.

pub mod loader;
pub mod types;

pub use loader::{load_trace, read_trace};
pub use types::{Trace, TraceColumns, TraceView};
