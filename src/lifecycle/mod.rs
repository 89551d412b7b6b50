//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Readiness (readiness.rs):
//!     Discovery scans every provider once → gate opens → Ingestion starts
//!
//! Shutdown (shutdown.rs):
//!     Signal or stage exit → broadcast → every stage stops
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```

pub mod readiness;
pub mod shutdown;
pub mod signals;

pub use readiness::Readiness;
pub use shutdown::Shutdown;
