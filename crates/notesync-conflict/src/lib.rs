//! Notesync Conflict - Conflict detection and resolution
//!
//! Provides:
//! - Timestamp-based divergence detection against the last common sync point
//! - Deterministic resolution (keep-local, keep-remote, textual merge)
//! - Policy for automatic resolution and decision timeouts

pub mod detector;
pub mod error;
pub mod policy;
pub mod resolver;

pub use detector::{ConflictDetector, DetectionResult};
pub use error::ConflictError;
pub use policy::ConflictPolicy;
pub use resolver::ConflictResolver;
