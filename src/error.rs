//! Tracer error type.

use core::fmt;

/// Errors reported while bringing the tracer up.
///
/// Producer paths never fail; a full buffer is the overflow state, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceError {
    /// The trace buffer could not be allocated
    OutOfMemory {
        /// Bytes requested
        requested: usize,
    },
    /// The drain thread could not be spawned
    DrainSpawn,
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::OutOfMemory { requested } => {
                write!(f, "out of memory allocating {} byte trace buffer", requested)
            }
            TraceError::DrainSpawn => write!(f, "failed to spawn trace drain thread"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TraceError {}
