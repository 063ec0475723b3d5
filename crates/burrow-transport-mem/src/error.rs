//! Transport error type.

use core::fmt;

use burrow_core::PipelineError;

/// Errors from the in-memory transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel or server has closed.
    Closed,
    /// The server is not bound to an address.
    NotBound,
    /// Pipeline configuration failed while opening or accepting a channel.
    Pipeline(PipelineError),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "transport closed"),
            Self::NotBound => write!(f, "server not bound"),
            Self::Pipeline(e) => write!(f, "pipeline error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for TransportError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}
