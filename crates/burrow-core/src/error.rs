//! Error types.

use core::fmt;

use crate::ChannelId;

/// Pipeline configuration errors.
///
/// Raised when a new real channel cannot be given its processing stages.
/// This is fatal for that channel's initialization: the substrate must not
/// deliver any further events on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline factory refused the channel.
    Rejected { channel: ChannelId, reason: String },
    /// A pipeline was already installed on the channel.
    AlreadyConfigured(ChannelId),
    /// The channel closed before its pipeline could be installed.
    ChannelClosed(ChannelId),
}

impl PipelineError {
    /// Convenience constructor for factories refusing a channel.
    pub fn rejected(channel: ChannelId, reason: impl Into<String>) -> Self {
        Self::Rejected {
            channel,
            reason: reason.into(),
        }
    }

    /// The channel whose initialization failed.
    pub fn channel(&self) -> ChannelId {
        match self {
            Self::Rejected { channel, .. } => *channel,
            Self::AlreadyConfigured(channel) => *channel,
            Self::ChannelClosed(channel) => *channel,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { channel, reason } => {
                write!(f, "pipeline rejected channel {channel}: {reason}")
            }
            Self::AlreadyConfigured(channel) => {
                write!(f, "channel {channel} already has a pipeline")
            }
            Self::ChannelClosed(channel) => {
                write!(f, "channel {channel} closed before pipeline install")
            }
        }
    }
}

impl std::error::Error for PipelineError {}
