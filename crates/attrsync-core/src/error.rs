//! Error types for attrsync core.

use std::fmt;

/// Errors raised when talking to an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// The actor has stopped and no longer accepts messages.
    Stopped,
    /// The actor's mailbox is full.
    MailboxFull,
    /// A request did not receive a reply within its timeout.
    Timeout,
    /// The actor dropped the reply handle without answering.
    NoReply,
    /// The actor thread could not be started.
    Spawn(String),
}

impl fmt::Display for ActorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Actor has stopped"),
            Self::MailboxFull => write!(f, "Actor mailbox is full"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::NoReply => write!(f, "Actor dropped the request without replying"),
            Self::Spawn(msg) => write!(f, "Failed to spawn actor thread: {msg}"),
        }
    }
}

impl std::error::Error for ActorError {}

/// A specialized Result type for actor operations.
pub type ActorResult<T> = std::result::Result<T, ActorError>;
