//! Response channel
//!
//! Controllers answer through a [`Messenger`], which knows how to deliver a
//! message for a given context on the embedding transport.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::CommandContext;

/// Error type for message delivery
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessengerError {
    #[error("Failed to deliver message: {0}")]
    Delivery(String),

    #[error("Response channel is closed")]
    Closed,
}

/// Sends messages in response to a command context
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver `message` for `context`
    async fn send(&self, context: &dyn CommandContext, message: &str) -> Result<(), MessengerError>;
}

/// Message captured by [`MemoryMessenger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Id of the user the context belonged to
    pub user: String,
    /// Message text
    pub message: String,
}

/// Messenger that keeps every message in memory (testing)
#[derive(Debug, Default)]
pub struct MemoryMessenger {
    sent: Mutex<Vec<SentMessage>>,
}

impl MemoryMessenger {
    /// Create an empty messenger
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Text of messages sent so far
    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.message).collect()
    }

    /// Forget every message
    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl Messenger for MemoryMessenger {
    async fn send(&self, context: &dyn CommandContext, message: &str) -> Result<(), MessengerError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(SentMessage {
                user: context.user().id().to_string(),
                message: message.to_string(),
            });
        Ok(())
    }
}

/// Messenger that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMessenger;

#[async_trait]
impl Messenger for NullMessenger {
    async fn send(&self, _context: &dyn CommandContext, _message: &str) -> Result<(), MessengerError> {
        Ok(())
    }
}
