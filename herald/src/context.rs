//! Request-scoped command context
//!
//! A context carries the invoking user and the entity that triggered the
//! command (e.g. the chat message). The framework passes it through unchanged;
//! transports supply their own implementations.

use std::fmt;

/// User running a command
pub trait User: Send + Sync + fmt::Debug {
    /// Stable identifier
    fn id(&self) -> &str;

    /// Name to show in responses
    fn display_name(&self) -> &str {
        self.id()
    }
}

/// Entity a command was triggered by
pub trait Trigger: Send + Sync + fmt::Debug {
    /// Raw text of the trigger
    fn content(&self) -> &str;
}

/// Context for a single command usage
pub trait CommandContext: Send + Sync {
    /// User that is running the command
    fn user(&self) -> &dyn User;

    /// Entity the command was triggered by
    fn trigger(&self) -> &dyn Trigger;
}

/// Plain user identified by a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicUser {
    id: String,
    display_name: String,
}

impl BasicUser {
    /// User whose display name is its id
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

impl User for BasicUser {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Trigger that is a line of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTrigger(pub String);

impl Trigger for TextTrigger {
    fn content(&self) -> &str {
        &self.0
    }
}

/// Context built from a [`BasicUser`] and a [`TextTrigger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicContext {
    pub user: BasicUser,
    pub trigger: TextTrigger,
}

impl BasicContext {
    /// Context for `user_id` typing `content`
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user: BasicUser::new(user_id),
            trigger: TextTrigger(content.into()),
        }
    }
}

impl CommandContext for BasicContext {
    fn user(&self) -> &dyn User {
        &self.user
    }

    fn trigger(&self) -> &dyn Trigger {
        &self.trigger
    }
}
