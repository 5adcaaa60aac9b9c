//! Base controller for command handlers
//!
//! A [`CommandController`] bundles what most handlers need: the context of
//! the current usage, the channel to answer on, and the policy that decides
//! the application's permissions of type `P`. Application controllers usually
//! wrap one and implement [`FromInvocation`] by delegating to it.

use std::fmt;
use std::sync::Arc;

use crate::context::CommandContext;
use crate::dispatch::{DispatchError, FromInvocation, Invocation};
use crate::messenger::{Messenger, MessengerError};
use crate::permission::{evaluate_permissions, PermissionPolicy, PermissionsMode};

/// Controller bound to one command usage
pub struct CommandController<P> {
    messenger: Arc<dyn Messenger>,
    context: Arc<dyn CommandContext>,
    policy: Arc<dyn PermissionPolicy<P>>,
}

impl<P> CommandController<P> {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        context: Arc<dyn CommandContext>,
        policy: Arc<dyn PermissionPolicy<P>>,
    ) -> Self {
        Self {
            messenger,
            context,
            policy,
        }
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Context of the current usage
    pub fn context(&self) -> &Arc<dyn CommandContext> {
        &self.context
    }

    pub fn policy(&self) -> &Arc<dyn PermissionPolicy<P>> {
        &self.policy
    }

    /// Send a message in response to the current usage
    pub async fn respond(&self, message: &str) -> Result<(), MessengerError> {
        self.messenger.send(self.context.as_ref(), message).await
    }

    /// Whether the current user holds `permissions` under `mode`
    pub async fn has_permission(&self, permissions: &[P], mode: PermissionsMode) -> bool
    where
        P: Sync,
    {
        let granted =
            evaluate_permissions(self.policy.as_ref(), self.context.as_ref(), permissions, mode)
                .await;
        tracing::debug!(
            user = %self.context.user().id(),
            count = permissions.len(),
            ?mode,
            granted,
            "Permission check"
        );
        granted
    }

    /// Whether the current user holds every one of `permissions`
    pub async fn has_all_permissions(&self, permissions: &[P]) -> bool
    where
        P: Sync,
    {
        self.has_permission(permissions, PermissionsMode::RequireAll)
            .await
    }

    /// Whether the current user holds at least one of `permissions`
    pub async fn has_any_permission(&self, permissions: &[P]) -> bool
    where
        P: Sync,
    {
        self.has_permission(permissions, PermissionsMode::RequireAny)
            .await
    }
}

impl<P> Clone for CommandController<P> {
    fn clone(&self) -> Self {
        Self {
            messenger: Arc::clone(&self.messenger),
            context: Arc::clone(&self.context),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<P> fmt::Debug for CommandController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandController")
            .field("user", &self.context.user().id())
            .finish_non_exhaustive()
    }
}

impl<P: 'static> FromInvocation for CommandController<P> {
    fn from_invocation(invocation: &Invocation) -> Result<Self, DispatchError> {
        let policy = invocation.policies().expect::<P>()?;
        Ok(Self::new(
            Arc::clone(invocation.messenger()),
            Arc::clone(invocation.context()),
            policy,
        ))
    }
}
