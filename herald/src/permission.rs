//! Permission contract for commands and controllers
//!
//! The framework never decides whether a user holds a permission. That is
//! the job of a [`PermissionPolicy`] supplied by the embedding application;
//! this module only combines the answers according to a [`PermissionsMode`].
//!
//! # Example
//!
//! ```rust
//! use herald::permission::{PermissionPolicy, PermissionsMode};
//! use herald::{async_trait, CommandContext};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Perm {
//!     Kick,
//!     Ban,
//! }
//!
//! struct Moderators {
//!     ids: Vec<String>,
//! }
//!
//! #[async_trait]
//! impl PermissionPolicy<Perm> for Moderators {
//!     async fn holds(&self, context: &dyn CommandContext, permission: &Perm) -> bool {
//!         match permission {
//!             Perm::Kick => self.ids.iter().any(|id| id == context.user().id()),
//!             Perm::Ban => false,
//!         }
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::CommandContext;
use crate::value::TypeTag;

/// Mode for combining several permission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionsMode {
    /// Every permission must hold
    #[default]
    RequireAll,
    /// At least one permission must hold
    RequireAny,
}

/// Answers whether a permission holds for the user behind a context.
///
/// Generic over the application's permission type `P`.
#[async_trait]
pub trait PermissionPolicy<P>: Send + Sync {
    /// Check a single permission
    async fn holds(&self, context: &dyn CommandContext, permission: &P) -> bool;
}

/// Combine a policy's answers for several permissions.
///
/// `RequireAll` over an empty list holds; `RequireAny` over an empty list
/// does not. Evaluation stops at the first deciding answer.
pub async fn evaluate_permissions<P>(
    policy: &dyn PermissionPolicy<P>,
    context: &dyn CommandContext,
    permissions: &[P],
    mode: PermissionsMode,
) -> bool {
    match mode {
        PermissionsMode::RequireAll => {
            for permission in permissions {
                if !policy.holds(context, permission).await {
                    return false;
                }
            }
            true
        }
        PermissionsMode::RequireAny => {
            for permission in permissions {
                if policy.holds(context, permission).await {
                    return true;
                }
            }
            false
        }
    }
}

// ============================================================================
// Stock Policies
// ============================================================================

/// Grants every permission (testing and single-user tools)
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

#[async_trait]
impl<P: Sync> PermissionPolicy<P> for AllowAllPolicy {
    async fn holds(&self, _context: &dyn CommandContext, _permission: &P) -> bool {
        true
    }
}

/// Denies every permission
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllPolicy;

#[async_trait]
impl<P: Sync> PermissionPolicy<P> for DenyAllPolicy {
    async fn holds(&self, _context: &dyn CommandContext, _permission: &P) -> bool {
        false
    }
}

/// Policy backed by a synchronous closure
pub struct FnPolicy<F>(pub F);

#[async_trait]
impl<P, F> PermissionPolicy<P> for FnPolicy<F>
where
    P: Sync,
    F: Fn(&dyn CommandContext, &P) -> bool + Send + Sync,
{
    async fn holds(&self, context: &dyn CommandContext, permission: &P) -> bool {
        (self.0)(context, permission)
    }
}

// ============================================================================
// Requirements
// ============================================================================

/// Permissions a command requires before its handler may run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequirement<P> {
    pub permissions: Vec<P>,
    pub mode: PermissionsMode,
}

impl<P> PermissionRequirement<P> {
    /// Require every permission
    pub fn all(permissions: Vec<P>) -> Self {
        Self {
            permissions,
            mode: PermissionsMode::RequireAll,
        }
    }

    /// Require at least one permission
    pub fn any(permissions: Vec<P>) -> Self {
        Self {
            permissions,
            mode: PermissionsMode::RequireAny,
        }
    }
}

/// No policy is registered for a permission type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No permission policy registered for {0}")]
pub struct MissingPolicy(pub TypeTag);

/// Type-erased view of a [`PermissionRequirement`], stored on a command.
#[async_trait]
pub trait RequirementCheck: Send + Sync + fmt::Debug {
    /// Evaluate against the policy registered for the permission type
    async fn check(
        &self,
        policies: &PolicySet,
        context: &dyn CommandContext,
    ) -> Result<bool, MissingPolicy>;

    /// Combination mode
    fn mode(&self) -> PermissionsMode;

    /// Permission type the requirement is expressed in
    fn permission_type(&self) -> TypeTag;
}

#[async_trait]
impl<P> RequirementCheck for PermissionRequirement<P>
where
    P: fmt::Debug + Send + Sync + 'static,
{
    async fn check(
        &self,
        policies: &PolicySet,
        context: &dyn CommandContext,
    ) -> Result<bool, MissingPolicy> {
        let policy = policies.expect::<P>()?;
        Ok(evaluate_permissions(policy.as_ref(), context, &self.permissions, self.mode).await)
    }

    fn mode(&self) -> PermissionsMode {
        self.mode
    }

    fn permission_type(&self) -> TypeTag {
        TypeTag::of::<P>()
    }
}

// ============================================================================
// Policy Set
// ============================================================================

/// Policies keyed by the permission type they evaluate.
#[derive(Clone, Default)]
pub struct PolicySet {
    policies: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl PolicySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the policy for `P`, replacing any previous one
    pub fn insert<P: 'static>(&mut self, policy: Arc<dyn PermissionPolicy<P>>) {
        self.policies.insert(TypeId::of::<P>(), Arc::new(policy));
    }

    /// Policy for `P`, if installed
    pub fn get<P: 'static>(&self) -> Option<Arc<dyn PermissionPolicy<P>>> {
        self.policies
            .get(&TypeId::of::<P>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<dyn PermissionPolicy<P>>>())
            .cloned()
    }

    /// Policy for `P`, failing with [`MissingPolicy`]
    pub fn expect<P: 'static>(&self) -> Result<Arc<dyn PermissionPolicy<P>>, MissingPolicy> {
        self.get::<P>().ok_or_else(|| MissingPolicy(TypeTag::of::<P>()))
    }

    /// Number of installed policies
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no policy is installed
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl fmt::Debug for PolicySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicySet")
            .field("len", &self.policies.len())
            .finish()
    }
}
