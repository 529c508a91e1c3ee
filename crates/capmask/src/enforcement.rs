//! Authorization guard.
//!
//! Gates one protected operation per call. The guard walks a small state
//! machine and is recomputed from scratch on every request:
//!
//! ```text
//! Start ─► AuthenticationCheck ─┬─► Deny(Unauthorized)       auth required, no identity
//!                               ├─► Allow                    nothing left to check
//!                               └─► AbilityCheck ─┬─► Allow
//!                                                 └─► Deny(Forbidden | BadRequest)
//! ```
//!
//! Failure classification in `AbilityCheck`:
//!
//! | Situation                                         | Outcome      |
//! |---------------------------------------------------|--------------|
//! | auth required, requirement list declared but empty | `Forbidden`  |
//! | exactly one requirement group, any check fails     | `Forbidden`  |
//! | two or more requirement groups, any check fails    | `BadRequest` |
//!
//! The `BadRequest` branch is kept for compatibility with existing clients.
//! Every check is evaluated; the denial never says which one failed.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ability::{AbilityDecoder, CompiledAbility};
use crate::catalog::PermissionCatalog;
use crate::compactor::AuthIdentity;
use crate::policy::{AbilityRequirement, OperationPolicy, OperationTable};

// ============================================================================
// Decisions
// ============================================================================

/// Denial category, for the caller to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialKind {
    /// No identity where one is required.
    Unauthorized,
    /// Identity present but a capability is missing, or the operation is
    /// misconfigured.
    Forbidden,
    /// Several requirement groups were declared and at least one failed.
    BadRequest,
}

impl DenialKind {
    /// HTTP status conventionally used to render this denial.
    pub fn status_code(&self) -> u16 {
        match self {
            DenialKind::Unauthorized => 401,
            DenialKind::Forbidden => 403,
            DenialKind::BadRequest => 400,
        }
    }
}

impl std::fmt::Display for DenialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DenialKind::Unauthorized => "unauthorized",
            DenialKind::Forbidden => "forbidden",
            DenialKind::BadRequest => "bad request",
        };
        f.write_str(name)
    }
}

/// A refused operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Denial {
    pub kind: DenialKind,
    pub message: String,
}

impl Denial {
    fn new(kind: DenialKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Terminal guard outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// The denial kind, if denied.
    pub fn denial_kind(&self) -> Option<DenialKind> {
        match self {
            Decision::Allow => None,
            Decision::Deny(denial) => Some(denial.kind),
        }
    }
}

impl From<Decision> for Result<(), Denial> {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(denial),
        }
    }
}

/// Guard state machine positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Start,
    AuthenticationCheck,
    AbilityCheck,
    Done(Decision),
}

// ============================================================================
// Guard
// ============================================================================

/// Request-time authorization gate.
///
/// Holds no per-request state; one guard may serve any number of concurrent
/// requests.
pub struct AuthorizationGuard<'a> {
    catalog: &'a PermissionCatalog,
    audit_enabled: bool,
}

impl<'a> AuthorizationGuard<'a> {
    pub fn new(catalog: &'a PermissionCatalog) -> Self {
        Self {
            catalog,
            audit_enabled: true,
        }
    }

    /// Disables decision logging (for testing).
    #[must_use]
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Evaluates `policy` for the (possibly absent) `identity`.
    pub fn evaluate(&self, identity: Option<&AuthIdentity>, policy: &OperationPolicy) -> Decision {
        let decision = self.decide(identity, policy);
        self.record(None, identity, &decision);
        decision
    }

    /// [`evaluate`](Self::evaluate) as a `Result`, so callers can use `?`.
    pub fn authorize(
        &self,
        identity: Option<&AuthIdentity>,
        policy: &OperationPolicy,
    ) -> Result<(), Denial> {
        self.evaluate(identity, policy).into()
    }

    /// Looks `operation` up in `table` and evaluates it.
    ///
    /// Operations with no declaration are refused as `Forbidden`.
    pub fn evaluate_operation(
        &self,
        table: &OperationTable,
        operation: &str,
        identity: Option<&AuthIdentity>,
    ) -> Decision {
        let decision = match table.get(operation) {
            Some(policy) => self.decide(identity, policy),
            None => Decision::Deny(Denial::new(
                DenialKind::Forbidden,
                format!("operation '{operation}' has no access declaration"),
            )),
        };
        self.record(Some(operation), identity, &decision);
        decision
    }

    fn decide(&self, identity: Option<&AuthIdentity>, policy: &OperationPolicy) -> Decision {
        let mut state = GuardState::Start;
        loop {
            state = match state {
                GuardState::Done(decision) => return decision,
                other => self.step(other, identity, policy),
            };
        }
    }

    fn record(&self, operation: Option<&str>, identity: Option<&AuthIdentity>, decision: &Decision) {
        if !self.audit_enabled {
            return;
        }

        let principal = identity.map(|i| i.identity_id);
        match decision {
            Decision::Allow => info!(operation = ?operation, identity = ?principal, "operation allowed"),
            Decision::Deny(denial) => warn!(
                operation = ?operation,
                identity = ?principal,
                kind = %denial.kind,
                reason = %denial.message,
                "operation denied"
            ),
        }
    }

    /// Advances the state machine by one transition.
    pub fn step(
        &self,
        state: GuardState,
        identity: Option<&AuthIdentity>,
        policy: &OperationPolicy,
    ) -> GuardState {
        match state {
            GuardState::Start => GuardState::AuthenticationCheck,

            GuardState::AuthenticationCheck => match identity {
                None if policy.requires_auth => GuardState::Done(Decision::Deny(Denial::new(
                    DenialKind::Unauthorized,
                    "authentication required",
                ))),
                Some(_) if policy.abilities.is_some() => GuardState::AbilityCheck,
                _ => GuardState::Done(Decision::Allow),
            },

            GuardState::AbilityCheck => {
                let requirements = policy.abilities.as_deref().unwrap_or_default();
                GuardState::Done(match identity {
                    Some(identity) => self.check_abilities(identity, policy.requires_auth, requirements),
                    None => Decision::Allow,
                })
            }

            done @ GuardState::Done(_) => done,
        }
    }

    fn check_abilities(
        &self,
        identity: &AuthIdentity,
        requires_auth: bool,
        requirements: &[AbilityRequirement],
    ) -> Decision {
        if requirements.is_empty() {
            return if requires_auth {
                Decision::Deny(Denial::new(DenialKind::Forbidden, "no predefined ability"))
            } else {
                Decision::Allow
            };
        }

        let abilities = AbilityDecoder::new(self.catalog).decode(&identity.subject_permission_map);
        let compiled = CompiledAbility::compile(&abilities);

        // Count instead of `all()` so every check runs.
        let failed = requirements
            .iter()
            .flat_map(|group| {
                group
                    .actions
                    .iter()
                    .map(move |action| (action.as_str(), group.subject.as_str()))
            })
            .filter(|(action, subject)| compiled.cannot(action, subject))
            .count();

        if failed == 0 {
            return Decision::Allow;
        }

        debug!(identity = %identity.identity_id, failed_checks = failed, "ability check failed");

        if requirements.len() > 1 {
            Decision::Deny(Denial::new(
                DenialKind::BadRequest,
                "one or more required abilities are missing",
            ))
        } else {
            Decision::Deny(Denial::new(
                DenialKind::Forbidden,
                "insufficient ability for this operation",
            ))
        }
    }
}
