//! Access Policy
//!
//! Every mutating controller call names an [`Operation`]; the policy says
//! which [`Role`] the caller must hold. The table is explicit so it can be
//! inspected and changed at runtime.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::AccountId;

/// A privilege a caller may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Operator: creates, resumes, fails matches and configures randomness
    Admin,
    /// Randomness provider callback
    Oracle,
}

/// Mutating controller operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// `create_match`
    CreateMatch,
    /// `supply_randomness`
    SupplyRandomness,
    /// `trigger_next_segment`
    TriggerNextSegment,
    /// `force_fail`
    ForceFail,
    /// `configure_randomness`
    ConfigureRandomness,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 5] = [
        Operation::CreateMatch,
        Operation::SupplyRandomness,
        Operation::TriggerNextSegment,
        Operation::ForceFail,
        Operation::ConfigureRandomness,
    ];

    /// Role required under the default policy.
    pub fn default_role(self) -> Role {
        match self {
            Operation::SupplyRandomness => Role::Oracle,
            _ => Role::Admin,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CreateMatch => "create_match",
            Operation::SupplyRandomness => "supply_randomness",
            Operation::TriggerNextSegment => "trigger_next_segment",
            Operation::ForceFail => "force_fail",
            Operation::ConfigureRandomness => "configure_randomness",
        };
        f.write_str(name)
    }
}

/// Caller lacks the role an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{caller} may not {operation}: requires {required:?}")]
pub struct AccessDenied {
    /// Who asked
    pub caller: AccountId,
    /// What they asked for
    pub operation: Operation,
    /// Role they were missing
    pub required: Role,
}

/// Operation → role table plus role grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    requirements: BTreeMap<Operation, Role>,
    grants: BTreeMap<AccountId, BTreeSet<Role>>,
}

impl AccessPolicy {
    /// Default table with one admin and one oracle account.
    pub fn new(admin: AccountId, oracle: AccountId) -> Self {
        let mut policy = Self::empty();
        policy.grant(admin, Role::Admin);
        policy.grant(oracle, Role::Oracle);
        policy
    }

    /// Default table with no grants.
    pub fn empty() -> Self {
        Self {
            requirements: Operation::ALL.iter().map(|&op| (op, op.default_role())).collect(),
            grants: BTreeMap::new(),
        }
    }

    /// Give `account` a role.
    pub fn grant(&mut self, account: AccountId, role: Role) {
        tracing::info!(account = %account.short(), ?role, "role granted");
        self.grants.entry(account).or_default().insert(role);
    }

    /// Take a role away. Returns whether it was held.
    pub fn revoke(&mut self, account: &AccountId, role: Role) -> bool {
        let Some(roles) = self.grants.get_mut(account) else {
            return false;
        };
        let removed = roles.remove(&role);
        if roles.is_empty() {
            self.grants.remove(account);
        }
        if removed {
            tracing::info!(account = %account.short(), ?role, "role revoked");
        }
        removed
    }

    /// Does `account` hold `role`?
    pub fn has_role(&self, account: &AccountId, role: Role) -> bool {
        self.grants.get(account).is_some_and(|roles| roles.contains(&role))
    }

    /// Role an operation currently requires.
    pub fn requirement(&self, operation: Operation) -> Role {
        self.requirements
            .get(&operation)
            .copied()
            .unwrap_or_else(|| operation.default_role())
    }

    /// Change the role an operation requires.
    pub fn set_requirement(&mut self, operation: Operation, role: Role) {
        self.requirements.insert(operation, role);
    }

    /// Check a caller may perform an operation.
    pub fn authorize(&self, caller: &AccountId, operation: Operation) -> Result<(), AccessDenied> {
        let required = self.requirement(operation);
        if self.has_role(caller, required) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller.short(), %operation, ?required, "access denied");
            Err(AccessDenied {
                caller: *caller,
                operation,
                required,
            })
        }
    }
}
