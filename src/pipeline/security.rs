//! Declarative permission checks.
//!
//! Every operation declares a static list of [`SecurityRule`]s. The
//! [`SecurityGate`] allows a call only when the caller's credential holds a
//! grant for each rule.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::credential::Credential;

/// Securable name for tasks and task templates.
pub const TASK: &str = "TASK";

// =============================================================================
// Permission
// =============================================================================

/// Kind of access being requested on a securable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
}

impl Permission {
    /// All permission kinds.
    pub const ALL: [Self; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown permission or grant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid permission: {0}")]
pub struct ParsePermissionError(String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "READ" => Ok(Self::Read),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ParsePermissionError(value.to_string())),
        }
    }
}

// =============================================================================
// Rules and Grants
// =============================================================================

/// A required (securable, permission) pair declared by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SecurityRule {
    pub securable: &'static str,
    pub permission: Permission,
}

impl SecurityRule {
    #[must_use]
    pub const fn new(securable: &'static str, permission: Permission) -> Self {
        Self {
            securable,
            permission,
        }
    }
}

impl std::fmt::Display for SecurityRule {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.securable, self.permission)
    }
}

/// A (securable, permission) pair held by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub securable: String,
    pub permission: Permission,
}

impl Grant {
    #[must_use]
    pub fn new(securable: impl Into<String>, permission: Permission) -> Self {
        Self {
            securable: securable.into(),
            permission,
        }
    }

    /// Returns every permission on one securable.
    #[must_use]
    pub fn all_on(securable: &str) -> Vec<Self> {
        Permission::ALL
            .into_iter()
            .map(|permission| Self::new(securable, permission))
            .collect()
    }

    /// Returns `true` if this grant satisfies `rule`.
    #[must_use]
    pub fn satisfies(&self, rule: &SecurityRule) -> bool {
        self.permission == rule.permission && self.securable.eq_ignore_ascii_case(rule.securable)
    }
}

impl FromStr for Grant {
    type Err = ParsePermissionError;

    /// Parses `SECURABLE:PERMISSION`, e.g. `TASK:READ`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (securable, permission) = value
            .split_once(':')
            .ok_or_else(|| ParsePermissionError(value.to_string()))?;
        let securable = securable.trim();
        if securable.is_empty() {
            return Err(ParsePermissionError(value.to_string()));
        }
        Ok(Self::new(securable.to_uppercase(), permission.parse()?))
    }
}

/// Parses a comma-separated grant list. Blank entries are ignored.
///
/// # Errors
///
/// Returns [`ParsePermissionError`] for the first malformed entry.
pub fn parse_grants(list: &str) -> Result<Vec<Grant>, ParsePermissionError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect()
}

// =============================================================================
// Security Gate
// =============================================================================

/// The caller lacks one or more required permissions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing permission(s): {}", format_rules(.missing))]
pub struct AuthorizationError {
    pub missing: Vec<SecurityRule>,
}

fn format_rules(rules: &[SecurityRule]) -> String {
    rules
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Allows or denies an operation based on its declared rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityGate;

impl SecurityGate {
    /// Checks that `credential` satisfies every rule in `rules`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] listing the unmatched rules.
    pub fn check(
        self,
        credential: &Credential,
        rules: &[SecurityRule],
    ) -> Result<(), AuthorizationError> {
        let missing: Vec<SecurityRule> = rules
            .iter()
            .filter(|rule| !credential.holds(rule))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthorizationError { missing })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const READ_TASK: SecurityRule = SecurityRule::new(TASK, Permission::Read);
    const CREATE_TASK: SecurityRule = SecurityRule::new(TASK, Permission::Create);

    fn credential(grants: Vec<Grant>) -> Credential {
        Credential::new(1, 1, grants)
    }

    #[rstest]
    fn test_gate_allows_matching_grant() {
        let caller = credential(vec![Grant::new(TASK, Permission::Read)]);
        assert!(SecurityGate.check(&caller, &[READ_TASK]).is_ok());
    }

    #[rstest]
    fn test_gate_denies_missing_permission() {
        let caller = credential(vec![Grant::new(TASK, Permission::Create)]);
        let error = SecurityGate.check(&caller, &[READ_TASK]).unwrap_err();
        assert_eq!(error.missing, vec![READ_TASK]);
        assert_eq!(error.to_string(), "missing permission(s): TASK:READ");
    }

    #[rstest]
    fn test_gate_requires_every_rule() {
        let caller = credential(vec![Grant::new(TASK, Permission::Read)]);
        let error = SecurityGate
            .check(&caller, &[READ_TASK, CREATE_TASK])
            .unwrap_err();
        assert_eq!(error.missing, vec![CREATE_TASK]);
    }

    #[rstest]
    fn test_gate_allows_empty_rule_list() {
        assert!(SecurityGate.check(&credential(vec![]), &[]).is_ok());
    }

    #[rstest]
    fn test_grant_on_other_securable_does_not_match() {
        let caller = credential(vec![Grant::new("PROJECT", Permission::Read)]);
        assert!(SecurityGate.check(&caller, &[READ_TASK]).is_err());
    }

    #[rstest]
    #[case("TASK:READ", Grant::new("TASK", Permission::Read))]
    #[case("task:create", Grant::new("TASK", Permission::Create))]
    #[case(" TASK : delete ", Grant::new("TASK", Permission::Delete))]
    fn test_parse_grant(#[case] input: &str, #[case] expected: Grant) {
        assert_eq!(input.parse::<Grant>(), Ok(expected));
    }

    #[rstest]
    #[case("TASK")]
    #[case(":READ")]
    #[case("TASK:EXECUTE")]
    fn test_parse_grant_rejects_malformed(#[case] input: &str) {
        assert!(input.parse::<Grant>().is_err());
    }

    #[rstest]
    fn test_parse_grants_list() {
        let grants = parse_grants("TASK:READ, TASK:CREATE,,").unwrap();
        assert_eq!(
            grants,
            vec![
                Grant::new("TASK", Permission::Read),
                Grant::new("TASK", Permission::Create)
            ]
        );
    }

    #[rstest]
    fn test_all_on_covers_every_permission() {
        let grants = Grant::all_on(TASK);
        assert_eq!(grants.len(), 4);
        assert!(grants.iter().all(|grant| grant.securable == TASK));
    }
}
