//! Caller credentials and their resolution.
//!
//! Authentication happens upstream of this service. A [`CredentialResolver`]
//! turns whatever the upstream hands over (headers, or a fixed development
//! identity) into a [`Credential`] before validation runs.

use axum::http::HeaderMap;
use serde::Serialize;
use thiserror::Error;

use super::security::{Grant, SecurityRule, parse_grants};

/// Header carrying the caller's account identifier.
pub const ACCOUNT_HEADER: &str = "x-account-id";
/// Header carrying the caller's user identifier.
pub const USER_HEADER: &str = "x-user-id";
/// Header carrying the caller's grants as `SECURABLE:PERMISSION,...`.
pub const PERMISSIONS_HEADER: &str = "x-permissions";

// =============================================================================
// Credential
// =============================================================================

/// Resolved caller identity plus the grants it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id_account: i64,
    pub id_user: i64,
    #[serde(skip)]
    grants: Vec<Grant>,
}

impl Credential {
    #[must_use]
    pub const fn new(id_account: i64, id_user: i64, grants: Vec<Grant>) -> Self {
        Self {
            id_account,
            id_user,
            grants,
        }
    }

    #[must_use]
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Returns `true` if any grant satisfies `rule`.
    #[must_use]
    pub fn holds(&self, rule: &SecurityRule) -> bool {
        self.grants.iter().any(|grant| grant.satisfies(rule))
    }
}

/// The caller's identity could not be established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid header {header}: {reason}")]
    InvalidHeader {
        header: &'static str,
        reason: String,
    },
}

// =============================================================================
// Resolvers
// =============================================================================

/// Produces the credential for an inbound request.
pub trait CredentialResolver: Send + Sync {
    /// Resolves the caller of a request from its headers.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when no credential can be established.
    fn resolve(&self, headers: &HeaderMap) -> Result<Credential, CredentialError>;
}

/// Reads the identity forwarded by an authenticating gateway.
///
/// Expects `x-account-id` and `x-user-id` as positive integers and an
/// optional `x-permissions` list. A missing permissions header means no
/// grants.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderCredentialResolver;

impl HeaderCredentialResolver {
    fn header<'a>(
        headers: &'a HeaderMap,
        name: &'static str,
    ) -> Result<Option<&'a str>, CredentialError> {
        headers
            .get(name)
            .map(|value| {
                value.to_str().map_err(|_| CredentialError::InvalidHeader {
                    header: name,
                    reason: "not visible ASCII".to_string(),
                })
            })
            .transpose()
    }

    fn identifier(headers: &HeaderMap, name: &'static str) -> Result<i64, CredentialError> {
        let raw = Self::header(headers, name)?.ok_or(CredentialError::MissingHeader(name))?;
        match raw.trim().parse::<i64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(CredentialError::InvalidHeader {
                header: name,
                reason: format!("expected a positive integer, got '{raw}'"),
            }),
        }
    }
}

impl CredentialResolver for HeaderCredentialResolver {
    fn resolve(&self, headers: &HeaderMap) -> Result<Credential, CredentialError> {
        let id_account = Self::identifier(headers, ACCOUNT_HEADER)?;
        let id_user = Self::identifier(headers, USER_HEADER)?;
        let grants = Self::header(headers, PERMISSIONS_HEADER)?
            .map(parse_grants)
            .transpose()
            .map_err(|error| CredentialError::InvalidHeader {
                header: PERMISSIONS_HEADER,
                reason: error.to_string(),
            })?
            .unwrap_or_default();

        Ok(Credential::new(id_account, id_user, grants))
    }
}

/// Resolves every request to one configured credential.
///
/// Intended for local development where no gateway is present.
#[derive(Debug, Clone)]
pub struct StaticCredentialResolver {
    credential: Credential,
}

impl StaticCredentialResolver {
    #[must_use]
    pub const fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(&self, _headers: &HeaderMap) -> Result<Credential, CredentialError> {
        Ok(self.credential.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
