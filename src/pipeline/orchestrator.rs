//! Request orchestration: merge, resolve, validate, gate.
//!
//! Every endpoint funnels its inbound request through
//! [`RequestOrchestrator::authorize`] before any data access happens. The
//! stages run in a fixed order and the first failure short-circuits:
//!
//! 1. path, query and body are merged into one bag (body wins)
//! 2. the caller's credential is resolved
//! 3. inputs that could not be parsed at all are reported
//! 4. the bag is validated against the operation's [`Shape`]
//! 5. the credential is checked against the operation's [`SecurityRule`]s

use std::sync::Arc;

use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::credential::{Credential, CredentialResolver};
use super::security::{SecurityGate, SecurityRule};
use super::validation::{FieldError, Shape, ValidationContext, ValidationError};
use crate::error::ServiceError;

// =============================================================================
// Inbound Request
// =============================================================================

/// Raw inputs of one request before validation.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    path: Map<String, Value>,
    query: Map<String, Value>,
    body: Map<String, Value>,
    headers: HeaderMap,
    unreadable: Option<ValidationError>,
}

impl InboundRequest {
    #[must_use]
    pub fn new(headers: HeaderMap) -> Self {
        Self {
            headers,
            ..Self::default()
        }
    }

    /// Adds path parameters. Values stay strings until validation coerces them.
    #[must_use]
    pub fn with_path<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.path = string_map(params);
        self
    }

    /// Adds query parameters. Values stay strings until validation coerces them.
    #[must_use]
    pub fn with_query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query = string_map(params);
        self
    }

    /// Parses a JSON body. An empty body is treated as no body.
    ///
    /// A payload that is not a JSON object is recorded on field `body` and
    /// reported once the caller's credential has resolved.
    #[must_use]
    pub fn with_body(mut self, raw: &[u8]) -> Self {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return self;
        }

        match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(body)) => self.body = body,
            Ok(_) => self = self.with_unreadable("body", "Expected a JSON object"),
            Err(error) => self = self.with_unreadable("body", format!("Malformed JSON: {error}")),
        }
        self
    }

    /// Records an input source that could not be read, such as a path
    /// segment that is not valid UTF-8.
    #[must_use]
    pub fn with_unreadable(mut self, field: &str, message: impl Into<String>) -> Self {
        self.unreadable
            .get_or_insert_with(|| ValidationError::new(Vec::new()))
            .errors
            .push(FieldError::new(field, message));
        self
    }

    /// Errors of inputs that could not be read, if any.
    #[must_use]
    pub const fn unreadable(&self) -> Option<&ValidationError> {
        self.unreadable.as_ref()
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Merges path, then query, then body. Later sources overwrite earlier
    /// fields of the same name.
    #[must_use]
    pub fn merged(&self) -> Map<String, Value> {
        let mut bag = self.path.clone();
        bag.extend(self.query.clone());
        bag.extend(self.body.clone());
        bag
    }
}

fn string_map<I, K, V>(params: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    params
        .into_iter()
        .map(|(key, value)| (key.into(), Value::String(value.into())))
        .collect()
}

// =============================================================================
// Operation
// =============================================================================

/// Static declaration of what an endpoint accepts and requires.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    pub shape: Shape,
    pub rules: &'static [SecurityRule],
}

impl Operation {
    #[must_use]
    pub const fn new(name: &'static str, shape: Shape, rules: &'static [SecurityRule]) -> Self {
        Self { name, shape, rules }
    }
}

/// A request that passed every pipeline stage.
#[derive(Debug, Clone)]
pub struct Validated<P> {
    pub credential: Credential,
    pub params: P,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs the pre-business pipeline for every operation.
#[derive(Clone)]
pub struct RequestOrchestrator {
    resolver: Arc<dyn CredentialResolver>,
    gate: SecurityGate,
}

impl RequestOrchestrator {
    #[must_use]
    pub fn new(resolver: Arc<dyn CredentialResolver>) -> Self {
        Self {
            resolver,
            gate: SecurityGate,
        }
    }

    /// Authorizes `request` for `operation` using the current date.
    ///
    /// # Errors
    ///
    /// See [`Self::authorize_with`].
    pub fn authorize<P: DeserializeOwned>(
        &self,
        request: &InboundRequest,
        operation: &Operation,
    ) -> Result<Validated<P>, ServiceError> {
        self.authorize_with(request, operation, &ValidationContext::current())
    }

    /// Authorizes `request` for `operation` with an explicit validation context.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Unauthenticated`] when no credential resolves
    /// - [`ServiceError::Validation`] when an input was unreadable or the bag
    ///   violates the shape
    /// - [`ServiceError::Forbidden`] when a rule is not granted
    /// - [`ServiceError::Generic`] when validated params do not fit `P`
    pub fn authorize_with<P: DeserializeOwned>(
        &self,
        request: &InboundRequest,
        operation: &Operation,
        context: &ValidationContext,
    ) -> Result<Validated<P>, ServiceError> {
        let bag = request.merged();

        let credential = self.resolver.resolve(request.headers()).map_err(|error| {
            tracing::info!(operation = operation.name, %error, "Credential resolution failed");
            error
        })?;

        if let Some(error) = request.unreadable() {
            tracing::debug!(operation = operation.name, %error, "Unreadable request input");
            return Err(error.clone().into());
        }

        let normalized = operation.shape.validate(&bag, context).map_err(|error| {
            tracing::debug!(
                operation = operation.name,
                fields = error.errors.len(),
                "Validation failed"
            );
            error
        })?;

        self.gate
            .check(&credential, operation.rules)
            .map_err(|error| {
                tracing::info!(
                    operation = operation.name,
                    account = credential.id_account,
                    user = credential.id_user,
                    %error,
                    "Access denied"
                );
                error
            })?;

        let params = serde_json::from_value(Value::Object(normalized)).map_err(|error| {
            ServiceError::generic(format!(
                "validated params do not fit {}: {error}",
                operation.name
            ))
        })?;

        Ok(Validated { credential, params })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::credential::{
        ACCOUNT_HEADER, HeaderCredentialResolver, StaticCredentialResolver, USER_HEADER,
    };
    use crate::pipeline::security::{Grant, Permission, TASK};
    use crate::pipeline::validation::{FieldKind, FieldSpec};
    use axum::http::HeaderValue;
    use chrono::NaiveDate;
    use rstest::rstest;
    use serde::Deserialize;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::required("name", FieldKind::Text { min: 1, max: 10 }),
        FieldSpec::optional(
            "count",
            FieldKind::Integer {
                min: 0,
                max: 5,
                coerce: true,
            },
        ),
    ];
    const READ_RULES: &[SecurityRule] = &[SecurityRule::new(TASK, Permission::Read)];
    const OPERATION: Operation = Operation::new("widget_lookup", Shape::new(FIELDS), READ_RULES);

    #[derive(Debug, Deserialize)]
    struct Params {
        name: String,
        count: Option<i64>,
    }

    fn orchestrator(grants: Vec<Grant>) -> RequestOrchestrator {
        RequestOrchestrator::new(Arc::new(StaticCredentialResolver::new(Credential::new(
            1, 2, grants,
        ))))
    }

    fn context() -> ValidationContext {
        ValidationContext::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    }

    #[rstest]
    fn test_merge_precedence_body_wins() {
        let request = InboundRequest::default()
            .with_path([("name", "path"), ("a", "path")])
            .with_query([("name", "query"), ("b", "query")])
            .with_body(br#"{"name": "body"}"#);

        let bag = request.merged();

        assert_eq!(bag.get("name"), Some(&Value::from("body")));
        assert_eq!(bag.get("a"), Some(&Value::from("path")));
        assert_eq!(bag.get("b"), Some(&Value::from("query")));
    }

    #[rstest]
    fn test_query_overrides_path() {
        let request = InboundRequest::default()
            .with_path([("name", "path")])
            .with_query([("name", "query")]);
        assert_eq!(request.merged().get("name"), Some(&Value::from("query")));
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"  \n".as_slice())]
    fn test_empty_body_is_no_body(#[case] raw: &[u8]) {
        let request = InboundRequest::default().with_body(raw);
        assert!(request.merged().is_empty());
    }

    #[rstest]
    #[case(b"[1, 2]".as_slice())]
    #[case(b"{not json".as_slice())]
    fn test_non_object_body_is_rejected(#[case] raw: &[u8]) {
        let request = InboundRequest::default().with_body(raw);
        assert!(request.unreadable().unwrap().has_field("body"));
        assert!(request.merged().is_empty());
    }

    #[rstest]
    fn test_unreadable_inputs_accumulate() {
        let request = InboundRequest::default()
            .with_unreadable("path", "Invalid UTF-8 in `id`")
            .with_body(b"{bad");

        let unreadable = request.unreadable().unwrap();
        assert_eq!(unreadable.errors.len(), 2);
        assert!(unreadable.has_field("path"));
        assert!(unreadable.has_field("body"));
    }

    #[rstest]
    fn test_unreadable_body_is_reported_after_credential() {
        let orchestrator = RequestOrchestrator::new(Arc::new(HeaderCredentialResolver));
        let request = InboundRequest::default().with_body(b"{bad");

        let error = orchestrator
            .authorize_with::<Params>(&request, &OPERATION, &context())
            .unwrap_err();

        assert!(matches!(error, ServiceError::Unauthenticated(_)));
    }

    #[rstest]
    fn test_unreadable_body_is_validation_error_for_known_caller() {
        let request = InboundRequest::default()
            .with_query([("name", "abc")])
            .with_body(b"[1, 2]");

        let error = orchestrator(Grant::all_on(TASK))
            .authorize_with::<Params>(&request, &OPERATION, &context())
            .unwrap_err();

        assert!(matches!(error, ServiceError::Validation(ref failure) if failure.has_field("body")));
    }

    #[rstest]
    fn test_authorize_returns_typed_params() {
        let request = InboundRequest::default().with_query([("name", "abc"), ("count", "3")]);

        let validated: Validated<Params> = orchestrator(Grant::all_on(TASK))
            .authorize_with(&request, &OPERATION, &context())
            .unwrap();

        assert_eq!(validated.params.name, "abc");
        assert_eq!(validated.params.count, Some(3));
        assert_eq!(validated.credential.id_user, 2);
    }

    #[rstest]
    fn test_validation_runs_before_gate() {
        let request = InboundRequest::default();

        let error = orchestrator(vec![])
            .authorize_with::<Params>(&request, &OPERATION, &context())
            .unwrap_err();

        assert!(matches!(error, ServiceError::Validation(_)));
    }

    #[rstest]
    fn test_missing_grant_is_forbidden() {
        let request = InboundRequest::default().with_query([("name", "abc")]);

        let error = orchestrator(vec![Grant::new(TASK, Permission::Create)])
            .authorize_with::<Params>(&request, &OPERATION, &context())
            .unwrap_err();

        assert!(matches!(error, ServiceError::Forbidden(_)));
    }

    #[rstest]
    fn test_unresolved_credential_is_unauthenticated() {
        let orchestrator = RequestOrchestrator::new(Arc::new(HeaderCredentialResolver));
        let request = InboundRequest::default().with_query([("name", "abc")]);

        let error = orchestrator
            .authorize_with::<Params>(&request, &OPERATION, &context())
            .unwrap_err();

        assert!(matches!(error, ServiceError::Unauthenticated(_)));
    }

    #[rstest]
    fn test_header_credential_flows_into_result() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCOUNT_HEADER, HeaderValue::from_static("9"));
        headers.insert(USER_HEADER, HeaderValue::from_static("8"));
        headers.insert("x-permissions", HeaderValue::from_static("TASK:READ"));
        let orchestrator = RequestOrchestrator::new(Arc::new(HeaderCredentialResolver));
        let request = InboundRequest::new(headers).with_query([("name", "abc")]);

        let validated: Validated<Params> = orchestrator
            .authorize_with(&request, &OPERATION, &context())
            .unwrap();

        assert_eq!(validated.credential.id_account, 9);
        assert_eq!(validated.credential.id_user, 8);
    }
}
