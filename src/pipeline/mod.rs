//! Pre-business request pipeline.
//!
//! Validation, credential resolution and permission gating. Nothing in this
//! module touches the data layer.

pub mod credential;
pub mod orchestrator;
pub mod security;
pub mod validation;

pub use credential::{
    Credential, CredentialError, CredentialResolver, HeaderCredentialResolver,
    StaticCredentialResolver,
};
pub use orchestrator::{InboundRequest, Operation, RequestOrchestrator, Validated};
pub use security::{
    AuthorizationError, Grant, ParsePermissionError, Permission, SecurityGate, SecurityRule, TASK,
    parse_grants,
};
pub use validation::{
    FieldDefault, FieldError, FieldKind, FieldSpec, Shape, ValidationContext, ValidationError,
};
