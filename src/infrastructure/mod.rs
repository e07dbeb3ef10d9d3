//! Infrastructure layer.
//!
//! This module contains the data-access port, its in-memory and `PostgreSQL`
//! implementations, and the startup wiring that picks between them.

pub mod data_access;
pub mod factory;
pub mod in_memory;
pub mod postgres;

pub use data_access::{
    DataAccessError, DataAccessPort, ExpectedReturn, NamedFragments, Record, RoutineCall,
    RoutineOutput, bind_fragments, routines,
};
pub use factory::{
    ConfigurationError, CredentialMode, FactoryError, ServiceConfig, StorageMode,
    create_credential_resolver, create_data_access,
};
pub use in_memory::{AttachmentSeed, InMemoryDataAccess};
pub use postgres::{BUSINESS_RULE_SQLSTATE, PostgresDataAccess};
