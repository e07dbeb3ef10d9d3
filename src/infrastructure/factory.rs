//! Service wiring from environment configuration.
//!
//! This module selects the data-access backend and the credential resolver at
//! startup.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `in_memory` (default) | `postgres`
//! - `DATABASE_URL`: `PostgreSQL` connection URL (required when `STORAGE_MODE=postgres`)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
//! - `CREDENTIAL_MODE`: `header` (default) | `static`
//! - `STATIC_ACCOUNT_ID`, `STATIC_USER_ID`: identity used in static mode (default 1)
//! - `STATIC_PERMISSIONS`: grants used in static mode (default every `TASK` permission)
//! - `HOST` (default `0.0.0.0`), `PORT` (default `3000`)

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use super::{DataAccessPort, InMemoryDataAccess, PostgresDataAccess};
use crate::pipeline::{
    Credential, CredentialResolver, Grant, HeaderCredentialResolver, StaticCredentialResolver,
    TASK, parse_grants,
};

// =============================================================================
// Configuration Types
// =============================================================================

/// Backend that executes data-access routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// In-process tables. Suitable for testing and development.
    #[default]
    InMemory,
    /// `PostgreSQL` functions for production use.
    Postgres,
}

impl FromStr for StorageMode {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(ConfigurationError::InvalidStorageMode(value.to_string())),
        }
    }
}

/// Where caller credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialMode {
    /// Identity headers forwarded by an authenticating gateway.
    #[default]
    Header,
    /// One configured identity for every request.
    Static,
}

impl FromStr for CredentialMode {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "header" | "headers" => Ok(Self::Header),
            "static" => Ok(Self::Static),
            _ => Err(ConfigurationError::InvalidCredentialMode(value.to_string())),
        }
    }
}

/// Errors that can occur while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid storage mode: '{0}'. Expected 'in_memory' or 'postgres'")]
    InvalidStorageMode(String),

    #[error("Invalid credential mode: '{0}'. Expected 'header' or 'static'")]
    InvalidCredentialMode(String),

    #[error("DATABASE_URL environment variable is required when STORAGE_MODE=postgres")]
    MissingDatabaseUrl,

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors that can occur while building service components.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Database connection error: {0}")]
    DatabaseConnection(String),
}

/// Runtime configuration of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub storage_mode: StorageMode,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub credential_mode: CredentialMode,
    pub static_account_id: i64,
    pub static_user_id: i64,
    pub static_grants: Vec<Grant>,
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            database_url: None,
            database_max_connections: 10,
            credential_mode: CredentialMode::default(),
            static_account_id: 1,
            static_user_id: 1,
            static_grants: Grant::all_on(TASK),
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigurationError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidValue {
            name,
            value: raw.to_string(),
        })
}

impl ServiceConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if a variable holds an invalid value or a
    /// required one is missing.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if a variable holds an invalid value or a
    /// required one is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            storage_mode: read("STORAGE_MODE")
                .map(|value| value.parse())
                .transpose()?
                .unwrap_or_default(),
            database_url: read("DATABASE_URL"),
            database_max_connections: read("DATABASE_MAX_CONNECTIONS")
                .map(|value| parse_value("DATABASE_MAX_CONNECTIONS", &value))
                .transpose()?
                .unwrap_or(defaults.database_max_connections),
            credential_mode: read("CREDENTIAL_MODE")
                .map(|value| value.parse())
                .transpose()?
                .unwrap_or_default(),
            static_account_id: read("STATIC_ACCOUNT_ID")
                .map(|value| parse_value("STATIC_ACCOUNT_ID", &value))
                .transpose()?
                .unwrap_or(defaults.static_account_id),
            static_user_id: read("STATIC_USER_ID")
                .map(|value| parse_value("STATIC_USER_ID", &value))
                .transpose()?
                .unwrap_or(defaults.static_user_id),
            static_grants: read("STATIC_PERMISSIONS")
                .map(|value| {
                    parse_grants(&value).map_err(|_| ConfigurationError::InvalidValue {
                        name: "STATIC_PERMISSIONS",
                        value,
                    })
                })
                .transpose()?
                .unwrap_or(defaults.static_grants),
            host: read("HOST").unwrap_or(defaults.host),
            port: read("PORT")
                .map(|value| parse_value("PORT", &value))
                .transpose()?
                .unwrap_or(defaults.port),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the selected modes lack required values.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.storage_mode == StorageMode::Postgres && self.database_url.is_none() {
            return Err(ConfigurationError::MissingDatabaseUrl);
        }
        if self.database_max_connections == 0 {
            return Err(ConfigurationError::InvalidValue {
                name: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }
        if self.credential_mode == CredentialMode::Static
            && (self.static_account_id <= 0 || self.static_user_id <= 0)
        {
            return Err(ConfigurationError::InvalidValue {
                name: "STATIC_ACCOUNT_ID/STATIC_USER_ID",
                value: format!("{}/{}", self.static_account_id, self.static_user_id),
            });
        }
        Ok(())
    }

    /// Returns the socket address to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Component Construction
// =============================================================================

/// Creates the data-access backend selected by `config`.
///
/// # Errors
///
/// Returns `FactoryError` if the database pool cannot be created.
pub async fn create_data_access(
    config: &ServiceConfig,
) -> Result<Arc<dyn DataAccessPort>, FactoryError> {
    match config.storage_mode {
        StorageMode::InMemory => {
            tracing::info!("Using in-memory data access");
            Ok(Arc::new(InMemoryDataAccess::with_default_templates()))
        }
        StorageMode::Postgres => {
            let database_url = config
                .database_url
                .as_ref()
                .ok_or(ConfigurationError::MissingDatabaseUrl)?;
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await
                .map_err(|error| FactoryError::DatabaseConnection(error.to_string()))?;
            tracing::info!(
                max_connections = config.database_max_connections,
                "Using PostgreSQL data access"
            );
            Ok(Arc::new(PostgresDataAccess::new(pool)))
        }
    }
}

/// Creates the credential resolver selected by `config`.
#[must_use]
pub fn create_credential_resolver(config: &ServiceConfig) -> Arc<dyn CredentialResolver> {
    match config.credential_mode {
        CredentialMode::Header => Arc::new(HeaderCredentialResolver),
        CredentialMode::Static => {
            tracing::warn!(
                account = config.static_account_id,
                user = config.static_user_id,
                "Every request runs under one static credential"
            );
            Arc::new(StaticCredentialResolver::new(Credential::new(
                config.static_account_id,
                config.static_user_id,
                config.static_grants.clone(),
            )))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
