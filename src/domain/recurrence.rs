//! Recurrence configuration for repeating tasks.
//!
//! On the wire the configuration is a JSON object; in storage it is the same
//! object serialized to text. [`RecurrenceConfig::encode`] and
//! [`RecurrenceConfig::decode`] are the only conversions between the two.

use std::num::NonZeroU32;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How often a task repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceKind {
    /// Wire names accepted by the request shape, in declaration order.
    pub const NAMES: &'static [&'static str] = &["daily", "weekly", "monthly", "yearly"];
}

/// A recurrence rule: every `interval` units of `kind`, optionally until `end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceConfig {
    #[serde(rename = "type")]
    pub kind: RecurrenceKind,
    pub interval: NonZeroU32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Failure to turn stored recurrence text back into a [`RecurrenceConfig`].
#[derive(Debug, Error)]
#[error("invalid recurrence configuration: {0}")]
pub struct RecurrenceDecodeError(#[from] serde_json::Error);

impl RecurrenceConfig {
    /// Creates a configuration without an end date.
    #[must_use]
    pub const fn new(kind: RecurrenceKind, interval: NonZeroU32) -> Self {
        Self {
            kind,
            interval,
            end_date: None,
        }
    }

    /// Returns a copy ending on the given date.
    #[must_use]
    pub const fn with_end_date(self, end_date: NaiveDate) -> Self {
        Self {
            end_date: Some(end_date),
            ..self
        }
    }

    /// Serializes the configuration into its stored text form.
    #[must_use]
    pub fn encode(&self) -> String {
        // Plain struct of enum, integer and date fields; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses the stored text form.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceDecodeError`] if the text is not a valid configuration.
    pub fn decode(text: &str) -> Result<Self, RecurrenceDecodeError> {
        Ok(serde_json::from_str(text)?)
    }
}

// =============================================================================
// Tests
// =============================================================================
