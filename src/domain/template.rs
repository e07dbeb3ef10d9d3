//! Task templates.
//!
//! A template's payload is stored as serialized JSON text and decoded into
//! [`TemplatePayload`] every time templates are read.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::task::Priority;

/// Pre-filled values a client can copy into a new task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Failure to decode a stored template payload.
#[derive(Debug, Error)]
#[error("invalid template payload: {0}")]
pub struct TemplateDecodeError(#[from] serde_json::Error);

impl TemplatePayload {
    /// Serializes the payload into its stored text form.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses the stored text form.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateDecodeError`] if the text is not a valid payload.
    pub fn decode(text: &str) -> Result<Self, TemplateDecodeError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A named task template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id_template: i64,
    pub name: String,
    pub template_data: TemplatePayload,
}
