//! Data-access port.
//!
//! The service never issues queries itself. It invokes named routines with
//! named inputs through [`DataAccessPort`] and declares, per call, what shape
//! of output it expects back.
//!
//! Stores produce result sets as an ordered, unnamed sequence. Adapters bind
//! them to names with [`bind_fragments`] before the output leaves the port, so
//! callers only ever look fragments up by name.

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use thiserror::Error;

/// One row as returned by a routine, keyed by column name.
pub type Record = Map<String, Value>;

// =============================================================================
// Routine Names
// =============================================================================

/// Routine identifiers and fragment layouts.
pub mod routines {
    pub const TASK_CREATE: &str = "functional.task_create";
    pub const TASK_LIST: &str = "functional.task_list";
    pub const TASK_GET: &str = "functional.task_get";
    pub const TASK_TEMPLATE_LIST: &str = "functional.task_template_list";

    /// Result sets of `functional.task_get`, in the order the routine emits them.
    pub const TASK_GET_FRAGMENTS: &[&str] = &["task", "tags", "attachments", "subtasks"];
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur while executing a routine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataAccessError {
    /// The routine rejected the input for a domain reason.
    #[error("Business rule violated: {message}")]
    BusinessRule { message: String },

    /// Connection or execution failure.
    #[error("Database error: {0}")]
    Database(String),

    /// The routine answered with something other than what was declared.
    #[error("Malformed result: {0}")]
    Malformed(String),
}

// =============================================================================
// Calls and Outputs
// =============================================================================

/// Output shape a caller declares for a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedReturn {
    /// The routine produces no rows worth reading.
    None,
    /// Zero or one row from the first result set.
    Single,
    /// Every row of the first result set.
    Rows,
    /// Several result sets bound positionally to these names.
    Fragments(&'static [&'static str]),
}

/// A named routine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineCall {
    pub routine: &'static str,
    pub inputs: Record,
    pub expected: ExpectedReturn,
}

impl RoutineCall {
    #[must_use]
    pub fn new(routine: &'static str, expected: ExpectedReturn) -> Self {
        Self {
            routine,
            inputs: Record::new(),
            expected,
        }
    }

    /// Adds a named input.
    #[must_use]
    pub fn input(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.to_string(), value.into());
        self
    }
}

/// Result fragments keyed by the names the call declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedFragments {
    fragments: BTreeMap<&'static str, Vec<Record>>,
}

impl NamedFragments {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[Record]> {
        self.fragments.get(name).map(Vec::as_slice)
    }

    /// Removes and returns a fragment.
    pub fn take(&mut self, name: &str) -> Option<Vec<Record>> {
        self.fragments.remove(name)
    }

    pub fn insert(&mut self, name: &'static str, rows: Vec<Record>) {
        self.fragments.insert(name, rows);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Binds ordered result sets to `names` by position.
///
/// # Errors
///
/// Returns [`DataAccessError::Malformed`] when fewer result sets than names
/// were produced. Surplus result sets are logged and dropped.
pub fn bind_fragments(
    names: &'static [&'static str],
    ordered: Vec<Vec<Record>>,
) -> Result<NamedFragments, DataAccessError> {
    if ordered.len() < names.len() {
        return Err(DataAccessError::Malformed(format!(
            "expected {} result sets ({}), got {}",
            names.len(),
            names.join(", "),
            ordered.len()
        )));
    }
    if ordered.len() > names.len() {
        tracing::warn!(
            expected = names.len(),
            received = ordered.len(),
            "Ignoring surplus result sets"
        );
    }

    let mut fragments = NamedFragments::default();
    for (name, rows) in names.iter().copied().zip(ordered) {
        fragments.insert(name, rows);
    }
    Ok(fragments)
}

/// What a routine returned, in the shape the call declared.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutineOutput {
    None,
    Single(Option<Record>),
    Rows(Vec<Record>),
    Fragments(NamedFragments),
}

impl RoutineOutput {
    /// Shapes raw ordered result sets according to `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`DataAccessError::Malformed`] when fragments cannot be bound.
    pub fn from_result_sets(
        expected: ExpectedReturn,
        result_sets: Vec<Vec<Record>>,
    ) -> Result<Self, DataAccessError> {
        match expected {
            ExpectedReturn::None => Ok(Self::None),
            ExpectedReturn::Single => Ok(Self::Single(
                result_sets
                    .into_iter()
                    .next()
                    .and_then(|rows| rows.into_iter().next()),
            )),
            ExpectedReturn::Rows => Ok(Self::Rows(
                result_sets.into_iter().next().unwrap_or_default(),
            )),
            ExpectedReturn::Fragments(names) => {
                bind_fragments(names, result_sets).map(Self::Fragments)
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`DataAccessError::Malformed`] for any other variant.
    pub fn into_single(self) -> Result<Option<Record>, DataAccessError> {
        match self {
            Self::Single(record) => Ok(record),
            other => Err(unexpected("single record", &other)),
        }
    }

    /// # Errors
    ///
    /// Returns [`DataAccessError::Malformed`] for any other variant.
    pub fn into_rows(self) -> Result<Vec<Record>, DataAccessError> {
        match self {
            Self::Rows(rows) => Ok(rows),
            other => Err(unexpected("rows", &other)),
        }
    }

    /// # Errors
    ///
    /// Returns [`DataAccessError::Malformed`] for any other variant.
    pub fn into_fragments(self) -> Result<NamedFragments, DataAccessError> {
        match self {
            Self::Fragments(fragments) => Ok(fragments),
            other => Err(unexpected("fragments", &other)),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Single(_) => "single record",
            Self::Rows(_) => "rows",
            Self::Fragments(_) => "fragments",
        }
    }
}

fn unexpected(wanted: &str, got: &RoutineOutput) -> DataAccessError {
    DataAccessError::Malformed(format!("expected {wanted}, got {}", got.kind()))
}

// =============================================================================
// Port
// =============================================================================

/// Executes named routines against a store.
///
/// Implementations must be shareable across request handlers.
pub trait DataAccessPort: Send + Sync {
    /// Runs `call` and returns its output in the declared shape.
    fn execute(&self, call: RoutineCall) -> BoxFuture<'_, Result<RoutineOutput, DataAccessError>>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[rstest]
    fn test_bind_fragments_maps_by_position() {
        let ordered = vec![
            vec![record(json!({"marker": "first"}))],
            vec![record(json!({"marker": "second"})), record(json!({"marker": "second"}))],
            vec![],
            vec![record(json!({"marker": "fourth"}))],
        ];

        let fragments = bind_fragments(routines::TASK_GET_FRAGMENTS, ordered).unwrap();

        assert_eq!(fragments.get("task").unwrap()[0]["marker"], json!("first"));
        assert_eq!(fragments.get("tags").unwrap().len(), 2);
        assert!(fragments.get("attachments").unwrap().is_empty());
        assert_eq!(
            fragments.get("subtasks").unwrap()[0]["marker"],
            json!("fourth")
        );
    }

    #[rstest]
    fn test_bind_fragments_rejects_missing_sets() {
        let error = bind_fragments(routines::TASK_GET_FRAGMENTS, vec![vec![], vec![]]).unwrap_err();
        assert!(matches!(error, DataAccessError::Malformed(_)));
    }

    #[rstest]
    fn test_bind_fragments_ignores_surplus_sets() {
        let fragments = bind_fragments(&["only"], vec![vec![], vec![record(json!({}))]]).unwrap();
        assert_eq!(fragments.len(), 1);
    }

    #[rstest]
    fn test_single_takes_first_row_of_first_set() {
        let output = RoutineOutput::from_result_sets(
            ExpectedReturn::Single,
            vec![vec![record(json!({"idTask": 4})), record(json!({"idTask": 5}))]],
        )
        .unwrap();
        assert_eq!(output.into_single().unwrap().unwrap()["idTask"], json!(4));
    }

    #[rstest]
    fn test_single_of_nothing_is_none() {
        let output = RoutineOutput::from_result_sets(ExpectedReturn::Single, vec![]).unwrap();
        assert_eq!(output.into_single().unwrap(), None);
    }

    #[rstest]
    fn test_wrong_unwrap_is_malformed() {
        let output = RoutineOutput::Rows(vec![]);
        assert!(matches!(
            output.into_fragments(),
            Err(DataAccessError::Malformed(_))
        ));
    }

    #[rstest]
    fn test_routine_call_builder_collects_inputs() {
        let call = RoutineCall::new(routines::TASK_GET, ExpectedReturn::Single)
            .input("idAccount", 1)
            .input("idTask", 9);
        assert_eq!(call.inputs.len(), 2);
        assert_eq!(call.inputs["idTask"], json!(9));
    }
}
