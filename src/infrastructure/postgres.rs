//! `PostgreSQL` data access.
//!
//! Each routine is a SQL function taking one `jsonb` argument with the named
//! inputs and returning one `jsonb` value:
//!
//! - `null` for no rows
//! - an object for a single row
//! - an array of objects for a list of rows
//! - an array of arrays for several ordered result sets
//!
//! # Function Signatures
//!
//! ```sql
//! CREATE FUNCTION functional.task_create(input jsonb) RETURNS jsonb ...;
//! CREATE FUNCTION functional.task_list(input jsonb) RETURNS jsonb ...;
//! CREATE FUNCTION functional.task_get(input jsonb) RETURNS jsonb ...;
//! CREATE FUNCTION functional.task_template_list(input jsonb) RETURNS jsonb ...;
//! ```
//!
//! Business-rule rejections are raised with `RAISE EXCEPTION ... USING
//! ERRCODE = '51000'`.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use super::data_access::{
    DataAccessError, DataAccessPort, Record, RoutineCall, RoutineOutput,
};

/// SQLSTATE reserved for business-rule rejections.
pub const BUSINESS_RULE_SQLSTATE: &str = "51000";

/// `PostgreSQL` implementation of [`DataAccessPort`].
///
/// # Example
///
/// ```ignore
/// let pool = PgPool::connect("postgres://localhost/tasks").await?;
/// let store = PostgresDataAccess::new(pool);
/// let output = store.execute(call).await?;
/// ```
#[derive(Debug, Clone)]
pub struct PostgresDataAccess {
    pool: PgPool,
}

impl PostgresDataAccess {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_database_error(error: sqlx::Error) -> DataAccessError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some(BUSINESS_RULE_SQLSTATE)
    {
        return DataAccessError::BusinessRule {
            message: database_error.message().to_string(),
        };
    }
    DataAccessError::Database(error.to_string())
}

fn as_record(value: Value) -> Result<Record, DataAccessError> {
    match value {
        Value::Object(record) => Ok(record),
        other => Err(DataAccessError::Malformed(format!(
            "expected a row object, got {other}"
        ))),
    }
}

/// Converts a routine's `jsonb` answer into ordered result sets.
fn result_sets_from_json(value: Option<Value>) -> Result<Vec<Vec<Record>>, DataAccessError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(record)) => Ok(vec![vec![record]]),
        Some(Value::Array(items)) => {
            if items.iter().all(Value::is_array) && !items.is_empty() {
                items
                    .into_iter()
                    .map(|set| match set {
                        Value::Array(rows) => rows.into_iter().map(as_record).collect(),
                        _ => Ok(Vec::new()),
                    })
                    .collect()
            } else {
                Ok(vec![
                    items
                        .into_iter()
                        .map(as_record)
                        .collect::<Result<Vec<_>, _>>()?,
                ])
            }
        }
        Some(other) => Err(DataAccessError::Malformed(format!(
            "unexpected routine result: {other}"
        ))),
    }
}

impl DataAccessPort for PostgresDataAccess {
    fn execute(&self, call: RoutineCall) -> BoxFuture<'_, Result<RoutineOutput, DataAccessError>> {
        async move {
            let RoutineCall {
                routine,
                inputs,
                expected,
            } = call;
            tracing::debug!(routine, "Executing PostgreSQL routine");

            // Routine names are compile-time constants, never caller input.
            let statement = format!("SELECT {routine}($1) AS result");
            let answer: Option<Value> = sqlx::query_scalar(&statement)
                .bind(Json(Value::Object(inputs)))
                .fetch_one(&self.pool)
                .await
                .map_err(map_database_error)?;

            RoutineOutput::from_result_sets(expected, result_sets_from_json(answer)?)
        }
        .boxed()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::data_access::{ExpectedReturn, routines};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn test_null_is_no_result_sets() {
        assert!(result_sets_from_json(Some(Value::Null)).unwrap().is_empty());
        assert!(result_sets_from_json(None).unwrap().is_empty());
    }

    #[rstest]
    fn test_object_is_one_row() {
        let sets = result_sets_from_json(Some(json!({"idTask": 3}))).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0][0]["idTask"], json!(3));
    }

    #[rstest]
    fn test_array_of_objects_is_one_set() {
        let sets = result_sets_from_json(Some(json!([{"a": 1}, {"a": 2}]))).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].len(), 2);
    }

    #[rstest]
    fn test_array_of_arrays_keeps_set_order() {
        let sets = result_sets_from_json(Some(json!([
            [{"title": "Task"}],
            [{"tag": "urgent"}, {"tag": "home"}],
            [],
            []
        ])))
        .unwrap();

        let mut fragments = RoutineOutput::from_result_sets(
            ExpectedReturn::Fragments(routines::TASK_GET_FRAGMENTS),
            sets,
        )
        .unwrap()
        .into_fragments()
        .unwrap();

        assert_eq!(fragments.take("tags").unwrap().len(), 2);
        assert!(fragments.take("subtasks").unwrap().is_empty());
    }

    #[rstest]
    fn test_empty_array_is_one_empty_set() {
        let sets = result_sets_from_json(Some(json!([]))).unwrap();
        assert_eq!(sets, vec![Vec::<Record>::new()]);
    }

    #[rstest]
    fn test_scalar_rows_are_malformed() {
        let error = result_sets_from_json(Some(json!([1, 2]))).unwrap_err();
        assert!(matches!(error, DataAccessError::Malformed(_)));
    }

    // -------------------------------------------------------------------------
    // Integration Tests (require PostgreSQL)
    // -------------------------------------------------------------------------

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_postgres_task_template_list() {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());
        let pool = PgPool::connect(&database_url).await.unwrap();
        let store = PostgresDataAccess::new(pool);

        let output = store
            .execute(
                RoutineCall::new(routines::TASK_TEMPLATE_LIST, ExpectedReturn::Rows)
                    .input("idAccount", 1),
            )
            .await;

        assert!(output.is_ok(), "Template list failed: {output:?}");
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_postgres_task_get_unknown_id_has_empty_task_fragment() {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());
        let pool = PgPool::connect(&database_url).await.unwrap();
        let store = PostgresDataAccess::new(pool);

        let mut fragments = store
            .execute(
                RoutineCall::new(
                    routines::TASK_GET,
                    ExpectedReturn::Fragments(routines::TASK_GET_FRAGMENTS),
                )
                .input("idAccount", 1)
                .input("idTask", i64::MAX),
            )
            .await
            .unwrap()
            .into_fragments()
            .unwrap();

        assert!(fragments.take("task").unwrap().is_empty());
    }
}
