//! SQL execution collaborator

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tripwire_core::tree::ColumnType;
use tripwire_core::Value;

/// State code reported for successful invocations.
pub const STATE_OK: &str = "00000";

/// Fallback state code when the driver does not report a SQLSTATE.
pub const STATE_GENERAL: &str = "HY000";

/// How one SQL invocation terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlStatus {
    /// Statement(s) completed
    Ok,
    /// Driver reported an error
    Err(String),
    /// No connection could be obtained
    NoStart(String),
}

/// Outcome of one SQL invocation
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub status: SqlStatus,
    /// Five-character state code, [`STATE_OK`] on success
    pub state: String,
    pub rows_affected: u64,
    /// Elapsed time reported by the driver
    pub duration: Duration,
    /// Positional columns of a row query; `None` when no row matched or the
    /// invocation was not a row query
    pub columns: Option<Vec<Value>>,
}

impl QueryOutcome {
    pub fn ok(rows_affected: u64, duration: Duration, columns: Option<Vec<Value>>) -> Self {
        QueryOutcome {
            status: SqlStatus::Ok,
            state: STATE_OK.to_string(),
            rows_affected,
            duration,
            columns,
        }
    }

    pub fn err(state: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        QueryOutcome {
            status: SqlStatus::Err(message.into()),
            state: state.into(),
            rows_affected: 0,
            duration,
            columns: None,
        }
    }

    pub fn no_start(reason: impl Into<String>) -> Self {
        QueryOutcome {
            status: SqlStatus::NoStart(reason.into()),
            state: STATE_GENERAL.to_string(),
            rows_affected: 0,
            duration: Duration::ZERO,
            columns: None,
        }
    }
}

/// Runs SQL statements with positional string arguments
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run one statement and fetch at most one row decoded per `schema`.
    async fn query_row(
        &self,
        statement: &str,
        args: &[String],
        schema: &[ColumnType],
    ) -> QueryOutcome;

    /// Run statements for effect, optionally inside one transaction.
    async fn execute(&self, statements: &[String], args: &[String], transactional: bool)
        -> QueryOutcome;
}

/// Bounded wrapper around a SQL executor
#[derive(Clone)]
pub struct SqlPool {
    inner: Arc<dyn SqlExecutor>,
    slots: Arc<Semaphore>,
}

impl SqlPool {
    pub fn new(inner: Arc<dyn SqlExecutor>, slots: usize) -> Self {
        SqlPool {
            inner,
            slots: Arc::new(Semaphore::new(slots)),
        }
    }

    pub async fn query_row(
        &self,
        statement: &str,
        args: &[String],
        schema: &[ColumnType],
    ) -> QueryOutcome {
        let permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => return QueryOutcome::no_start("executor pool closed"),
        };
        let outcome = self.inner.query_row(statement, args, schema).await;
        drop(permit);
        outcome
    }

    pub async fn execute(
        &self,
        statements: &[String],
        args: &[String],
        transactional: bool,
    ) -> QueryOutcome {
        let permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => return QueryOutcome::no_start("executor pool closed"),
        };
        let outcome = self.inner.execute(statements, args, transactional).await;
        drop(permit);
        outcome
    }
}

/// Test executor replaying scripted outcomes keyed by the first statement
#[derive(Default)]
pub struct ScriptedSqlExecutor {
    outcomes: Mutex<HashMap<String, VecDeque<QueryOutcome>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    execute_modes: Mutex<Vec<bool>>,
}

impl ScriptedSqlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, statement: &str, outcome: QueryOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .entry(statement.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Transactional flag of every `execute` call, in call order.
    pub fn execute_modes(&self) -> Vec<bool> {
        self.execute_modes.lock().unwrap().clone()
    }

    fn replay(&self, statement: &str, args: &[String]) -> QueryOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((statement.to_string(), args.to_vec()));
        self.outcomes
            .lock()
            .unwrap()
            .get_mut(statement)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| QueryOutcome::ok(0, Duration::ZERO, None))
    }
}

#[async_trait]
impl SqlExecutor for ScriptedSqlExecutor {
    async fn query_row(
        &self,
        statement: &str,
        args: &[String],
        _schema: &[ColumnType],
    ) -> QueryOutcome {
        self.replay(statement, args)
    }

    async fn execute(
        &self,
        statements: &[String],
        args: &[String],
        transactional: bool,
    ) -> QueryOutcome {
        self.execute_modes.lock().unwrap().push(transactional);
        self.replay(statements.first().map(String::as_str).unwrap_or(""), args)
    }
}

/// sqlx-backed executor over a PostgreSQL or SQLite pool
#[cfg(feature = "sqlx")]
pub enum SqlClient {
    Postgres(sqlx::PgPool),
    Sqlite(sqlx::SqlitePool),
}

#[cfg(feature = "sqlx")]
impl SqlClient {
    pub async fn connect_postgres(url: &str) -> Result<Self, sqlx::Error> {
        Ok(SqlClient::Postgres(sqlx::PgPool::connect(url).await?))
    }

    pub async fn connect_sqlite(url: &str) -> Result<Self, sqlx::Error> {
        Ok(SqlClient::Sqlite(sqlx::SqlitePool::connect(url).await?))
    }
}

#[cfg(feature = "sqlx")]
fn sqlstate_of(e: &sqlx::Error) -> String {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c.into_owned())
        .unwrap_or_else(|| STATE_GENERAL.to_string())
}

#[cfg(feature = "sqlx")]
macro_rules! sqlx_backend {
    ($pool:expr, $statement:expr, $args:expr, $schema:expr, query_row) => {{
        let start = std::time::Instant::now();
        let mut query = sqlx::query($statement);
        for arg in $args {
            query = query.bind(arg);
        }
        match query.fetch_optional($pool).await {
            Ok(Some(row)) => {
                use sqlx::Row;
                let mut columns = Vec::with_capacity($schema.len());
                for (i, ty) in $schema.iter().enumerate() {
                    let value = match ty {
                        ColumnType::Bool => row
                            .try_get::<Option<bool>, _>(i)
                            .map(|v| v.map(Value::Bool)),
                        ColumnType::Int => row
                            .try_get::<Option<i64>, _>(i)
                            .map(|v| v.map(Value::Int)),
                        ColumnType::Text => row
                            .try_get::<Option<String>, _>(i)
                            .map(|v| v.map(Value::Str)),
                    };
                    match value {
                        Ok(v) => columns.push(v.unwrap_or(Value::Null)),
                        Err(e) => {
                            return QueryOutcome::err(
                                STATE_GENERAL,
                                e.to_string(),
                                start.elapsed(),
                            )
                        }
                    }
                }
                QueryOutcome::ok(1, start.elapsed(), Some(columns))
            }
            Ok(None) => QueryOutcome::ok(0, start.elapsed(), None),
            Err(e) => QueryOutcome::err(sqlstate_of(&e), e.to_string(), start.elapsed()),
        }
    }};
    ($pool:expr, $statements:expr, $args:expr, execute) => {{
        let start = std::time::Instant::now();
        let mut rows_affected = 0u64;
        let mut failure = None;
        for statement in $statements {
            let mut query = sqlx::query(statement.as_str());
            for arg in $args {
                query = query.bind(arg);
            }
            match query.execute($pool).await {
                Ok(result) => rows_affected += result.rows_affected(),
                Err(e) => {
                    failure = Some(QueryOutcome::err(
                        sqlstate_of(&e),
                        e.to_string(),
                        start.elapsed(),
                    ));
                    break;
                }
            }
        }
        match failure {
            None => Ok((rows_affected, start.elapsed())),
            Some(outcome) => Err(outcome),
        }
    }};
}

#[cfg(feature = "sqlx")]
#[async_trait]
impl SqlExecutor for SqlClient {
    async fn query_row(
        &self,
        statement: &str,
        args: &[String],
        schema: &[ColumnType],
    ) -> QueryOutcome {
        match self {
            SqlClient::Postgres(pool) => sqlx_backend!(pool, statement, args, schema, query_row),
            SqlClient::Sqlite(pool) => sqlx_backend!(pool, statement, args, schema, query_row),
        }
    }

    async fn execute(
        &self,
        statements: &[String],
        args: &[String],
        transactional: bool,
    ) -> QueryOutcome {
        if transactional {
            let start = std::time::Instant::now();
            macro_rules! run_tx {
                ($pool:expr) => {{
                    let mut tx = match $pool.begin().await {
                        Ok(tx) => tx,
                        Err(e) => return QueryOutcome::no_start(e.to_string()),
                    };
                    let counted =
                        sqlx_backend!(&mut *tx, statements, args, execute);
                    match counted {
                        Ok((rows_affected, duration)) => match tx.commit().await {
                            Ok(()) => QueryOutcome::ok(rows_affected, duration, None),
                            Err(e) => QueryOutcome::err(
                                sqlstate_of(&e),
                                e.to_string(),
                                start.elapsed(),
                            ),
                        },
                        Err(outcome) => {
                            let _ = tx.rollback().await;
                            outcome
                        }
                    }
                }};
            }
            match self {
                SqlClient::Postgres(pool) => run_tx!(pool),
                SqlClient::Sqlite(pool) => run_tx!(pool),
            }
        } else {
            let outcome = match self {
                SqlClient::Postgres(pool) => sqlx_backend!(pool, statements, args, execute),
                SqlClient::Sqlite(pool) => sqlx_backend!(pool, statements, args, execute),
            };
            match outcome {
                Ok((rows_affected, duration)) => QueryOutcome::ok(rows_affected, duration, None),
                Err(outcome) => outcome,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_row_and_execute() {
        let exec = ScriptedSqlExecutor::new();
        exec.script(
            "SELECT banned FROM refs WHERE ref = $1",
            QueryOutcome::ok(1, Duration::ZERO, Some(vec![Value::Bool(true)])),
        );
        exec.script("INSERT", QueryOutcome::err("23505", "duplicate key", Duration::ZERO));

        let row = exec
            .query_row(
                "SELECT banned FROM refs WHERE ref = $1",
                &["blake3:abc".into()],
                &[ColumnType::Bool],
            )
            .await;
        assert_eq!(row.columns, Some(vec![Value::Bool(true)]));
        assert_eq!(row.state, STATE_OK);

        let eff = exec
            .execute(&["INSERT".into()], &[], false)
            .await;
        assert_eq!(eff.state, "23505");
        assert!(matches!(eff.status, SqlStatus::Err(_)));

        assert_eq!(exec.calls().len(), 2);
        // only the execute call is recorded with its transaction mode
        assert_eq!(exec.execute_modes(), vec![false]);
    }

    #[cfg(feature = "sqlx")]
    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let client = SqlClient::connect_sqlite("sqlite::memory:").await.unwrap();
        client
            .execute(
                &["CREATE TABLE refs (ref TEXT, banned INTEGER)".into()],
                &[],
                false,
            )
            .await;
        let insert = client
            .execute(
                &["INSERT INTO refs VALUES (?1, 1)".into()],
                &["blake3:abc".into()],
                true,
            )
            .await;
        assert_eq!(insert.state, STATE_OK);
        assert_eq!(insert.rows_affected, 1);

        let row = client
            .query_row(
                "SELECT banned FROM refs WHERE ref = ?1",
                &["blake3:abc".into()],
                &[ColumnType::Int],
            )
            .await;
        assert_eq!(row.columns, Some(vec![Value::Int(1)]));

        let miss = client
            .query_row(
                "SELECT banned FROM refs WHERE ref = ?1",
                &["blake3:zzz".into()],
                &[ColumnType::Int],
            )
            .await;
        assert_eq!(miss.columns, None);
        assert_eq!(miss.state, STATE_OK);
    }
}
