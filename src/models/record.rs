//! Record instances bound to a shape.
//!
//! A [`Record`] holds values keyed by field name. Reads fall back to the
//! field's declared default, which is resolved once and then stored on the
//! record. Persistence goes through any [`SqlExecutor`] using the shape's
//! precomputed templates, so the argument order always matches the column
//! order those templates were built with.

use crate::db::executor::SqlExecutor;
use crate::error::{DbError, DbResult};
use crate::models::shape::Shape;
use crate::models::value::{Row, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a record is known to exist in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordState {
    /// Constructed in memory, or deleted.
    #[default]
    Unbound,
    /// Loaded by key, or saved with exactly one affected row.
    Persisted,
}

/// One row's worth of values for a [`Shape`].
#[derive(Debug, Clone)]
pub struct Record {
    shape: Arc<Shape>,
    values: HashMap<String, Value>,
    state: RecordState,
}

impl Record {
    /// Create an empty, unbound record.
    pub fn new(shape: &Arc<Shape>) -> Self {
        Self {
            shape: Arc::clone(shape),
            values: HashMap::new(),
            state: RecordState::Unbound,
        }
    }

    /// Builder-style [`Record::set`].
    ///
    /// ```
    /// use shapeorm::models::{Field, Record, Shape, Value};
    ///
    /// let shape = Shape::builder("User")
    ///     .field(Field::integer("id").primary_key())
    ///     .field(Field::string("name"))
    ///     .build()
    ///     .unwrap();
    /// let record = Record::new(&shape).with("id", 1).unwrap().with("name", "ada").unwrap();
    /// assert_eq!(record.peek("name"), Some(&Value::from("ada")));
    /// ```
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> DbResult<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Store a value, converted to the field's column type.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> DbResult<()> {
        let field = self.shape.require_field(name)?;
        let value = value.into().coerce_to(field.column_type())?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Read a value, resolving and storing the field's default when nothing
    /// or NULL is stored. `Ok(None)` means no value and no default.
    pub fn get(&mut self, name: &str) -> DbResult<Option<&Value>> {
        let field = self.shape.require_field(name)?;
        let unset = self.values.get(name).is_none_or(Value::is_null);
        if unset && let Some(value) = field.default().resolve() {
            let value = value.coerce_to(field.column_type())?;
            debug!(field = %name, value = %value, "Using default value");
            self.values.insert(name.to_string(), value);
        }
        Ok(self.values.get(name))
    }

    /// Read the stored value only. Defaults are not resolved.
    pub fn peek(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Stored values in field declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.shape.fields().iter().filter_map(|field| {
            self.values
                .get(field.name())
                .map(|value| (field.name(), value))
        })
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_persisted(&self) -> bool {
        self.state == RecordState::Persisted
    }

    /// Load the record whose primary key equals `key`.
    pub async fn find<E: SqlExecutor>(
        executor: &E,
        shape: &Arc<Shape>,
        key: impl Into<Value>,
    ) -> DbResult<Option<Record>> {
        let key = key.into();
        let rows = executor
            .select(
                shape.select_by_key_template(),
                std::slice::from_ref(&key),
                Some(1),
            )
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(Self::from_row(shape, row)?)),
            None => Ok(None),
        }
    }

    /// Build a persisted record from a result row. Columns the shape does
    /// not declare are ignored.
    pub fn from_row(shape: &Arc<Shape>, row: Row) -> DbResult<Record> {
        let mut values = HashMap::with_capacity(row.len());
        for (column, value) in row {
            if let Some(field) = shape.field(&column) {
                let value = value.coerce_to(field.column_type())?;
                values.insert(column, value);
            }
        }
        Ok(Self {
            shape: Arc::clone(shape),
            values,
            state: RecordState::Persisted,
        })
    }

    /// Insert this record. Returns the affected-row count; anything other
    /// than one is logged and left to the caller.
    pub async fn save<E: SqlExecutor>(&mut self, executor: &E) -> DbResult<u64> {
        let args = self.positional_args()?;
        let affected = executor
            .execute(self.shape.insert_template(), &args)
            .await?;
        if affected == 1 {
            self.state = RecordState::Persisted;
        } else {
            warn!(
                shape = %self.shape.name(),
                rows_affected = affected,
                "Failed to insert record"
            );
        }
        Ok(affected)
    }

    /// Overwrite the stored row's non-key columns, matched by primary key.
    pub async fn update<E: SqlExecutor>(&mut self, executor: &E) -> DbResult<u64> {
        let shape = Arc::clone(&self.shape);
        let Some(template) = shape.update_template() else {
            return Err(DbError::invalid_input(format!(
                "Shape '{}' has no non-key fields to update",
                shape.name()
            )));
        };
        let args = self.positional_args()?;
        let affected = executor.execute(template, &args).await?;
        if affected != 1 {
            warn!(
                shape = %shape.name(),
                rows_affected = affected,
                "Failed to update by primary key"
            );
        }
        Ok(affected)
    }

    /// Delete the stored row matching this record's primary key.
    pub async fn delete<E: SqlExecutor>(&mut self, executor: &E) -> DbResult<u64> {
        let shape = Arc::clone(&self.shape);
        let key = self.resolved(shape.primary_key())?;
        let affected = executor.execute(shape.delete_template(), &[key]).await?;
        if affected == 1 {
            self.state = RecordState::Unbound;
        } else {
            warn!(
                shape = %shape.name(),
                rows_affected = affected,
                "Failed to remove by primary key"
            );
        }
        Ok(affected)
    }

    /// Non-key values in declaration order, then the primary key.
    fn positional_args(&mut self) -> DbResult<Vec<Value>> {
        let shape = Arc::clone(&self.shape);
        let mut args = Vec::with_capacity(shape.non_key_fields().len() + 1);
        for name in shape.non_key_fields() {
            args.push(self.resolved(name)?);
        }
        args.push(self.resolved(shape.primary_key())?);
        Ok(args)
    }

    fn resolved(&mut self, name: &str) -> DbResult<Value> {
        Ok(self.get(name)?.cloned().unwrap_or(Value::Null))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.values() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::Field;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    type Call = (String, Vec<Value>, Option<usize>);

    #[derive(Default)]
    struct StubExecutor {
        rows: Vec<Row>,
        affected: u64,
        calls: Mutex<Vec<Call>>,
    }

    impl StubExecutor {
        fn affecting(affected: u64) -> Self {
            Self {
                affected,
                ..Self::default()
            }
        }

        fn returning(rows: Vec<Row>) -> Self {
            Self {
                rows,
                ..Self::default()
            }
        }

        fn last_call(&self) -> Call {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl SqlExecutor for StubExecutor {
        async fn select(
            &self,
            sql: &str,
            args: &[Value],
            size: Option<usize>,
        ) -> DbResult<Vec<Row>> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), args.to_vec(), size));
            Ok(self.rows.clone())
        }

        async fn execute(&self, sql: &str, args: &[Value]) -> DbResult<u64> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), args.to_vec(), None));
            Ok(self.affected)
        }
    }

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn user_shape() -> Arc<Shape> {
        Shape::builder("User")
            .table("users")
            .field(Field::integer("id").primary_key())
            .field(Field::string("name"))
            .field(Field::boolean("active"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_get_resolves_default_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let shape = Shape::builder("Token")
            .field(Field::string("token").primary_key().default_with(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Value::from(format!("tok-{n}"))
            }))
            .build()
            .unwrap();

        let mut record = Record::new(&shape);
        assert_eq!(record.peek("token"), None);
        let first = record.get("token").unwrap().cloned();
        let second = record.get("token").unwrap().cloned();
        assert_eq!(first, Some(Value::from("tok-0")));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_without_value_or_default() {
        let mut record = Record::new(&user_shape());
        assert_eq!(record.get("name").unwrap(), None);
        assert_eq!(record.get("active").unwrap(), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut record = Record::new(&user_shape());
        assert!(matches!(
            record.get("email"),
            Err(DbError::InvalidInput { .. })
        ));
        assert!(record.set("email", "a@b").is_err());
    }

    #[test]
    fn test_set_checks_column_type() {
        let mut record = Record::new(&user_shape());
        assert!(record.set("id", "not a number").is_err());
        record.set("active", 1).unwrap();
        assert_eq!(record.peek("active"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_save_orders_args_non_key_then_key() {
        let executor = StubExecutor::affecting(1);
        let mut record = Record::new(&user_shape()).with("id", 7).unwrap();

        let affected = record.save(&executor).await.unwrap();
        assert_eq!(affected, 1);
        assert!(record.is_persisted());

        let (sql, args, _) = executor.last_call();
        assert_eq!(
            sql,
            "insert into `users` (`name`,`active`, `id`) values (?, ?, ?)"
        );
        assert_eq!(args, vec![Value::Null, Value::Bool(false), Value::Int(7)]);
    }

    #[tokio::test]
    async fn test_save_with_unexpected_count_warns() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
        let _guard = tracing::subscriber::set_default(subscriber);

        for (count, expected_warnings) in [(0, 1), (1, 1), (2, 2)] {
            let executor = StubExecutor::affecting(count);
            let mut record = Record::new(&user_shape()).with("id", 1).unwrap();
            let affected = record.save(&executor).await.unwrap();
            assert_eq!(affected, count);
            assert_eq!(record.is_persisted(), count == 1);
            assert_eq!(warnings.load(Ordering::SeqCst), expected_warnings);
        }
    }

    #[tokio::test]
    async fn test_save_with_one_affected_row_does_not_warn() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
        let _guard = tracing::subscriber::set_default(subscriber);

        let executor = StubExecutor::affecting(1);
        let mut record = Record::new(&user_shape()).with("id", 1).unwrap();
        assert_eq!(record.save(&executor).await.unwrap(), 1);
        assert!(record.is_persisted());
        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stored_null_falls_back_to_default() {
        let mut record = Record::new(&user_shape())
            .with("active", None::<bool>)
            .unwrap();
        assert_eq!(record.peek("active"), Some(&Value::Null));
        assert_eq!(record.get("active").unwrap(), Some(&Value::Bool(false)));
        assert_eq!(record.peek("active"), Some(&Value::Bool(false)));

        // No default declared: NULL stays NULL
        let mut record = Record::new(&user_shape()).with("name", None::<String>).unwrap();
        assert_eq!(record.get("name").unwrap(), Some(&Value::Null));
    }

    #[test]
    fn test_factory_default_is_coerced() {
        let shape = Shape::builder("Metric")
            .field(Field::integer("id").primary_key())
            .field(Field::float("score").default_with(|| Value::Int(5)))
            .field(Field::integer("count").default_with(|| Value::from("many")))
            .build()
            .unwrap();
        let mut record = Record::new(&shape);
        assert_eq!(record.get("score").unwrap(), Some(&Value::Float(5.0)));
        assert!(matches!(
            record.get("count"),
            Err(DbError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_literal_default_matches_loaded_value() {
        let shape = Shape::builder("Metric")
            .field(Field::integer("id").primary_key())
            .field(Field::float("score").default_value(5))
            .build()
            .unwrap();
        let mut fresh = Record::new(&shape);
        let row: Row = vec![
            ("id".to_string(), Value::Int(1)),
            ("score".to_string(), Value::Int(5)),
        ]
        .into_iter()
        .collect();
        let loaded = Record::from_row(&shape, row).unwrap();
        assert_eq!(fresh.get("score").unwrap(), loaded.peek("score"));
    }

    #[tokio::test]
    async fn test_update_uses_same_order() {
        let executor = StubExecutor::affecting(1);
        let mut record = Record::new(&user_shape())
            .with("id", 3)
            .unwrap()
            .with("name", "ada")
            .unwrap()
            .with("active", true)
            .unwrap();

        record.update(&executor).await.unwrap();
        let (sql, args, _) = executor.last_call();
        assert_eq!(sql, "update `users` set `name`=?,`active`=? where `id`=?");
        assert_eq!(
            args,
            vec![Value::from("ada"), Value::Bool(true), Value::Int(3)]
        );
    }

    #[tokio::test]
    async fn test_update_key_only_shape_rejected() {
        let shape = Shape::builder("Tag")
            .field(Field::string("label").primary_key())
            .build()
            .unwrap();
        let executor = StubExecutor::affecting(1);
        let mut record = Record::new(&shape).with("label", "x").unwrap();
        let err = record.update(&executor).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_binds_key_only() {
        let executor = StubExecutor::affecting(1);
        let mut record = Record::new(&user_shape())
            .with("id", 9)
            .unwrap()
            .with("name", "gone")
            .unwrap();
        record.save(&executor).await.unwrap();
        assert!(record.is_persisted());

        let affected = record.delete(&executor).await.unwrap();
        assert_eq!(affected, 1);
        assert_eq!(record.state(), RecordState::Unbound);
        let (sql, args, _) = executor.last_call();
        assert_eq!(sql, "delete from `users` where `id`=?");
        assert_eq!(args, vec![Value::Int(9)]);
    }

    #[tokio::test]
    async fn test_find_requests_one_row_and_coerces() {
        let row: Row = vec![
            ("id".to_string(), Value::Int(5)),
            ("name".to_string(), Value::from("ada")),
            ("active".to_string(), Value::Int(1)),
            ("extra".to_string(), Value::from("ignored")),
        ]
        .into_iter()
        .collect();
        let executor = StubExecutor::returning(vec![row]);
        let shape = user_shape();

        let record = Record::find(&executor, &shape, 5).await.unwrap().unwrap();
        assert!(record.is_persisted());
        assert_eq!(record.peek("active"), Some(&Value::Bool(true)));
        assert_eq!(record.peek("extra"), None);

        let (sql, args, size) = executor.last_call();
        assert_eq!(
            sql,
            "select `id`, `name`,`active` from `users` where `id`=?"
        );
        assert_eq!(args, vec![Value::Int(5)]);
        assert_eq!(size, Some(1));
    }

    #[tokio::test]
    async fn test_find_not_found() {
        let executor = StubExecutor::returning(Vec::new());
        let found = Record::find(&executor, &user_shape(), 404).await.unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_serialize_in_declaration_order() {
        let record = Record::new(&user_shape())
            .with("active", true)
            .unwrap()
            .with("id", 1)
            .unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":1,"active":true}"#);
    }
}
