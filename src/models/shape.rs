//! Shape registration: turns a declared list of fields into fixed SQL
//! templates and ordered field metadata.
//!
//! Registration happens once per shape and returns an immutable
//! [`Shape`] shared behind an `Arc`. All templates use the portable `?`
//! placeholder and backtick-quoted identifiers; the executor rewrites them
//! for the connected backend.

use crate::error::{DbError, DbResult};
use crate::models::field::{DefaultValue, Field};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Produce `n` portable placeholders joined by `", "`.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Quote an identifier with backticks, doubling any embedded backtick.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Builder for a [`Shape`]. Fields keep their declaration order.
#[derive(Debug, Clone)]
pub struct ShapeBuilder {
    name: String,
    table: Option<String>,
    fields: Vec<Field>,
}

impl ShapeBuilder {
    /// Override the table name. Defaults to the shape name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Validate the declaration and derive the templates.
    ///
    /// Fails with a schema error unless exactly one field is a primary key.
    pub fn build(self) -> DbResult<Arc<Shape>> {
        let name = self.name;
        if name.trim().is_empty() {
            return Err(DbError::schema("Shape name cannot be empty", name));
        }
        let table = self.table.unwrap_or_else(|| name.clone());
        if table.trim().is_empty() {
            return Err(DbError::schema("Table name cannot be empty", name));
        }
        if self.fields.is_empty() {
            return Err(DbError::schema("Shape declares no fields", name));
        }

        info!(shape = %name, table = %table, "Found shape");

        let fields = self
            .fields
            .into_iter()
            .map(|field| typed_default(field, &name))
            .collect::<DbResult<Vec<_>>>()?;

        let mut by_name = HashMap::with_capacity(fields.len());
        let mut primary_key: Option<String> = None;
        let mut non_key_fields = Vec::with_capacity(fields.len());

        for (idx, field) in fields.iter().enumerate() {
            debug!(shape = %name, field = %field, "Found mapping");

            if field.name().is_empty() {
                return Err(DbError::schema("Field name cannot be empty", name));
            }
            if by_name.insert(field.name().to_string(), idx).is_some() {
                return Err(DbError::schema(
                    format!("Duplicate field: {}", field.name()),
                    name,
                ));
            }

            if field.is_primary_key() {
                if !field.column_type().can_be_primary_key() {
                    return Err(DbError::schema(
                        format!(
                            "Field {} of type {} cannot be a primary key",
                            field.name(),
                            field.column_type().sql_type()
                        ),
                        name,
                    ));
                }
                if primary_key.is_some() {
                    return Err(DbError::schema(
                        format!("Duplicate primary key for field: {}", field.name()),
                        name,
                    ));
                }
                primary_key = Some(field.name().to_string());
            } else {
                non_key_fields.push(field.name().to_string());
            }
        }

        let primary_key =
            primary_key.ok_or_else(|| DbError::schema("Primary key not found", name.clone()))?;

        let templates = Templates::derive(&table, &primary_key, &non_key_fields);

        Ok(Arc::new(Shape {
            name,
            table,
            primary_key,
            non_key_fields,
            fields,
            by_name,
            templates,
        }))
    }
}

/// Store a literal default in the representation its column holds.
fn typed_default(field: Field, shape: &str) -> DbResult<Field> {
    let DefaultValue::Literal(value) = field.default() else {
        return Ok(field);
    };
    match value.clone().coerce_to(field.column_type()) {
        Ok(value) => Ok(field.default_value(value)),
        Err(_) => Err(DbError::schema(
            format!(
                "Default {} for field {} does not fit column type {}",
                value,
                field.name(),
                field.column_type().sql_type()
            ),
            shape,
        )),
    }
}

#[derive(Debug, Clone)]
struct Templates {
    select: String,
    select_by_key: String,
    insert: String,
    update: Option<String>,
    delete: String,
}

impl Templates {
    fn derive(table: &str, primary_key: &str, non_key_fields: &[String]) -> Self {
        let table = quote_identifier(table);
        let pk = quote_identifier(primary_key);
        let escaped: Vec<String> = non_key_fields
            .iter()
            .map(|f| quote_identifier(f))
            .collect();
        let fields_csv = escaped.join(",");

        let (select, insert, update) = if escaped.is_empty() {
            (
                format!("select {} from {}", pk, table),
                format!("insert into {} ({}) values ({})", table, pk, placeholders(1)),
                None,
            )
        } else {
            let assignments: Vec<String> = escaped.iter().map(|f| format!("{}=?", f)).collect();
            (
                format!("select {}, {} from {}", pk, fields_csv, table),
                format!(
                    "insert into {} ({}, {}) values ({})",
                    table,
                    fields_csv,
                    pk,
                    placeholders(escaped.len() + 1)
                ),
                Some(format!(
                    "update {} set {} where {}=?",
                    table,
                    assignments.join(","),
                    pk
                )),
            )
        };

        Self {
            select_by_key: format!("{} where {}=?", select, pk),
            select,
            insert,
            update,
            delete: format!("delete from {} where {}=?", table, pk),
        }
    }
}

/// Immutable metadata for one registered record shape.
#[derive(Debug, Clone)]
pub struct Shape {
    name: String,
    table: String,
    primary_key: String,
    /// Declaration order. Shared by the insert/update templates and the
    /// argument lists records build for them.
    non_key_fields: Vec<String>,
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
    templates: Templates,
}

impl Shape {
    /// Start declaring a shape. The name doubles as the table name unless
    /// overridden.
    ///
    /// ```
    /// use shapeorm::models::{Field, Shape};
    ///
    /// let shape = Shape::builder("User")
    ///     .table("users")
    ///     .field(Field::integer("id").primary_key())
    ///     .field(Field::text("name"))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(shape.delete_template(), "delete from `users` where `id`=?");
    /// ```
    pub fn builder(name: impl Into<String>) -> ShapeBuilder {
        ShapeBuilder {
            name: name.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn non_key_fields(&self) -> &[String] {
        &self.non_key_fields
    }

    /// All field descriptors in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&idx| &self.fields[idx])
    }

    /// Like [`Shape::field`], but unknown names are an error.
    pub fn require_field(&self, name: &str) -> DbResult<&Field> {
        self.field(name).ok_or_else(|| {
            DbError::invalid_input(format!("Shape '{}' has no field '{}'", self.name, name))
        })
    }

    pub fn select_template(&self) -> &str {
        &self.templates.select
    }

    /// The select template filtered by primary-key equality.
    pub fn select_by_key_template(&self) -> &str {
        &self.templates.select_by_key
    }

    pub fn insert_template(&self) -> &str {
        &self.templates.insert
    }

    /// `None` for shapes whose only field is the primary key.
    pub fn update_template(&self) -> Option<&str> {
        self.templates.update.as_deref()
    }

    pub fn delete_template(&self) -> &str {
        &self.templates.delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::value::Value;

    fn sample() -> Arc<Shape> {
        Shape::builder("Sample")
            .table("t")
            .field(Field::integer("id").primary_key())
            .field(Field::string("a"))
            .field(Field::text("b"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
        for n in 0..20 {
            let s = placeholders(n);
            assert_eq!(s.matches('?').count(), n);
            if n > 0 {
                assert_eq!(s.split(", ").count(), n);
                assert!(s.split(", ").all(|token| token == "?"));
            }
        }
    }

    #[test]
    fn test_templates() {
        let shape = sample();
        assert_eq!(shape.select_template(), "select `id`, `a`,`b` from `t`");
        assert_eq!(
            shape.select_by_key_template(),
            "select `id`, `a`,`b` from `t` where `id`=?"
        );
        assert_eq!(
            shape.insert_template(),
            "insert into `t` (`a`,`b`, `id`) values (?, ?, ?)"
        );
        assert_eq!(
            shape.update_template(),
            Some("update `t` set `a`=?,`b`=? where `id`=?")
        );
        assert_eq!(shape.delete_template(), "delete from `t` where `id`=?");
    }

    #[test]
    fn test_metadata_order() {
        let shape = Shape::builder("Order")
            .field(Field::string("z"))
            .field(Field::integer("id").primary_key())
            .field(Field::string("a"))
            .build()
            .unwrap();
        assert_eq!(shape.table(), "Order");
        assert_eq!(shape.primary_key(), "id");
        assert_eq!(shape.non_key_fields(), &["z".to_string(), "a".to_string()]);
        assert_eq!(
            shape.insert_template(),
            "insert into `Order` (`z`,`a`, `id`) values (?, ?, ?)"
        );
    }

    #[test]
    fn test_missing_primary_key() {
        let err = Shape::builder("NoKey")
            .field(Field::string("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::Schema { .. }));
        assert!(err.to_string().contains("Primary key not found"));
    }

    #[test]
    fn test_duplicate_primary_key() {
        let err = Shape::builder("TwoKeys")
            .field(Field::integer("id").primary_key())
            .field(Field::string("code").primary_key())
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::Schema { .. }));
        assert!(err.to_string().contains("Duplicate primary key"));
    }

    #[test]
    fn test_duplicate_field_name() {
        let err = Shape::builder("Dup")
            .field(Field::integer("id").primary_key())
            .field(Field::string("a"))
            .field(Field::text("a"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate field"));
    }

    #[test]
    fn test_boolean_primary_key_rejected() {
        let err = Shape::builder("Flag")
            .field(Field::boolean("on").primary_key())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("cannot be a primary key"));
    }

    #[test]
    fn test_no_fields() {
        assert!(Shape::builder("Empty").build().is_err());
    }

    #[test]
    fn test_key_only_shape() {
        let shape = Shape::builder("Tag")
            .field(Field::string("tag").primary_key())
            .build()
            .unwrap();
        assert_eq!(shape.select_template(), "select `tag` from `Tag`");
        assert_eq!(
            shape.insert_template(),
            "insert into `Tag` (`tag`) values (?)"
        );
        assert_eq!(shape.update_template(), None);
        assert_eq!(shape.delete_template(), "delete from `Tag` where `tag`=?");
    }

    #[test]
    fn test_identifier_escaping() {
        assert_eq!(quote_identifier("name"), "`name`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_literal_default_stored_as_column_type() {
        let shape = Shape::builder("Metric")
            .field(Field::integer("id").primary_key())
            .field(Field::float("score").default_value(5))
            .build()
            .unwrap();
        let default = shape.field("score").unwrap().default().resolve();
        assert_eq!(default, Some(Value::Float(5.0)));
    }

    #[test]
    fn test_mistyped_literal_default_rejected() {
        let err = Shape::builder("Metric")
            .field(Field::integer("id").primary_key())
            .field(Field::integer("n").default_value("abc"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::Schema { .. }));
        assert!(err.to_string().contains("Default abc for field n"));
    }

    #[test]
    fn test_field_lookup() {
        let shape = sample();
        assert!(shape.field("a").is_some());
        assert!(shape.field("nope").is_none());
        assert!(shape.require_field("nope").is_err());
        assert_eq!(shape.fields().len(), 3);
    }
}
