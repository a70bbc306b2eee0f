//! Known base columns per resource, read from the PostgreSQL catalog.
//!
//! The gateway loads a [`Schema`] at startup and hands each resource's
//! [`Columns`] to the validator.

use crate::command::Statement;
use crate::db::{Database, Transaction};
use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::BTreeMap;

/// Column name to upper-case database type name.
pub type Columns = BTreeMap<String, String>;

const COLUMNS_SQL: &str = r#"
SELECT
  n.nspname::text AS schema_name,
  c.relname::text AS table_name,
  a.attname::text AS column_name,
  upper(pg_catalog.format_type(a.atttypid, a.atttypmod)) AS data_type
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
WHERE c.relkind IN ('r', 'p', 'v', 'm', 'f')
  AND a.attnum > 0
  AND NOT a.attisdropped
  AND n.nspname = ANY(string_to_array($1, ','))
ORDER BY n.nspname, c.relname, a.attnum
"#;

/// Resource name to its columns.
///
/// Every relation is reachable as `schema.table`. The bare `table` name
/// resolves to the first schema in the load order that defines it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    resources: BTreeMap<String, Columns>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a resource by hand.
    pub fn resource<I, K, V>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.resources.insert(
            name.into(),
            columns
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn columns(&self, resource: &str) -> Option<&Columns> {
        self.resources.get(resource)
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Read every table, view and foreign table of `schemas` from the catalog.
    pub async fn load<D: Database>(db: &D, schemas: &[String]) -> Result<Self> {
        if let Some(bad) = schemas.iter().find(|s| s.is_empty() || s.contains(',')) {
            return Err(Error::validation("schemas", format!("invalid schema name {bad:?}")));
        }
        let stmt = Statement::new(COLUMNS_SQL, vec![Value::from(schemas.join(","))]);
        let mut tx = db.begin().await?;
        let rows = tx.query(&stmt).await;
        tx.rollback().await?;

        let mut records = Vec::new();
        let mut rows = rows?;
        while let Some(r) = rows.next_record() {
            let field = |name: &str| {
                r.get(name)
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::decode(name, "expected text"))
            };
            records.push(CatalogRow {
                schema: field("schema_name")?,
                table: field("table_name")?,
                column: field("column_name")?,
                data_type: field("data_type")?,
            });
        }

        let schema = Self::from_catalog(schemas, records);
        if schema.is_empty() {
            return Err(Error::validation(
                "schemas",
                "no tables found in the selected schemas",
            ));
        }
        tracing::info!(
            target: "sqlbridge.gateway",
            resources = schema.len(),
            schemas = %schemas.join(","),
            "schema loaded"
        );
        Ok(schema)
    }

    fn from_catalog(schemas: &[String], rows: Vec<CatalogRow>) -> Self {
        let rank = |s: &str| schemas.iter().position(|x| x == s).unwrap_or(usize::MAX);
        let mut resources: BTreeMap<String, Columns> = BTreeMap::new();
        let mut bare_owner: BTreeMap<String, usize> = BTreeMap::new();

        for row in &rows {
            let owner = bare_owner.entry(row.table.clone()).or_insert(usize::MAX);
            *owner = (*owner).min(rank(&row.schema));
        }
        for row in rows {
            resources
                .entry(format!("{}.{}", row.schema, row.table))
                .or_default()
                .insert(row.column.clone(), row.data_type.clone());
            if bare_owner.get(&row.table) == Some(&rank(&row.schema)) {
                resources
                    .entry(row.table)
                    .or_default()
                    .insert(row.column, row.data_type);
            }
        }
        Self { resources }
    }
}

struct CatalogRow {
    schema: String,
    table: String,
    column: String,
    data_type: String,
}
