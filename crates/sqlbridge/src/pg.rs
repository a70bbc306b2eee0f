//! PostgreSQL binding over a deadpool connection pool.

use crate::command::Statement;
use crate::db::{Database, Transaction};
use crate::error::{Error, Result};
use crate::format::Dialect;
use crate::scan::{Column, RawValue, Rows};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Object, Pool};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};

/// A pooled PostgreSQL database. Cheap to clone.
#[derive(Clone)]
pub struct PgDatabase {
    pool: Pool,
}

impl PgDatabase {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool for `database_url` with default settings.
    pub fn connect(database_url: &str) -> Result<Self> {
        Ok(Self::new(crate::pool::create_pool(database_url)?))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl std::fmt::Debug for PgDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDatabase")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl Database for PgDatabase {
    type Tx = PgTransaction;

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn begin(&self) -> Result<PgTransaction> {
        let client = self.pool.get().await?;
        client
            .batch_execute("BEGIN")
            .await
            .map_err(Error::from_db_error)?;
        Ok(PgTransaction {
            client: Some(client),
        })
    }
}

/// A transaction pinned to one pooled connection.
///
/// Dropped unfinished, it issues `ROLLBACK` in the background before the
/// connection returns to the pool.
pub struct PgTransaction {
    client: Option<Object>,
}

impl PgTransaction {
    fn client(&self) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Other("transaction already finished".to_string()))
    }

    async fn finish(mut self, sql: &str) -> Result<()> {
        let client = self
            .client
            .take()
            .ok_or_else(|| Error::Other("transaction already finished".to_string()))?;
        client.batch_execute(sql).await.map_err(Error::from_db_error)
    }
}

fn params(stmt: &Statement) -> Vec<&(dyn ToSql + Sync)> {
    stmt.args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl Transaction for PgTransaction {
    async fn query(&mut self, stmt: &Statement) -> Result<Rows> {
        let client = self.client()?;
        let prepared = client
            .prepare_cached(&stmt.sql)
            .await
            .map_err(Error::from_db_error)?;
        let rows = client
            .query(&prepared, &params(stmt))
            .await
            .map_err(Error::from_db_error)?;
        let columns = prepared
            .columns()
            .iter()
            .map(|c| Column::new(c.name(), c.type_().name().to_ascii_uppercase()))
            .collect();
        let decoded = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
        Ok(Rows::new(columns, decoded))
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64> {
        let client = self.client()?;
        if stmt.args.is_empty() {
            // Multi-statement DDL is only accepted over the simple protocol.
            client
                .batch_execute(&stmt.sql)
                .await
                .map_err(Error::from_db_error)?;
            return Ok(0);
        }
        let prepared = client
            .prepare_cached(&stmt.sql)
            .await
            .map_err(Error::from_db_error)?;
        client
            .execute(&prepared, &params(stmt))
            .await
            .map_err(Error::from_db_error)
    }

    async fn commit(self) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        tracing::warn!(target: "sqlbridge.sql", error = %e, "rollback of dropped transaction failed");
                    }
                });
            }
            // No runtime to roll back on: keep the open transaction out of the pool.
            Err(_) => drop(Object::take(client)),
        }
    }
}

fn decode_row(row: &Row) -> Result<Vec<RawValue>> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect()
}

fn decode_cell(row: &Row, idx: usize) -> Result<RawValue> {
    let column = &row.columns()[idx];
    let ty = column.type_();
    let err = |e: tokio_postgres::Error| Error::decode(column.name(), e.to_string());

    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).map_err(err)?.map(RawValue::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map_err(err)?
            .map(|v| RawValue::Int(v.into()))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map_err(err)?
            .map(|v| RawValue::Int(v.into()))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map_err(err)?.map(RawValue::Int)
    } else if *ty == Type::OID {
        row.try_get::<_, Option<u32>>(idx)
            .map_err(err)?
            .map(|v| RawValue::Int(v.into()))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map_err(err)?
            .map(|v| RawValue::Float(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).map_err(err)?.map(RawValue::Float)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(idx)
            .map_err(err)?
            .map(|v| RawValue::Text(v.to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(err)?
            .map(RawValue::Timestamp)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(err)?
            .map(|v| RawValue::Timestamp(v.and_utc()))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx).map_err(err)?.map(RawValue::Date)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(err)?
            .map(RawValue::Json)
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<uuid::Uuid>>(idx)
            .map_err(err)?
            .map(|v| RawValue::Text(v.to_string()))
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx).map_err(err)?.map(RawValue::Bytes)
    } else {
        row.try_get::<_, Option<String>>(idx)
            .map_err(|_| {
                Error::decode(
                    column.name(),
                    format!("unsupported column type {}", ty.name()),
                )
            })?
            .map(RawValue::Text)
    };
    Ok(value.unwrap_or(RawValue::Null))
}
