//! Materializing result rows into caller-supplied destinations.
//!
//! A destination is anything implementing [`Scan`]. Provided shapes:
//!
//! | Destination | Rows consumed | Empty result |
//! |---|---|---|
//! | `Vec<T>` | all, one `T` per row | cleared |
//! | `Option<T>` | first | left as is |
//! | [`First<T>`] | first | [`Error::NotFound`] |
//! | `serde_json::Map`, `HashMap`, `BTreeMap` | first, into a fresh map | left as is |
//!
//! `T` is any `DeserializeOwned`. When `T` is a struct, columns bind to fields by
//! their serde name: the column count must equal the field count
//! ([`Error::FieldCount`]) and every column must name a field
//! ([`Error::TagNotFound`]). Custom destinations implement [`Scan`] directly.
//!
//! ```ignore
//! #[derive(serde::Deserialize)]
//! struct Resource {
//!     id: i64,
//!     key: String,
//! }
//!
//! let mut out: Vec<Resource> = Vec::new();
//! executor.execute(&ctx, &query("resources").into(), Some(&mut out)).await?;
//! ```

mod normalize;

#[cfg(test)]
mod tests;

pub use normalize::normalized_value;

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// One result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Upper-case database type name (`TEXT`, `INT8`, `NUMERIC`, `DATE`, ...).
    pub db_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, db_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: db_type.into(),
        }
    }
}

/// A column value as the driver produced it, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
}

/// A fully fetched result set with a read cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    columns: Vec<Column>,
    rows: VecDeque<Vec<RawValue>>,
}

impl Rows {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<RawValue>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    /// A result with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rebuild rows from decoded JSON records (the HTTP response body).
    ///
    /// Column order follows the first record; column types are left empty.
    pub fn from_records(records: Vec<serde_json::Map<String, serde_json::Value>>) -> Self {
        let columns: Vec<Column> = records
            .first()
            .map(|r| r.keys().map(|k| Column::new(k.clone(), "")).collect())
            .unwrap_or_default();
        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|c| match record.remove(&c.name) {
                        None | Some(serde_json::Value::Null) => RawValue::Null,
                        Some(serde_json::Value::Bool(b)) => RawValue::Bool(b),
                        Some(serde_json::Value::String(s)) => RawValue::Text(s),
                        Some(serde_json::Value::Number(n)) => match n.as_i64() {
                            Some(i) => RawValue::Int(i),
                            None => RawValue::Float(n.as_f64().unwrap_or_default()),
                        },
                        Some(other) => RawValue::Json(other),
                    })
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows not yet consumed.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Advance the cursor, returning the next raw row.
    pub fn next_raw(&mut self) -> Option<Vec<RawValue>> {
        self.rows.pop_front()
    }

    /// Advance the cursor, returning the next row as `{column: normalized value}`.
    pub fn next_record(&mut self) -> Option<serde_json::Map<String, serde_json::Value>> {
        let row = self.rows.pop_front()?;
        Some(record(&self.columns, &row))
    }

    /// Drain the remaining rows as normalized records.
    pub fn into_records(mut self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        let mut out = Vec::with_capacity(self.rows.len());
        while let Some(r) = self.next_record() {
            out.push(r);
        }
        out
    }
}

fn record(columns: &[Column], row: &[RawValue]) -> serde_json::Map<String, serde_json::Value> {
    columns
        .iter()
        .zip(row)
        .map(|(c, v)| (c.name.clone(), normalized_value(v, &c.db_type)))
        .collect()
}

/// A destination rows can be materialized into.
pub trait Scan: Send {
    fn scan(&mut self, rows: &mut Rows) -> Result<()>;
}

/// Single-row destination that requires a row.
#[derive(Debug, Clone, PartialEq)]
pub struct First<T>(pub Option<T>);

impl<T> Default for First<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> First<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Option<T> {
        self.0
    }
}

impl<T: DeserializeOwned + Send> Scan for Vec<T> {
    fn scan(&mut self, rows: &mut Rows) -> Result<()> {
        self.clear();
        if rows.is_empty() {
            return Ok(());
        }
        let binder = Binder::<T>::new(rows.columns())?;
        while let Some(row) = rows.next_raw() {
            self.push(binder.bind(rows.columns(), &row)?);
        }
        Ok(())
    }
}

impl<T: DeserializeOwned + Send> Scan for Option<T> {
    fn scan(&mut self, rows: &mut Rows) -> Result<()> {
        let Some(row) = rows.next_raw() else {
            return Ok(());
        };
        let binder = Binder::<T>::new(rows.columns())?;
        *self = Some(binder.bind(rows.columns(), &row)?);
        Ok(())
    }
}

impl<T: DeserializeOwned + Send> Scan for First<T> {
    fn scan(&mut self, rows: &mut Rows) -> Result<()> {
        self.0.scan(rows)?;
        if self.0.is_none() {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}

impl Scan for serde_json::Map<String, serde_json::Value> {
    fn scan(&mut self, rows: &mut Rows) -> Result<()> {
        if let Some(r) = rows.next_record() {
            *self = r;
        }
        Ok(())
    }
}

impl Scan for HashMap<String, serde_json::Value> {
    fn scan(&mut self, rows: &mut Rows) -> Result<()> {
        if let Some(r) = rows.next_record() {
            *self = r.into_iter().collect();
        }
        Ok(())
    }
}

impl Scan for BTreeMap<String, serde_json::Value> {
    fn scan(&mut self, rows: &mut Rows) -> Result<()> {
        if let Some(r) = rows.next_record() {
            *self = r.into_iter().collect();
        }
        Ok(())
    }
}

/// Keeps the raw result set.
impl Scan for Rows {
    fn scan(&mut self, rows: &mut Rows) -> Result<()> {
        *self = std::mem::take(rows);
        Ok(())
    }
}

/// Column-to-field binding for one result set. Checked once, when the first row arrives.
struct Binder<T> {
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Binder<T> {
    fn new(columns: &[Column]) -> Result<Self> {
        if let Some(fields) = struct_fields::<T>() {
            if columns.len() != fields.len() {
                return Err(Error::FieldCount {
                    columns: columns.len(),
                    fields: fields.len(),
                });
            }
            if let Some(c) = columns.iter().find(|c| !fields.contains(&c.name.as_str())) {
                return Err(Error::TagNotFound(c.name.clone()));
            }
        }
        Ok(Self {
            _marker: std::marker::PhantomData,
        })
    }

    fn bind(&self, columns: &[Column], row: &[RawValue]) -> Result<T> {
        let value = serde_json::Value::Object(record(columns, row));
        serde_json::from_value(value).map_err(|e| Error::decode("*", e.to_string()))
    }
}

/// Field names of `T` if it deserializes as a struct; `None` for maps, scalars and
/// everything else.
pub(crate) fn struct_fields<T: DeserializeOwned>() -> Option<&'static [&'static str]> {
    let mut fields = None;
    let _ = T::deserialize(FieldProbe {
        fields: &mut fields,
    });
    fields
}

/// A deserializer that records the field list `deserialize_struct` is called with
/// and then aborts.
struct FieldProbe<'a> {
    fields: &'a mut Option<&'static [&'static str]>,
}

impl<'de> de::Deserializer<'de> for FieldProbe<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> std::result::Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        *self.fields = Some(fields);
        Err(de::Error::custom("probed"))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}
