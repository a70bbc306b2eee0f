//! Driver values → idiomatic JSON values.

use super::RawValue;
use chrono::SecondsFormat;
use serde_json::Value as Json;

/// Coarse family of a database type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeFamily {
    Text,
    Int,
    Float,
    Decimal,
    Bool,
    Date,
    Time,
    Other,
}

impl TypeFamily {
    pub(crate) fn of(db_type: &str) -> Self {
        let upper = db_type.to_ascii_uppercase();
        let base = upper.split(['(', ' ']).next().unwrap_or_default();
        match base {
            "VARCHAR" | "TEXT" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UUID" | "ENUM"
            | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "NVARCHAR" | "NCHAR" => Self::Text,
            "INT" | "INT2" | "INT4" | "INT8" | "INTEGER" | "SMALLINT" | "BIGINT" | "TINYINT"
            | "MEDIUMINT" | "SERIAL" | "BIGSERIAL" | "OID" => Self::Int,
            "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "REAL" => Self::Float,
            "DECIMAL" | "NUMERIC" => Self::Decimal,
            "BOOL" | "BOOLEAN" => Self::Bool,
            "DATE" => Self::Date,
            "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" | "TIME" | "TIMETZ" => Self::Time,
            _ => Self::Other,
        }
    }
}

/// Normalize one raw column value given its database type name.
///
/// NULL collapses to the zero value of the type family (`""`, `0`, `0.0`,
/// `false`); time and unknown families keep `null`.
///
/// `"true"`/`"false"` become booleans only for [`RawValue::Bytes`], the form
/// untyped drivers (MySQL text protocol) hand back. Drivers that decode text
/// columns into [`RawValue::Text`] already know the column is a string, and a
/// `String` field must keep receiving one.
pub fn normalized_value(raw: &RawValue, db_type: &str) -> Json {
    let family = TypeFamily::of(db_type);
    match raw {
        RawValue::Null => match family {
            TypeFamily::Text => Json::String(String::new()),
            TypeFamily::Int => Json::from(0),
            TypeFamily::Float | TypeFamily::Decimal => Json::from(0.0),
            TypeFamily::Bool => Json::Bool(false),
            _ => Json::Null,
        },
        RawValue::Bool(b) => Json::Bool(*b),
        RawValue::Int(i) => Json::from(*i),
        RawValue::Float(f) => float(*f),
        RawValue::Text(s) => match family {
            TypeFamily::Decimal => decimal(s),
            _ => Json::String(s.clone()),
        },
        RawValue::Bytes(b) => {
            let s = String::from_utf8_lossy(b);
            match family {
                TypeFamily::Text => match s.as_ref() {
                    "true" => Json::Bool(true),
                    "false" => Json::Bool(false),
                    _ => Json::String(s.into_owned()),
                },
                TypeFamily::Decimal => decimal(&s),
                _ => Json::String(s.into_owned()),
            }
        }
        RawValue::Timestamp(ts) => match family {
            TypeFamily::Date => Json::String(ts.format("%Y-%m-%d").to_string()),
            _ => Json::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        },
        RawValue::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
        RawValue::Json(v) => v.clone(),
    }
}

fn float(f: f64) -> Json {
    serde_json::Number::from_f64(f)
        .map(Json::Number)
        .unwrap_or(Json::Null)
}

fn decimal(s: &str) -> Json {
    match s.trim().parse::<f64>() {
        Ok(f) => float(f),
        Err(_) => Json::String(s.to_string()),
    }
}
