//! Pre-flight checks of a command against a resource's known columns.
//!
//! Every identifier that is interpolated into SQL (resource, `Where`/`Values`
//! keys, order terms, select and group-by lists, conflict targets) must be a
//! known column or match an enabled column shape:
//!
//! - *alias*: `<col> AS <ident>`
//! - *json path*: `col->a->'b'->>"c"`
//! - *random*: `RANDOM()`

use crate::command::{Command, OnConflict, Request};
use crate::error::{Error, Result};
use crate::schema::{Columns, Schema};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+$").expect("invalid built-in identifier regex"))
}

fn alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)\s+AS\s+\w+$").expect("invalid built-in alias regex")
    })
}

fn json_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(\w+)(?:->(?:\w+|'\w+'|"\w+"))*->>?(?:\w+|'\w+'|"\w+")$"#)
            .expect("invalid built-in json path regex")
    })
}

/// Validates commands before formatting.
#[derive(Debug, Clone)]
pub struct Validator {
    resource: Regex,
    allow_alias: bool,
    allow_json_path: bool,
    allow_random: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            resource: ident_re().clone(),
            allow_alias: false,
            allow_json_path: false,
            allow_random: false,
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allowed resource pattern (default `^\w+$`).
    pub fn resource_pattern(mut self, pattern: &str) -> Result<Self> {
        self.resource = Regex::new(pattern)
            .map_err(|e| Error::validation("resource_pattern", e.to_string()))?;
        Ok(self)
    }

    /// Accept `<col> AS <ident>`.
    pub fn allow_alias(mut self, allow: bool) -> Self {
        self.allow_alias = allow;
        self
    }

    /// Accept JSON path expressions rooted at a known column.
    pub fn allow_json_path(mut self, allow: bool) -> Self {
        self.allow_json_path = allow;
        self
    }

    /// Accept `RANDOM()` (e.g. as an order term).
    pub fn allow_random(mut self, allow: bool) -> Self {
        self.allow_random = allow;
        self
    }

    /// Check `cmd` against `cols`, the resource's base columns.
    pub fn validate(&self, cmd: &Command, cols: &Columns) -> Result<()> {
        if !self.resource.is_match(&cmd.resource) {
            return Err(Error::validation(
                "resource",
                format!("{:?} is not an allowed resource name", cmd.resource),
            ));
        }
        for column in cmd.where_.columns() {
            self.require(column, cols, "where")?;
        }
        for column in cmd.values.columns() {
            self.require(column, cols, "values")?;
        }
        for column in &cmd.columns {
            self.require(column, cols, "columns")?;
        }
        for column in &cmd.group_by {
            self.require(column, cols, "group_by")?;
        }
        for term in &cmd.order {
            self.order_term(term, cols)?;
        }
        match &cmd.on_conflict {
            Some(OnConflict::Update {
                columns,
                constraint,
            }) => {
                for column in columns {
                    self.require(column, cols, "on_conflict_update")?;
                }
                if let Some(c) = constraint {
                    if !ident_re().is_match(c) {
                        return Err(Error::validation(
                            "on_conflict_constraint",
                            format!("{c:?} is not a valid identifier"),
                        ));
                    }
                }
            }
            Some(OnConflict::Ignore(key)) if !key.is_empty() && key != "true" => {
                self.require(key, cols, "on_conflict_ignore")?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Check every command of `req` against its resource in `schema`.
    ///
    /// Unknown resources are rejected. Raw statements are not inspected; gate
    /// them with [`reject_statements`].
    pub fn validate_request(&self, req: &Request, schema: &Schema) -> Result<()> {
        match req {
            Request::Command(cmd) => {
                let cols = schema.columns(&cmd.resource).ok_or_else(|| {
                    Error::validation("resource", format!("unknown resource {:?}", cmd.resource))
                })?;
                self.validate(cmd, cols)
            }
            Request::Statement(_) => Ok(()),
            Request::Batch(reqs) => reqs
                .iter()
                .try_for_each(|r| self.validate_request(r, schema)),
        }
    }

    fn order_term(&self, term: &str, cols: &Columns) -> Result<()> {
        let mut parts = term.split_whitespace();
        let column = parts
            .next()
            .ok_or_else(|| Error::validation("order", "empty order term"))?;
        self.require(column, cols, "order")?;
        match (parts.next(), parts.next()) {
            (None, _) => Ok(()),
            (Some(dir), None)
                if dir.eq_ignore_ascii_case("ASC") || dir.eq_ignore_ascii_case("DESC") =>
            {
                Ok(())
            }
            _ => Err(Error::validation(
                "order",
                format!("{term:?}: expected `<column> [ASC|DESC]`"),
            )),
        }
    }

    fn require(&self, column: &str, cols: &Columns, field: &str) -> Result<()> {
        let mut visited = HashSet::new();
        if self.is_column(column, cols, &mut visited) {
            Ok(())
        } else {
            Err(Error::validation(field, format!("unknown column {column:?}")))
        }
    }

    fn is_column(&self, name: &str, cols: &Columns, visited: &mut HashSet<String>) -> bool {
        if !visited.insert(name.to_string()) {
            return false;
        }
        if cols.contains_key(name) {
            return true;
        }
        if self.allow_random && name.eq_ignore_ascii_case("RANDOM()") {
            return true;
        }
        if self.allow_alias {
            if let Some(base) = alias_re().captures(name).and_then(|c| c.get(1)) {
                if self.is_column(base.as_str().trim(), cols, visited) {
                    return true;
                }
            }
        }
        if self.allow_json_path {
            if let Some(base) = json_path_re().captures(name).and_then(|c| c.get(1)) {
                if self.is_column(base.as_str(), cols, visited) {
                    return true;
                }
            }
        }
        false
    }
}

/// Fail on any raw statement in `req`, at the top level or inside a batch.
pub fn reject_statements(req: &Request) -> Result<()> {
    match req {
        Request::Command(_) => Ok(()),
        Request::Statement(_) => Err(Error::validation("stmt", "raw statements are not accepted")),
        Request::Batch(reqs) => reqs.iter().try_for_each(reject_statements),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{insert, query, update};
    use crate::predicate::Predicate;

    fn cols() -> Columns {
        [("id", "INT8"), ("name", "TEXT"), ("data", "JSONB")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn field_of(err: Error) -> String {
        match err {
            Error::Validation { field, .. } => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn known_columns_pass() {
        let cmd = query("resources")
            .columns(["id", "name"])
            .filter("id", Predicate::gt(1))
            .group_by(["name"])
            .order("name desc")
            .order("id");
        Validator::new().validate(&cmd, &cols()).unwrap();
    }

    #[test]
    fn resource_must_match_pattern() {
        let cmd = query("resources; DROP TABLE x");
        assert_eq!(field_of(Validator::new().validate(&cmd, &cols()).unwrap_err()), "resource");

        let v = Validator::new().resource_pattern(r"^public\.\w+$").unwrap();
        v.validate(&query("public.resources"), &cols()).unwrap();
    }

    #[test]
    fn each_clause_names_the_offending_field() {
        let v = Validator::new();
        let c = cols();
        assert_eq!(field_of(v.validate(&query("r").filter("x", 1), &c).unwrap_err()), "where");
        assert_eq!(field_of(v.validate(&insert("r").value("x", 1), &c).unwrap_err()), "values");
        assert_eq!(field_of(v.validate(&query("r").columns(["x"]), &c).unwrap_err()), "columns");
        assert_eq!(field_of(v.validate(&query("r").group_by(["x"]), &c).unwrap_err()), "group_by");
        assert_eq!(field_of(v.validate(&query("r").order("x"), &c).unwrap_err()), "order");
        assert_eq!(
            field_of(
                v.validate(&insert("r").value("id", 1).on_conflict_update(["x"]), &c)
                    .unwrap_err()
            ),
            "on_conflict_update"
        );
        assert_eq!(
            field_of(
                v.validate(&insert("r").value("id", 1).on_conflict_ignore("x"), &c)
                    .unwrap_err()
            ),
            "on_conflict_ignore"
        );
        v.validate(&insert("r").value("id", 1).on_conflict_ignore("true"), &c)
            .unwrap();
    }

    #[test]
    fn order_direction_is_checked() {
        let v = Validator::new();
        assert!(v.validate(&query("r").order("id ASC"), &cols()).is_ok());
        assert!(v.validate(&query("r").order("id SIDEWAYS"), &cols()).is_err());
        assert!(v.validate(&query("r").order("id DESC, name"), &cols()).is_err());
    }

    #[test]
    fn alias_shape_is_opt_in() {
        let cmd = query("r").columns(["name AS label"]);
        assert!(Validator::new().validate(&cmd, &cols()).is_err());
        let v = Validator::new().allow_alias(true);
        v.validate(&cmd, &cols()).unwrap();
        assert!(v.validate(&query("r").columns(["nope AS label"]), &cols()).is_err());
    }

    #[test]
    fn json_path_shape_is_opt_in() {
        let v = Validator::new().allow_json_path(true);
        for ok in ["data->a", "data->'a'->\"b\"", "data->>a", "data->a->>b"] {
            v.validate(&query("r").filter(ok, 1), &cols())
                .unwrap_or_else(|e| panic!("{ok}: {e}"));
        }
        for bad in ["other->a", "data->", "data->a b", "data->>a->b"] {
            assert!(v.validate(&query("r").filter(bad, 1), &cols()).is_err(), "{bad}");
        }
        assert!(Validator::new().validate(&query("r").filter("data->a", 1), &cols()).is_err());
    }

    #[test]
    fn alias_over_json_path() {
        let v = Validator::new().allow_alias(true).allow_json_path(true);
        v.validate(&query("r").columns(["data->>a AS a"]), &cols()).unwrap();
    }

    #[test]
    fn random_is_opt_in() {
        let cmd = query("r").order("RANDOM()");
        assert!(Validator::new().validate(&cmd, &cols()).is_err());
        Validator::new().allow_random(true).validate(&cmd, &cols()).unwrap();
    }

    #[test]
    fn self_referential_alias_terminates() {
        let v = Validator::new().allow_alias(true);
        assert!(v.validate(&query("r").columns(["x AS x AS x"]), &cols()).is_err());
    }

    #[test]
    fn requests_resolve_resources_through_the_schema() {
        let schema = Schema::new().resource("r", [("id", "INT8")]);
        let v = Validator::new();
        v.validate_request(&query("r").filter("id", 1).into(), &schema)
            .unwrap();
        let err = v
            .validate_request(&query("unknown").into(), &schema)
            .unwrap_err();
        assert_eq!(field_of(err), "resource");
        let batch = crate::command::bulk([
            query("r").into(),
            crate::command::exec("SELECT anything", [1]),
            query("r").filter("name", 1).into(),
        ]);
        assert_eq!(field_of(v.validate_request(&batch, &schema).unwrap_err()), "where");
    }

    #[test]
    fn update_checks_where_and_values() {
        let v = Validator::new();
        v.validate(&update("r").filter("id", 1).value("name", "x"), &cols())
            .unwrap();
    }

    #[test]
    fn statements_are_found_inside_batches() {
        use crate::command::{bulk, exec};

        reject_statements(&bulk([query("r").into(), insert("r").into()])).unwrap();
        let err = reject_statements(&exec("DROP TABLE r", [0])).unwrap_err();
        assert_eq!(field_of(err), "stmt");
        let nested = bulk([query("r").into(), bulk([exec("DELETE FROM r", [0])])]);
        assert_eq!(field_of(reject_statements(&nested).unwrap_err()), "stmt");
    }
}
