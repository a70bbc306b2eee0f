use super::*;
use crate::command::{delete, insert, query, update};

fn t(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[test]
fn select_with_paging_mysql() {
    let cmd = query("resources")
        .filter("key", "value")
        .order("key")
        .limit(1)
        .offset(10);
    let stmt = Dialect::MySql.format(&cmd).unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM resources WHERE key = ? ORDER BY key LIMIT 1 OFFSET 10"
    );
    assert_eq!(stmt.args, vec![t("value")]);
}

#[test]
fn select_with_paging_postgres() {
    let cmd = query("resources")
        .filter("key", "value")
        .order("key")
        .limit(1)
        .offset(10);
    let stmt = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM resources WHERE key = $1 ORDER BY key LIMIT 1 OFFSET 10"
    );
    assert_eq!(stmt.args, vec![t("value")]);
}

#[test]
fn zero_limit_and_offset_are_omitted() {
    let stmt = Dialect::MySql.format(&query("r")).unwrap();
    assert_eq!(stmt.sql, "SELECT * FROM r");
    assert!(stmt.args.is_empty());
}

#[test]
fn columns_and_group_by() {
    let cmd = query("orders")
        .columns(["status", "COUNT(*) AS n"])
        .group_by(["status"])
        .order("status DESC")
        .order("n");
    let stmt = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT status, COUNT(*) AS n FROM orders GROUP BY status ORDER BY status DESC, n"
    );
}

#[test]
fn insert_on_conflict_update() {
    let cmd = insert("resources")
        .value("key", "value")
        .on_conflict_update(["key"]);

    let my = Dialect::MySql.format(&cmd).unwrap();
    assert_eq!(
        my.sql,
        "INSERT INTO resources SET key = ? ON DUPLICATE KEY UPDATE key = VALUES(key)"
    );
    assert_eq!(my.args, vec![t("value")]);

    let pg = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(
        pg.sql,
        "INSERT INTO resources (key) VALUES ($1) ON CONFLICT (id) DO UPDATE SET key = EXCLUDED.key"
    );
    assert_eq!(pg.args, vec![t("value")]);
}

#[test]
fn insert_on_conflict_constraint() {
    let cmd = insert("resources")
        .value("key", "v")
        .value("n", 2)
        .on_conflict_update(["n"])
        .on_conflict_constraint("key");
    let pg = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(
        pg.sql,
        "INSERT INTO resources (key, n) VALUES ($1, $2) ON CONFLICT (key) DO UPDATE SET n = EXCLUDED.n"
    );
    assert_eq!(pg.args, vec![t("v"), Value::Int(2)]);
}

#[test]
fn insert_on_conflict_ignore() {
    let cmd = insert("resources").value("key", "v").on_conflict_ignore("true");
    assert_eq!(
        Dialect::MySql.format(&cmd).unwrap().sql,
        "INSERT INTO resources SET key = ? ON DUPLICATE KEY UPDATE id = id"
    );
    assert_eq!(
        Dialect::Postgres.format(&cmd).unwrap().sql,
        "INSERT INTO resources (key) VALUES ($1) ON CONFLICT DO NOTHING"
    );

    let named = insert("resources").value("key", "v").on_conflict_ignore("key");
    assert_eq!(
        Dialect::MySql.format(&named).unwrap().sql,
        "INSERT INTO resources SET key = ? ON DUPLICATE KEY UPDATE key = key"
    );
}

#[test]
fn insert_on_conflict_error_adds_nothing() {
    let cmd = insert("r").value("k", "v").on_conflict_error("true");
    assert_eq!(Dialect::MySql.format(&cmd).unwrap().sql, "INSERT INTO r SET k = ?");
    assert_eq!(
        Dialect::Postgres.format(&cmd).unwrap().sql,
        "INSERT INTO r (k) VALUES ($1)"
    );
}

#[test]
fn empty_insert() {
    assert_eq!(
        Dialect::MySql.format(&insert("r")).unwrap().sql,
        "INSERT INTO r () VALUES ()"
    );
    assert_eq!(
        Dialect::Postgres.format(&insert("r")).unwrap().sql,
        "INSERT INTO r DEFAULT VALUES"
    );
}

#[test]
fn in_lists_expand_placeholders() {
    let cmd = query("r").filter("k", Predicate::in_list(["a", "b"]));
    let my = Dialect::MySql.format(&cmd).unwrap();
    assert_eq!(my.sql, "SELECT * FROM r WHERE k IN (?,?)");
    assert_eq!(my.args, vec![t("a"), t("b")]);

    let cmd = query("r")
        .filter("a", 1)
        .filter("k", Predicate::not_in(["x", "y"]));
    let pg = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(pg.sql, "SELECT * FROM r WHERE a = $1 AND k NOT IN ($2,$3)");
    assert_eq!(pg.args, vec![Value::Int(1), t("x"), t("y")]);
}

#[test]
fn empty_in_lists_are_constant_conditions() {
    let cmd = query("r")
        .filter("a", Predicate::In(vec![]))
        .filter("b", Predicate::NotIn(vec![]));
    let stmt = Dialect::MySql.format(&cmd).unwrap();
    assert_eq!(stmt.sql, "SELECT * FROM r WHERE 1 = 0 AND 1 = 1");
    assert!(stmt.args.is_empty());
}

#[test]
fn like_wraps_pattern() {
    let cmd = query("r")
        .filter("name", Predicate::like("ali"))
        .filter("note", Predicate::not_like("x"));
    let stmt = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM r WHERE name LIKE $1 AND note NOT LIKE $2"
    );
    assert_eq!(stmt.args, vec![t("%ali%"), t("%x%")]);
}

#[test]
fn comparison_and_null_operators() {
    let cmd = query("r")
        .filter("a", Predicate::gt(1))
        .filter("b", Predicate::gt_eq(2))
        .filter("c", Predicate::lt(3))
        .filter("d", Predicate::lt_eq(4))
        .filter("e", Predicate::not_eq(5))
        .filter("f", Predicate::is(Value::Null))
        .filter("g", Predicate::is_not(Value::Null));
    let stmt = Dialect::MySql.format(&cmd).unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM r WHERE a > ? AND b >= ? AND c < ? AND d <= ? AND e != ? \
         AND f IS NULL AND g IS NOT NULL"
    );
    assert_eq!(stmt.args.len(), 5);
}

#[test]
fn between_binds_both_bounds() {
    let cmd = query("r")
        .filter("a", Predicate::between(1, 9))
        .filter("b", Predicate::not_between("a", "m"));
    let stmt = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM r WHERE a BETWEEN $1 AND $2 AND b NOT BETWEEN $3 AND $4"
    );
    assert_eq!(stmt.args, vec![Value::Int(1), Value::Int(9), t("a"), t("m")]);
}

#[test]
fn literals_are_inlined() {
    let cmd = update("r")
        .filter("expires", Predicate::literal("NOW()"))
        .value_literal("touched", "NOW()")
        .value("n", 1);
    let stmt = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(
        stmt.sql,
        "UPDATE r SET n = $1, touched = NOW() WHERE expires = NOW()"
    );
    assert_eq!(stmt.args, vec![Value::Int(1)]);
}

#[test]
fn json_values_bind_as_text() {
    let cmd = insert("r").value("tags", Value::Json(serde_json::json!(["a", "b"])));
    let stmt = Dialect::MySql.format(&cmd).unwrap();
    assert_eq!(stmt.args, vec![t(r#"["a","b"]"#)]);
}

#[test]
fn delete_with_order_and_limit() {
    let cmd = delete("r").filter("k", "v").order("id").limit(2);
    assert_eq!(
        Dialect::MySql.format(&cmd).unwrap().sql,
        "DELETE FROM r WHERE k = ? ORDER BY id LIMIT 2"
    );
    assert_eq!(
        Dialect::Postgres.format(&cmd).unwrap().sql,
        "DELETE FROM r WHERE ctid IN (SELECT ctid FROM r WHERE k = $1 ORDER BY id LIMIT 2)"
    );
    assert_eq!(
        Dialect::Postgres.format(&delete("r").filter("k", "v")).unwrap().sql,
        "DELETE FROM r WHERE k = $1"
    );
}

#[test]
fn update_placeholders_continue_into_where() {
    let cmd = update("r").filter("id", 7).value("name", "x").limit(1);
    let my = Dialect::MySql.format(&cmd).unwrap();
    assert_eq!(my.sql, "UPDATE r SET name = ? WHERE id = ? LIMIT 1");
    assert_eq!(my.args, vec![t("x"), Value::Int(7)]);

    let pg = Dialect::Postgres.format(&cmd).unwrap();
    assert_eq!(
        pg.sql,
        "UPDATE r SET name = $1 WHERE ctid IN (SELECT ctid FROM r WHERE id = $2 LIMIT 1)"
    );
}

#[test]
fn update_without_values_is_rejected() {
    let err = Dialect::MySql.format(&update("r").filter("id", 1)).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn deadlock_codes_per_dialect() {
    assert!(Dialect::MySql.is_deadlock("1213"));
    assert!(!Dialect::MySql.is_deadlock("40P01"));
    assert!(Dialect::Postgres.is_deadlock("40P01"));
    assert!(!Dialect::Postgres.is_deadlock("23505"));
}

#[test]
fn dialect_names() {
    assert_eq!(Dialect::from_name("PostgreSQL"), Some(Dialect::Postgres));
    assert_eq!(Dialect::from_name("mariadb"), Some(Dialect::MySql));
    assert_eq!(Dialect::from_name("sqlite"), None);
    let d: Dialect = serde_json::from_str(r#""pg""#).unwrap();
    assert_eq!(d, Dialect::Postgres);
}
