use super::*;
use crate::command::{bulk, delete, exec, insert, query, update};

fn t(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn all_predicates() -> Vec<Predicate> {
    vec![
        Predicate::Eq(t("v")),
        Predicate::NotEq(t("v")),
        Predicate::Gt(t("1")),
        Predicate::GtEq(t("1")),
        Predicate::Lt(t("1")),
        Predicate::LtEq(t("1")),
        Predicate::Like("ali".into()),
        Predicate::NotLike("ali".into()),
        Predicate::Is(t("")),
        Predicate::IsNot(t("")),
        Predicate::In(vec![t("a"), t("b")]),
        Predicate::NotIn(vec![t("a")]),
        Predicate::Btwn {
            start: t("1"),
            end: t("9"),
        },
        Predicate::NotBtwn {
            start: t("a"),
            end: t("z"),
        },
    ]
}

#[test]
fn every_predicate_round_trips() {
    for column in ["key", "a:b", "x:eq:y"] {
        for p in all_predicates() {
            let (k, v) = format(column, &p);
            let (c, back) = parse(&k, &v).unwrap();
            assert_eq!(c, column, "column for {p:?}");
            assert_eq!(back, p, "predicate for column {column}");
        }
    }
}

#[test]
fn suffixes_match_the_wire_table() {
    assert_eq!(format("k", &Predicate::eq("v")), ("k:eq".into(), "v".into()));
    assert_eq!(
        format("k", &Predicate::gt_eq(3)),
        ("k:gt_eq".into(), "3".into())
    );
    assert_eq!(
        format("k", &Predicate::in_list(["a", "b"])),
        ("k:in".into(), "a,b".into())
    );
    assert_eq!(
        format("k", &Predicate::between(1, 5)),
        ("k:btwn".into(), "1,5".into())
    );
    assert_eq!(
        format("k", &Predicate::like("v")),
        ("k:like".into(), "v".into())
    );
}

#[test]
fn literal_has_no_suffix_and_decodes_as_eq() {
    let (k, v) = format("created", &Predicate::literal("NOW()"));
    assert_eq!((k.as_str(), v.as_str()), ("created", "NOW()"));
    let (c, p) = parse(&k, &v).unwrap();
    assert_eq!(c, "created");
    assert_eq!(p, Predicate::Eq(t("NOW()")));
}

#[test]
fn bare_and_unknown_suffix_decode_as_eq_on_whole_key() {
    assert_eq!(parse("name", "x").unwrap(), ("name".into(), Predicate::Eq(t("x"))));
    assert_eq!(
        parse("ns:thing", "x").unwrap(),
        ("ns:thing".into(), Predicate::Eq(t("x")))
    );
    assert_eq!(parse(":eq", "x").unwrap(), (":eq".into(), Predicate::Eq(t("x"))));
}

#[test]
fn empty_lists_and_empty_strings_stay_apart() {
    for p in [
        Predicate::In(vec![]),
        Predicate::NotIn(vec![]),
        Predicate::In(vec![t("")]),
        Predicate::NotIn(vec![t("")]),
        Predicate::In(vec![t(""), t("")]),
    ] {
        let (k, v) = format("k", &p);
        assert_eq!(parse(&k, &v).unwrap(), ("k".to_string(), p));
    }
    assert_eq!(format("k", &Predicate::NotIn(vec![])).0, "k:not_in_empty");
    assert_eq!(parse("k:not_in", "").unwrap().1, Predicate::NotIn(vec![t("")]));
}

#[test]
fn between_without_comma_is_rejected() {
    let err = parse("k:btwn", "5").unwrap_err();
    assert!(matches!(err, Error::Codec(_)));
}

#[test]
fn command_json_is_flat() {
    let cmd = insert("resources")
        .value("key", "value")
        .on_conflict_update(["key", "other"]);
    let json: serde_json::Value = serde_json::to_value(&cmd).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "action": "INSERT",
            "resource": "resources",
            "values": {"key": "value"},
            "on_conflict_update": "key,other",
        })
    );

    let cmd = query("resources")
        .filter("key", "value")
        .filter("age", Predicate::gt("3"))
        .order("key")
        .order("age DESC")
        .limit(1)
        .offset(10);
    let json: serde_json::Value = serde_json::to_value(&cmd).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "action": "QUERY",
            "resource": "resources",
            "where": {"age:gt": "3", "key:eq": "value"},
            "order": "key,age DESC",
            "limit": 1,
            "offset": 10,
        })
    );
}

#[test]
fn command_json_round_trips() {
    let commands = vec![
        query("r")
            .columns(["id", "name"])
            .filter("id", Predicate::in_list(["1", "2"]))
            .group_by(["name"])
            .order("id DESC")
            .limit(5),
        delete("r").filter("id", "1").limit(1),
        insert("r")
            .value("n", 1)
            .value("tags", Value::Json(serde_json::json!(["a"])))
            .on_conflict_ignore("true"),
        insert("r")
            .value("n", "x")
            .on_conflict_update(["n"])
            .on_conflict_constraint("r_n_key"),
        update("r")
            .filter("id", "1")
            .value("n", "x")
            .on_conflict_error("true"),
    ];
    for cmd in commands {
        let bytes = serde_json::to_vec(&cmd).unwrap();
        let back: Command = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, cmd);
    }
}

#[test]
fn unknown_action_fails_closed() {
    let err = serde_json::from_str::<Command>(r#"{"action":"MERGE","resource":"r"}"#).unwrap_err();
    assert!(err.to_string().contains("MERGE"));
}

#[test]
fn two_conflict_branches_are_rejected() {
    let body = r#"{"action":"INSERT","resource":"r","on_conflict_ignore":"true","on_conflict_error":"true"}"#;
    assert!(serde_json::from_str::<Command>(body).is_err());
}

#[test]
fn request_bodies_round_trip() {
    let requests = vec![
        exec("CREATE TABLE t (id int)", Vec::<Value>::new()),
        exec("INSERT INTO t VALUES ($1)", [1]),
        query("t").filter("id", "1").into(),
        bulk([
            delete("t").into(),
            exec("SELECT 1", Vec::<Value>::new()),
            query("t").into(),
        ]),
    ];
    for req in requests {
        let body = to_json(&req).unwrap();
        assert_eq!(from_json(&body).unwrap(), req);
    }
}

#[test]
fn batch_body_uses_requests_key() {
    let body = to_json(&bulk([query("t").into()])).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"requests": [{"action": "QUERY", "resource": "t"}]})
    );
}

#[test]
fn nested_batch_is_rejected() {
    let nested = bulk([bulk([query("t").into()])]);
    assert!(matches!(to_json(&nested), Err(Error::Unsupported(_))));

    let body = br#"{"requests":[{"requests":[]}]}"#;
    assert!(from_json(body).is_err());
}
