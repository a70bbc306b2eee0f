use super::*;
use chrono::TimeZone;
use serde_json::json;

#[derive(Debug, Deserialize, PartialEq)]
struct Resource {
    id: i64,
    name: String,
}

fn resources() -> Rows {
    Rows::new(
        vec![Column::new("id", "INT8"), Column::new("name", "TEXT")],
        vec![
            vec![RawValue::Int(1), RawValue::Text("a".into())],
            vec![RawValue::Int(2), RawValue::Null],
        ],
    )
}

#[test]
fn vec_of_structs_consumes_all_rows() {
    let mut out: Vec<Resource> = vec![Resource {
        id: 99,
        name: "stale".into(),
    }];
    out.scan(&mut resources()).unwrap();
    assert_eq!(
        out,
        vec![
            Resource {
                id: 1,
                name: "a".into()
            },
            Resource {
                id: 2,
                name: String::new()
            },
        ]
    );
}

#[test]
fn option_takes_first_row_only() {
    let mut rows = resources();
    let mut out: Option<Resource> = None;
    out.scan(&mut rows).unwrap();
    assert_eq!(out.map(|r| r.id), Some(1));
    assert_eq!(rows.len(), 1);
}

#[test]
fn option_stays_none_on_empty_result() {
    let mut rows = Rows::new(
        vec![Column::new("id", "INT8"), Column::new("name", "TEXT")],
        vec![],
    );
    let mut out: Option<Resource> = None;
    out.scan(&mut rows).unwrap();
    assert!(out.is_none());
}

#[test]
fn first_requires_a_row() {
    let mut rows = Rows::new(
        vec![Column::new("id", "INT8"), Column::new("name", "TEXT")],
        vec![],
    );
    let mut out = First::<Resource>::new();
    assert!(out.scan(&mut rows).unwrap_err().is_not_found());

    let mut out = First::<Resource>::new();
    out.scan(&mut resources()).unwrap();
    assert_eq!(out.into_inner().map(|r| r.name), Some("a".to_string()));
}

#[test]
fn unknown_column_is_tag_not_found() {
    let mut rows = Rows::new(
        vec![Column::new("id", "INT8"), Column::new("title", "TEXT")],
        vec![vec![RawValue::Int(1), RawValue::Text("x".into())]],
    );
    let mut out: Vec<Resource> = Vec::new();
    match out.scan(&mut rows) {
        Err(Error::TagNotFound(c)) => assert_eq!(c, "title"),
        other => panic!("expected TagNotFound, got {other:?}"),
    }
}

#[test]
fn column_count_must_match_fields() {
    let mut rows = Rows::new(
        vec![Column::new("id", "INT8")],
        vec![vec![RawValue::Int(1)]],
    );
    let mut out: Option<Resource> = None;
    assert!(matches!(
        out.scan(&mut rows),
        Err(Error::FieldCount {
            columns: 1,
            fields: 2
        })
    ));
}

#[test]
fn serde_rename_is_the_column_tag() {
    #[derive(Debug, Deserialize)]
    struct Renamed {
        #[serde(rename = "resource_id")]
        id: i64,
    }
    let mut rows = Rows::new(
        vec![Column::new("resource_id", "INT4")],
        vec![vec![RawValue::Int(5)]],
    );
    let mut out: Option<Renamed> = None;
    out.scan(&mut rows).unwrap();
    assert_eq!(out.map(|r| r.id), Some(5));
}

#[test]
fn map_receives_normalized_values() {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    let mut rows = Rows::new(
        vec![
            Column::new("name", "VARCHAR"),
            Column::new("count", "BIGINT"),
            Column::new("ratio", "DOUBLE"),
            Column::new("active", "BOOLEAN"),
            Column::new("created", "TIMESTAMP"),
            Column::new("born", "DATE"),
            Column::new("flag", "VARCHAR"),
            Column::new("price", "DECIMAL"),
            Column::new("note", "TEXT"),
        ],
        vec![vec![
            RawValue::Null,
            RawValue::Null,
            RawValue::Null,
            RawValue::Null,
            RawValue::Timestamp(ts),
            RawValue::Timestamp(ts),
            RawValue::Bytes(b"true".to_vec()),
            RawValue::Bytes(b"12.50".to_vec()),
            RawValue::Bytes(b"hello".to_vec()),
        ]],
    );
    let mut out = serde_json::Map::new();
    out.scan(&mut rows).unwrap();
    assert_eq!(
        serde_json::Value::Object(out),
        json!({
            "name": "",
            "count": 0,
            "ratio": 0.0,
            "active": false,
            "created": "2024-03-01T12:30:00Z",
            "born": "2024-03-01",
            "flag": true,
            "price": 12.5,
            "note": "hello",
        })
    );
}

#[test]
fn boolean_text_is_coerced_only_from_raw_bytes() {
    let text = Column::new("flag", "TEXT");
    assert_eq!(normalized_value(&RawValue::Bytes(b"false".to_vec()), &text.db_type), json!(false));
    assert_eq!(normalized_value(&RawValue::Text("true".into()), &text.db_type), json!("true"));

    #[derive(Debug, Deserialize, PartialEq)]
    struct Flagged {
        flag: String,
    }
    let mut rows = Rows::new(vec![text], vec![vec![RawValue::Text("true".into())]]);
    let mut out: Option<Flagged> = None;
    out.scan(&mut rows).unwrap();
    assert_eq!(out, Some(Flagged { flag: "true".into() }));
}

#[test]
fn map_is_fresh_per_scan_and_untouched_on_empty() {
    let mut out: HashMap<String, serde_json::Value> = HashMap::new();
    out.insert("stale".into(), json!(1));
    out.scan(&mut resources()).unwrap();
    assert!(!out.contains_key("stale"));
    assert_eq!(out["id"], json!(1));

    let mut empty = Rows::empty();
    out.scan(&mut empty).unwrap();
    assert_eq!(out["name"], json!("a"));
}

#[test]
fn vec_of_maps() {
    let mut out: Vec<BTreeMap<String, serde_json::Value>> = Vec::new();
    out.scan(&mut resources()).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[1]["name"], json!(""));
}

#[test]
fn custom_destination() {
    struct Count(usize);
    impl Scan for Count {
        fn scan(&mut self, rows: &mut Rows) -> Result<()> {
            self.0 = rows.len();
            Ok(())
        }
    }
    let mut c = Count(0);
    c.scan(&mut resources()).unwrap();
    assert_eq!(c.0, 2);
}

#[test]
fn records_round_trip_through_rows() {
    let records = resources().into_records();
    let mut rebuilt = Rows::from_records(records);
    assert_eq!(rebuilt.columns()[0].name, "id");
    let mut out: Vec<Resource> = Vec::new();
    out.scan(&mut rebuilt).unwrap();
    assert_eq!(out[0].name, "a");
}

#[test]
fn struct_fields_probe() {
    assert_eq!(struct_fields::<Resource>(), Some(&["id", "name"][..]));
    assert_eq!(struct_fields::<HashMap<String, i64>>(), None);
    assert_eq!(struct_fields::<i64>(), None);
}
