#![allow(dead_code)]

//! Shared fixtures: table specs, sample rows, and set-comparison
//! helpers for join queries whose row order is unspecified.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};

use quarry::{row, vmap, ColumnSpec, Database, Row, TableSpec, Value};

pub fn t_spec() -> TableSpec {
    TableSpec::new()
        .column("b", ColumnSpec::boolean())
        .column("n", ColumnSpec::integer())
        .column("x", ColumnSpec::double())
        .column("s", ColumnSpec::string())
        .column("o", ColumnSpec::string().nullable())
        .column("dt", ColumnSpec::datetime().nullable())
        .column("bs", ColumnSpec::binary())
        .column("d", ColumnSpec::json())
        .column("ns", ColumnSpec::json().indexed())
        .column("ss", ColumnSpec::json())
        .column("f", ColumnSpec::json())
        .column("fs", ColumnSpec::json())
}

pub fn u_spec() -> TableSpec {
    TableSpec::new()
        .column("s", ColumnSpec::sized_string(255).unique())
        .column("n", ColumnSpec::integer().nullable())
        .column("b", ColumnSpec::boolean().nullable())
}

pub fn u2_spec() -> TableSpec {
    TableSpec::new()
        .column("n1", ColumnSpec::integer())
        .column("n2", ColumnSpec::integer())
        .column("s1", ColumnSpec::sized_string(255))
        .column("s2", ColumnSpec::sized_string(255))
        .unique_together(["n1", "n2"])
        .unique_together(["s1", "s2"])
}

pub fn user_spec() -> TableSpec {
    TableSpec::new().column("name", ColumnSpec::string())
}

pub fn post_spec() -> TableSpec {
    TableSpec::new()
        .column("user", ColumnSpec::fk("user"))
        .column("content", ColumnSpec::string())
        .column("commentary", ColumnSpec::backref("comment"))
        .column("tagging", ColumnSpec::m2m("tag"))
}

pub fn comment_spec() -> TableSpec {
    TableSpec::new()
        .column("post", ColumnSpec::fk("post"))
        .column("content", ColumnSpec::string())
}

pub fn tag_spec() -> TableSpec {
    TableSpec::new()
        .column("name", ColumnSpec::string())
        .column("posts", ColumnSpec::m2m("post"))
}

/// ISO-8601 with microseconds, the engine's wire form.
pub fn iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// The current instant at microsecond precision (the storage
/// granularity, so values survive a roundtrip unchanged).
pub fn now() -> DateTime<Utc> {
    DateTime::from_timestamp_micros(Utc::now().timestamp_micros()).expect("valid timestamp")
}

pub fn r1() -> Row {
    row! {
        "b" => false,
        "n" => 0i64,
        "x" => 0.0,
        "s" => "",
        "o" => Value::Null,
        "dt" => Value::Null,
        "bs" => &b""[..],
        "d" => vmap! {},
        "ns" => Value::List(vec![]),
        "ss" => Value::List(vec![]),
        "f" => Value::Null,
        "fs" => Value::List(vec![]),
    }
}

pub fn r2(now: DateTime<Utc>) -> Row {
    row! {
        "b" => true,
        "n" => 1i64,
        "x" => 1.0,
        "s" => "foo",
        "o" => Value::Null,
        "dt" => now,
        "bs" => &b"\x01\x02"[..],
        "d" => vmap! {
            "b" => true,
            "n" => 1i64,
            "x" => 1.0,
            "s" => "foo",
            "dt" => now,
            "bs" => &b"\x01\x02"[..],
        },
        "ns" => vec![1i64, 2],
        "ss" => vec!["foo", "bar"],
        "f" => vmap! { "s" => "foo" },
        "fs" => Value::List(vec![
            vmap! { "s" => "foo" },
            vmap! { "s" => "bar" },
            vmap! { "s" => Value::Null },
        ]),
    }
}

/// Ten rows with increasing `n`, alternating `b`, and `d = {"x": i}`.
pub fn rs() -> Vec<Row> {
    (0..10)
        .map(|i: i64| {
            let mut row = r1();
            row.insert("n".into(), Value::Int(i));
            row.insert("b".into(), Value::Bool(i % 2 == 0));
            row.insert("d".into(), vmap! { "x" => i });
            row
        })
        .collect()
}

pub async fn db() -> Database {
    let db = Database::new("sqlite::memory:").expect("open in-memory database");
    db.add_table("t", t_spec()).unwrap();
    db.create_tables().await.unwrap();
    db
}

pub async fn fk_db() -> Database {
    let db = Database::new("sqlite::memory:").expect("open in-memory database");
    db.add_table("user", user_spec()).unwrap();
    db.add_table("post", post_spec()).unwrap();
    db.add_table("comment", comment_spec()).unwrap();
    db.add_table("tag", tag_spec()).unwrap();
    db.create_tables().await.unwrap();
    db
}

pub async fn create(db: &Database, table: &str, mut row: Row) -> Row {
    let pks = db.insert(table).row(row.clone()).execute().await.unwrap();
    row.insert("pk".into(), Value::Int(pks[0]));
    row
}

/// Rows as an order-insensitive set of value tuples.
pub fn fields(rows: Vec<Row>) -> HashSet<String> {
    rows.into_iter()
        .map(|row| {
            row.values()
                .map(|value| format!("{value:?}"))
                .collect::<Vec<_>>()
                .join("|")
        })
        .collect()
}

/// Expected single-column values, in the same encoding as [`fields`].
pub fn values<I, V>(expected: I) -> HashSet<String>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    expected
        .into_iter()
        .map(|value| format!("{:?}", value.into()))
        .collect()
}

/// Expected multi-column tuples, in the same encoding as [`fields`].
pub fn tuples<I>(expected: I) -> HashSet<String>
where
    I: IntoIterator<Item = Vec<Value>>,
{
    expected
        .into_iter()
        .map(|row| {
            row.iter()
                .map(|value| format!("{value:?}"))
                .collect::<Vec<_>>()
                .join("|")
        })
        .collect()
}
