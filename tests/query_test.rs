mod common;

use quarry::sql::expr::{value_expr, Expr, ExprExt};
use quarry::{col, q, ColumnSpec, Database, Query, TableSpec, Value};

use common::{fields, values};

async fn db() -> Database {
    let db = common::db().await;
    db.insert("t").rows(common::rs()).execute().await.unwrap();
    db
}

async fn ns(db: &Database, query: Query) -> std::collections::HashSet<String> {
    fields(
        db.select("t")
            .column("n")
            .filter(query)
            .all()
            .await
            .unwrap(),
    )
}

#[tokio::test]
async fn test_query_string() {
    let cases: Vec<(Query, &str)> = vec![
        (q().eq("n", 1), "n == 1"),
        (q().gt("n", 4), "n > 4"),
        (!q().gt("n", 4), "not n > 4"),
        (!!q().gt("n", 4), "n > 4"),
        (q().ge("n", 1).le("n", 5), "n >= 1 and n <= 5"),
        (Query::any([q().lt("n", 1), q().gt("n", 5)]), "n < 1 or n > 5"),
        (q().lt("n", 1) | q().gt("n", 5), "n < 1 or n > 5"),
        (!q().lt("n", 1) | q().gt("n", 5), "not n < 1 or n > 5"),
        (!(q().lt("n", 1) | q().gt("n", 5)), "not (n < 1 or n > 5)"),
        (
            q().ge("n", 1) & !(q().lt("n", 1) | q().gt("n", 5)),
            "n >= 1 and not (n < 1 or n > 5)",
        ),
        (
            q().ge("n", 1) & !(Query::any([q().lt("n", 1), q().gt("n", 5)]) & q().le("n", 8)),
            "n >= 1 and not ((n < 1 or n > 5) and n <= 8)",
        ),
    ];
    for (query, expected) in cases {
        assert_eq!(query.to_string(), expected);
    }
}

#[tokio::test]
async fn test_query() {
    let db = db().await;
    assert_eq!(ns(&db, q().eq("n", 1)).await, values([1i64]));
    assert_eq!(ns(&db, q().gt("n", 4)).await, values([5i64, 6, 7, 8, 9]));
    assert_eq!(ns(&db, q().le("n", 4)).await, values([0i64, 1, 2, 3, 4]));
}

#[tokio::test]
async fn test_query_with_filter() {
    let db = db().await;
    let rows = db
        .select("t")
        .column("n")
        .filter(q().ge("n", 1))
        .filter(q().le("n", 5))
        .all()
        .await
        .unwrap();
    assert_eq!(fields(rows), values([1i64, 2, 3, 4, 5]));
}

#[tokio::test]
async fn test_and() {
    let db = db().await;
    assert_eq!(
        ns(&db, q().ge("n", 1).le("n", 5)).await,
        values([1i64, 2, 3, 4, 5])
    );
    assert_eq!(
        ns(&db, q().ge("n", 1) & q().le("n", 5)).await,
        values([1i64, 2, 3, 4, 5])
    );
}

#[tokio::test]
async fn test_or() {
    let db = db().await;
    assert_eq!(
        ns(&db, Query::any([q().lt("n", 1), q().gt("n", 5)])).await,
        values([0i64, 6, 7, 8, 9])
    );
    assert_eq!(
        ns(&db, q().lt("n", 1) | q().gt("n", 5)).await,
        values([0i64, 6, 7, 8, 9])
    );
}

#[tokio::test]
async fn test_not() {
    let db = db().await;
    assert_eq!(ns(&db, !q().gt("n", 4)).await, values([0i64, 1, 2, 3, 4]));
    assert_eq!(ns(&db, !!q().gt("n", 4)).await, values([5i64, 6, 7, 8, 9]));
    assert_eq!(
        ns(&db, !(q().ge("n", 1).le("n", 5))).await,
        values([0i64, 6, 7, 8, 9])
    );
    assert_eq!(
        ns(&db, !(q().lt("n", 1) | q().gt("n", 5))).await,
        values([1i64, 2, 3, 4, 5])
    );
}

#[tokio::test]
async fn test_compound() {
    let db = db().await;
    let query = q().gt("n", 1) & !(q().lt("n", 1) | q().gt("n", 5));
    let rows = db
        .select("t")
        .column("n")
        .filter(query)
        .filter(q().lt("n", 5))
        .all()
        .await
        .unwrap();
    assert_eq!(fields(rows), values([2i64, 3, 4]));

    let query = q().ge("n", 1) & !(Query::any([q().lt("n", 1), q().gt("n", 5)]) & q().le("n", 8));
    assert_eq!(ns(&db, query).await, values([1i64, 2, 3, 4, 5, 9]));
}

#[tokio::test]
async fn test_query_join() {
    let db = db().await;
    db.add_table("x", TableSpec::new().column("s", ColumnSpec::string()))
        .unwrap();
    db.add_table(
        "y",
        TableSpec::new()
            .column("x", ColumnSpec::fk("x"))
            .column("n", ColumnSpec::integer()),
    )
    .unwrap();
    db.create_tables().await.unwrap();
    let pks = db
        .insert("x")
        .rows([
            quarry::row! { "s" => "a" },
            quarry::row! { "s" => "b" },
            quarry::row! { "s" => "c" },
        ])
        .execute()
        .await
        .unwrap();
    let (pk1, pk2, pk3) = (pks[0], pks[1], pks[2]);
    db.insert("y")
        .rows([
            quarry::row! { "x" => pk1, "n" => 1i64 },
            quarry::row! { "x" => pk2, "n" => 2i64 },
            quarry::row! { "x" => pk3, "n" => 3i64 },
            quarry::row! { "x" => pk3, "n" => 4i64 },
        ])
        .execute()
        .await
        .unwrap();

    let query = !(q().eq("n", 2) | q().gt("x__s", "a"));
    assert_eq!(query.to_string(), "not (n == 2 or x.s > 'a')");
    let rows = db.select("y").column("n").filter(query).all().await.unwrap();
    assert_eq!(fields(rows), values([1i64]));

    let query = !(q().eq("s", "b") | q().gt("ys__n", 1));
    assert_eq!(query.to_string(), "not (s == 'b' or ys.n > 1)");
    let rows = db.select("x").column("s").filter(query).all().await.unwrap();
    assert_eq!(fields(rows), values(["a"]));

    let rows = db
        .select("y")
        .column("n")
        .filter(q().eq("x", pk3))
        .all()
        .await
        .unwrap();
    assert_eq!(fields(rows), values([3i64, 4]));

    let rows = db
        .select("x")
        .column("s")
        .filter(q().gt("ys", 1))
        .all()
        .await
        .unwrap();
    assert_eq!(fields(rows), values(["b", "c"]));
}

#[tokio::test]
async fn test_custom_operator() {
    let db = db().await;
    let next = quarry::register("next", "->", |column, value| {
        Ok(column.add(Expr::LitInt(1)).eq(value_expr(value)?))
    })
    .unwrap();
    let prev = quarry::register("prev", "prev", |column, value| {
        Ok(column.sub(Expr::LitInt(1)).eq(value_expr(value)?))
    })
    .unwrap();

    assert_eq!(q().op("n", "next", 5).to_string(), "n -> 5");
    assert_eq!(q().op("n", "prev", 5).to_string(), "n prev 5");
    assert_eq!(ns(&db, q().op("n", "next", 5)).await, values([4i64]));
    assert_eq!(ns(&db, q().op("n", "prev", 5)).await, values([6i64]));

    drop(next);
    drop(prev);
    // Deregistered: "next" no longer detaches as an operator.
    assert!(db
        .select("t")
        .column("n")
        .filter(q().op("n", "next", 5))
        .all()
        .await
        .is_err());
}

#[tokio::test]
async fn test_custom_unary_operator() {
    let db = db().await;
    let _even = quarry::register("even", "{selector}:even", |column, value| {
        let expected = match value {
            Value::Bool(true) => 0,
            _ => 1,
        };
        Ok(column
            .binary(quarry::sql::expr::BinaryOp::Mod, Expr::LitInt(2))
            .eq(Expr::LitInt(expected)))
    })
    .unwrap();

    assert_eq!(q().op("n", "even", true).to_string(), "n:even");
    assert_eq!(
        ns(&db, q().op("n", "even", true)).await,
        values([0i64, 2, 4, 6, 8])
    );
    assert_eq!(
        ns(&db, q().op("n", "even", false)).await,
        values([1i64, 3, 5, 7, 9])
    );
}

#[tokio::test]
async fn test_selector_conditions() {
    let db = db().await;
    assert_eq!(ns(&db, col("n").eq(1)).await, values([1i64]));
    assert_eq!(ns(&db, col("n").gt(4)).await, values([5i64, 6, 7, 8, 9]));
    assert_eq!(ns(&db, col("n").le(4)).await, values([0i64, 1, 2, 3, 4]));
}
