mod common;

use quarry::{col, q, row, vmap, Value};

use common::{fields, r1, values};

#[tokio::test]
async fn test_condition() {
    let db = common::db().await;
    db.insert("t").rows(common::rs()).execute().await.unwrap();
    let ns = |query| {
        let db = db.clone();
        async move {
            fields(
                db.select("t")
                    .column("n")
                    .filter(query)
                    .all()
                    .await
                    .unwrap(),
            )
        }
    };
    assert_eq!(ns(col("n").eq(1)).await, values([1i64]));
    assert_eq!(ns(col("n").gt(4)).await, values([5i64, 6, 7, 8, 9]));
    assert_eq!(ns(col("n").le(4)).await, values([0i64, 1, 2, 3, 4]));
}

#[tokio::test]
async fn test_selectors() {
    let db = common::db().await;
    let mut row = r1();
    row.insert("n".into(), Value::Int(10));
    row.insert("s".into(), Value::Str("foo".into()));
    db.insert("t").row(row).execute().await.unwrap();

    assert_eq!(
        db.select("t")
            .column(col("s"))
            .filter(q().eq("n", 10))
            .all()
            .await
            .unwrap(),
        vec![row! { "s" => "foo" }]
    );
    assert_eq!(
        db.select("t")
            .column(col("s").alias("S"))
            .filter(q().eq("n", 10))
            .all()
            .await
            .unwrap(),
        vec![row! { "S" => "foo" }]
    );
    assert_eq!(
        db.select("t")
            .column(col("s").length().alias("L"))
            .filter(q().eq("n", 10))
            .all()
            .await
            .unwrap(),
        vec![row! { "L" => 3i64 }]
    );
}

#[tokio::test]
async fn test_selectors_json() {
    let db = common::db().await;
    let mut row = r1();
    row.insert("n".into(), Value::Int(10));
    row.insert("d".into(), vmap! { "n" => 1i64, "s" => "foo" });
    db.insert("t").row(row).execute().await.unwrap();

    let select = |selector: quarry::Selector| {
        let db = db.clone();
        async move {
            db.select("t")
                .column(selector)
                .filter(q().eq("n", 10))
                .all()
                .await
                .unwrap()
        }
    };
    assert_eq!(select(col("d.s")).await, vec![row! { "d.s" => "foo" }]);
    assert_eq!(
        select(col("d.s").alias("S")).await,
        vec![row! { "S" => "foo" }]
    );
    assert_eq!(
        select(col("d.s").length().alias("L") + 2).await,
        vec![row! { "L" => 5i64 }]
    );
    assert_eq!(select(col("d.s")).await, vec![row! { "d.s" => "foo" }]);
    assert_eq!(
        select("d.s:S".into()).await,
        vec![row! { "S" => "foo" }]
    );
    assert_eq!(
        select(col("d.s.length:L") + 2).await,
        vec![row! { "L" => 5i64 }]
    );
}

#[tokio::test]
async fn test_increment() {
    let db = common::db().await;
    let mut row = r1();
    row.insert("n".into(), Value::Int(10));
    row.insert("x".into(), Value::Float(1.0));
    db.insert("t").row(row).execute().await.unwrap();

    let affected = db
        .update("t")
        .filter(q().eq("n", 10))
        .set_expr("x", col("x") + 1)
        .execute()
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(
        db.select("t")
            .column("x")
            .filter(q().eq("n", 10))
            .one()
            .await
            .unwrap(),
        row! { "x" => 2.0 }
    );
}
