mod common;

use quarry::{q, row, Database, Error, Result};

async fn u_db() -> Database {
    let db = Database::new("sqlite::memory:").unwrap();
    db.add_table("u", common::u_spec()).unwrap();
    db.create_tables().await.unwrap();
    db
}

async fn insert(db: &Database, s: &str) -> Result<Vec<i64>> {
    db.insert("u").row(row! { "s" => s }).execute().await
}

fn boom<T>() -> Result<T> {
    Err(Error::Invalid("boom".into()))
}

#[tokio::test]
async fn test_transaction() {
    let db = u_db().await;

    let result: Result<()> = db
        .transaction(async {
            insert(&db, "foo").await?;
            insert(&db, "bar").await?;
            assert_eq!(db.count("u").get().await?, 2);
            boom()
        })
        .await;
    assert!(result.is_err());
    assert_eq!(db.count("u").get().await.unwrap(), 0);

    db.transaction(async {
        insert(&db, "foo").await?;
        insert(&db, "bar").await?;
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(db.count("u").get().await.unwrap(), 2);
}

#[tokio::test]
async fn test_transaction_shared_scope() {
    let db = u_db().await;

    // An inner scope without `nested` shares the outer transaction; its
    // failure rolls the outer transaction back immediately.
    db.transaction(async {
        insert(&db, "foo").await?;
        let inner: Result<()> = db
            .transaction(async {
                insert(&db, "bar").await?;
                assert_eq!(db.count("u").get().await?, 2);
                boom()
            })
            .await;
        assert!(inner.is_err());
        assert_eq!(db.count("u").get().await?, 0);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(db.count("u").get().await.unwrap(), 0);

    db.transaction(async {
        insert(&db, "foo").await?;
        db.transaction(async {
            insert(&db, "bar").await?;
            assert_eq!(db.count("u").get().await?, 2);
            Ok(())
        })
        .await?;
        assert_eq!(db.count("u").get().await?, 2);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(db.count("u").get().await.unwrap(), 2);
    assert_eq!(db.delete("u").execute().await.unwrap(), 2);
}

#[tokio::test]
async fn test_transaction_nested() {
    let db = u_db().await;

    // A failing savepoint scope rolls back only its own work.
    db.transaction(async {
        insert(&db, "foo").await?;
        let inner: Result<()> = db
            .nested_transaction(async {
                insert(&db, "bar").await?;
                insert(&db, "baz").await?;
                assert_eq!(db.count("u").get().await?, 3);
                boom()
            })
            .await;
        assert!(inner.is_err());
        assert_eq!(db.count("u").get().await?, 1);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(db.count("u").get().await.unwrap(), 1);
    assert_eq!(db.delete("u").execute().await.unwrap(), 1);

    // A succeeding savepoint scope keeps its work.
    db.transaction(async {
        insert(&db, "foo").await?;
        db.nested_transaction(async {
            insert(&db, "bar").await?;
            insert(&db, "baz").await?;
            assert_eq!(db.count("u").get().await?, 3);
            Ok(())
        })
        .await?;
        assert_eq!(db.count("u").get().await?, 3);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(db.count("u").get().await.unwrap(), 3);
    assert_eq!(db.delete("u").execute().await.unwrap(), 3);

    // A shared scope inside a savepoint rolls back to the savepoint.
    db.transaction(async {
        insert(&db, "foo").await?;
        db.nested_transaction(async {
            insert(&db, "bar").await?;
            let inner: Result<()> = db
                .transaction(async {
                    insert(&db, "baz").await?;
                    assert_eq!(db.count("u").get().await?, 3);
                    boom()
                })
                .await;
            assert!(inner.is_err());
            assert_eq!(db.count("u").get().await?, 1);
            Ok(())
        })
        .await?;
        assert_eq!(db.count("u").get().await?, 1);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(db.count("u").get().await.unwrap(), 1);
}

#[tokio::test]
async fn test_transaction_isolates_unique_violation() {
    let db = u_db().await;
    insert(&db, "foo").await.unwrap();
    let result: Result<()> = db
        .transaction(async {
            insert(&db, "bar").await?;
            insert(&db, "foo").await?;
            Ok(())
        })
        .await;
    match result.unwrap_err() {
        Error::AlreadyExists(message) => assert_eq!(message, "u with s 'foo' already exists"),
        other => panic!("expected unique-violation error, got {other:?}"),
    }
    assert_eq!(db.count("u").get().await.unwrap(), 1);
    assert_eq!(
        db.count("u").filter(q().eq("s", "bar")).get().await.unwrap(),
        0
    );
}
