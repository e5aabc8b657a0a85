mod common;

use quarry::{ColumnSpec, Database, Error, TableSpec};

use common::{comment_spec, post_spec, tag_spec, user_spec};

fn assert_invalid(error: Error, expected: &str) {
    match error {
        Error::Invalid(message) => assert_eq!(message, expected),
        other => panic!("expected invalid-input error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_table() {
    let db = common::db().await;
    db.add_table("a", TableSpec::new().column("n", ColumnSpec::integer()))
        .unwrap();
    db.add_table(
        "b",
        TableSpec::new()
            .plural("bi")
            .column("s", ColumnSpec::string()),
    )
    .unwrap();
    let a = db.table("a").unwrap();
    assert_eq!(a.to_string(), "table 'a'");
    assert_eq!(a.name, "a");
    assert_eq!(a.plural, "as");
    let b = db.table("b").unwrap();
    assert_eq!(b.to_string(), "table 'b'");
    assert_eq!(b.name, "b");
    assert_eq!(b.plural, "bi");
}

#[tokio::test]
async fn test_table_already_exists() {
    let db = common::db().await;
    db.add_table("a", TableSpec::new().column("n", ColumnSpec::integer()))
        .unwrap();
    let error = db
        .add_table("a", TableSpec::new().column("s", ColumnSpec::string()))
        .unwrap_err();
    assert_invalid(error, "table 'a' already exists");
}

#[tokio::test]
async fn test_table_does_not_exist() {
    let db = common::db().await;
    let expected = "table 'a' doesn't exist (available tables are t)";
    assert_invalid(db.table("a").unwrap_err(), expected);
    assert_invalid(db.remove_table("a").unwrap_err(), expected);
}

#[tokio::test]
async fn test_relations() {
    let db = common::fk_db().await;
    let names = |table: &str| -> Vec<String> {
        db.relations_of(table).unwrap().keys().cloned().collect()
    };
    assert_eq!(names("user"), ["posts"]);
    assert_eq!(names("post"), ["user", "commentary", "tagging"]);
    assert_eq!(names("comment"), ["post"]);
    assert_eq!(names("tag"), ["posts"]);
}

#[tokio::test]
async fn test_invalid_fk() {
    let db = common::db().await;
    db.add_table("comment", comment_spec()).unwrap();
    assert_invalid(
        db.relations_of("comment").unwrap_err(),
        "table 'post' referenced by foreign key 'comment.post' doesn't exist \
         (available tables are t and comment)",
    );
}

#[tokio::test]
async fn test_invalid_m2m() {
    let db = common::db().await;
    db.add_table("tag", tag_spec()).unwrap();
    assert_invalid(
        db.relations_of("tag").unwrap_err(),
        "table 'post' referenced by many-to-many 'tag.posts' doesn't exist \
         (available tables are t and tag)",
    );
}

#[tokio::test]
async fn test_remove_table() {
    let db = Database::new("sqlite::memory:").unwrap();
    db.add_table("user", user_spec()).unwrap();
    db.add_table("post", post_spec()).unwrap();
    db.remove_table("post").unwrap();
    let error = db.table("post").unwrap_err();
    assert_invalid(
        error,
        "table 'post' doesn't exist (available tables are user)",
    );
}

#[tokio::test]
async fn test_create_and_drop_tables() {
    let db = Database::new("sqlite::memory:").unwrap();
    db.add_table("a", TableSpec::new().column("n", ColumnSpec::integer()))
        .unwrap();
    db.add_table("b", TableSpec::new().column("s", ColumnSpec::string()))
        .unwrap();

    let insert_a = || db.insert("a").row(quarry::row! { "n" => 1i64 }).execute();
    let insert_b = || db.insert("b").row(quarry::row! { "s" => "foo" }).execute();

    assert!(matches!(insert_a().await, Err(Error::Database(_))));
    db.create_tables_for(&["a"]).await.unwrap();
    insert_a().await.unwrap();

    assert!(matches!(insert_b().await, Err(Error::Database(_))));
    db.create_tables_for(&["b"]).await.unwrap();
    insert_b().await.unwrap();

    db.drop_tables().await.unwrap();
    assert!(matches!(insert_a().await, Err(Error::Database(_))));
    assert!(matches!(insert_b().await, Err(Error::Database(_))));

    db.create_tables().await.unwrap();
    assert_eq!(db.count("a").get().await.unwrap(), 0);
    assert_eq!(db.count("b").get().await.unwrap(), 0);

    insert_a().await.unwrap();
    db.drop_tables_for(&["a"]).await.unwrap();
    assert!(matches!(insert_a().await, Err(Error::Database(_))));

    insert_b().await.unwrap();
    db.drop_tables_for(&["b"]).await.unwrap();
    assert!(matches!(insert_b().await, Err(Error::Database(_))));
}

#[tokio::test]
async fn test_reserved_pk_column() {
    let db = Database::new("sqlite::memory:").unwrap();
    let error = db
        .add_table("a", TableSpec::new().column("pk", ColumnSpec::integer()))
        .unwrap_err();
    assert_invalid(error, "invalid column 'a.pk': 'pk' is reserved");
}
