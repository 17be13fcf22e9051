//! End-to-end checks through the public API, using the recording driver.

use pgquery::{
    CompileOptions, Condition, PgError, PgResult, QueryResult, Record, RecordingDriver,
    ReturnKind, Row, Table, TestTransaction, Value, raw, template, transaction, unsafe_sql,
};

fn users() -> Table {
    Table::new("user").soft_delete("deletedAt").snake_case(true)
}

#[test]
fn test_readme_query_compiles() {
    let q = Table::new("user").query().select(["id"]).eq("id", 1).limit(1);
    let compiled = q.to_sql().unwrap();
    assert_eq!(
        compiled.sql,
        r#"SELECT "user"."id" FROM "user" WHERE "user"."id" = $1 LIMIT $2"#
    );
    assert_eq!(compiled.params, vec![Value::Int(1), Value::Int(1)]);
}

#[test]
fn test_appended_params_precede_main_params() {
    let main = Table::new("a").query().eq("x", "main");
    let dependent = Table::new("b").query().eq("y", "dep");
    let compiled = main.append_query(&dependent).to_sql().unwrap();
    assert!(compiled.sql.starts_with(r#"WITH "q" AS (SELECT * FROM "b""#));
    assert_eq!(compiled.params, vec![Value::from("dep"), Value::from("main")]);
}

#[test]
fn test_template_rejects_mismatched_segments() {
    let err = template(&["a", "b"], vec![]).unwrap_err();
    assert!(err.is_template());
}

#[test]
fn test_unsafe_json_literal_is_rejected() {
    let err = raw("SELECT ")
        .literal(unsafe_sql(serde_json::json!({"a": 1})))
        .unwrap_err();
    assert!(err.is_template());
}

#[test]
fn test_compiled_query_serializes() {
    let compiled = users().query().eq("id", 5).to_sql().unwrap();
    let json = serde_json::to_value(&compiled).unwrap();
    assert_eq!(json["params"], serde_json::json!([5]));
    assert_eq!(json["guarded"], serde_json::json!(false));
}

#[test]
fn test_descriptor_reuse_across_threads() {
    let base = users().query().select(["id", "firstName"]);
    let expected = base.eq("id", 1).to_sql().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let base = base.clone();
            std::thread::spawn(move || base.eq("id", 1).to_sql().unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_snake_case_option_does_not_override_table_choice() {
    let verbatim = Table::new("event").snake_case(false).query().select(["createdAt"]);
    let compiled = verbatim
        .compile(&CompileOptions::new().snake_case(true))
        .unwrap();
    assert_eq!(compiled.sql, r#"SELECT "event"."createdAt" FROM "event""#);
}

#[tokio::test]
async fn test_transaction_failure_emits_rollback() -> PgResult<()> {
    let driver = RecordingDriver::new();
    let accounts = Table::new("account");

    let result: PgResult<()> = transaction(&driver, async |tx| {
        accounts.query().eq("id", 1).decrement("balance", 10).execute(tx).await?;
        accounts.query().eq("id", 2).increment("balance", 10).execute(tx).await?;
        Err(PgError::validation("insufficient funds"))
    })
    .await;

    assert!(matches!(result, Err(PgError::Validation(_))));
    assert_eq!(
        driver.statements(),
        vec![
            "BEGIN",
            r#"UPDATE "account" SET "balance" = "account"."balance" - $1 WHERE "account"."id" = $2"#,
            r#"UPDATE "account" SET "balance" = "account"."balance" + $1 WHERE "account"."id" = $2"#,
            "ROLLBACK",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_nested_transaction_emits_savepoint() -> PgResult<()> {
    let driver = RecordingDriver::new();

    transaction(&driver, async |tx| {
        tx.transaction(async |tx| {
            Table::new("log")
                .query()
                .insert(Record::new().set("msg", "hi"))
                .execute(tx)
                .await
        })
        .await
    })
    .await?;

    assert_eq!(
        driver.statements(),
        vec![
            "BEGIN",
            "SAVEPOINT s1",
            r#"INSERT INTO "log" ("msg") VALUES ($1)"#,
            "RELEASE SAVEPOINT s1",
            "COMMIT",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_required_append_guards_inside_the_statement() {
    let driver = RecordingDriver::new();
    let profile = Table::new("profile")
        .query()
        .eq("userId", 7)
        .update(Record::new().set("bio", "x"))
        .returning(["id"]);
    let q = Table::new("user")
        .query()
        .eq("id", 7)
        .update(Record::new().set("name", "n"))
        .append_query_required(&profile);

    let compiled = q.to_sql().unwrap();
    assert!(compiled.guarded);
    assert!(compiled.sql.contains(
        r#"(CASE WHEN NOT EXISTS (SELECT 1 FROM "q") THEN (SELECT 'pgquery:not-found')::int END) IS NULL"#
    ));

    // an empty main result is not mistaken for a missing dependent
    assert_eq!(q.execute(&driver).await.unwrap(), 0);
}

#[tokio::test]
async fn test_run_dispatches_on_return_kind() {
    let driver = RecordingDriver::new().with_rows(
        "SELECT",
        vec![Row::from_pairs([("id", Value::Int(1)), ("name", Value::from("a"))])],
    );
    let q = Table::new("user").query().where_exists(
        &Table::new("post")
            .query()
            .and_where(Condition::columns_eq("post.userId", "user.id")),
    );

    assert_eq!(q.take().return_kind(), ReturnKind::One);
    match q.take().run(&driver).await.unwrap() {
        QueryResult::Row(row) => assert_eq!(row.try_get::<String>("name").unwrap(), "a"),
        other => panic!("unexpected: {other:?}"),
    }
    match q.pluck("id").run(&driver).await.unwrap() {
        QueryResult::Values(values) => assert_eq!(values, vec![Value::Int(1)]),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_harness_discards_application_commit() -> PgResult<()> {
    let harness = TestTransaction::new(RecordingDriver::new());
    harness.start().await?;
    transaction(&harness, async |tx| {
        users().query().eq("id", 1).delete().execute(tx).await.map(|_| ())
    })
    .await?;
    harness.rollback().await?;

    let statements = harness.inner().statements();
    assert_eq!(statements.first().map(String::as_str), Some("BEGIN"));
    assert_eq!(statements.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!statements.iter().any(|s| s == "COMMIT"));
    Ok(())
}
