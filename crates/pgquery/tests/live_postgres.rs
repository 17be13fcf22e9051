use pgquery::{Driver, PgError, PgResult, Record, Row, Table, TestTransaction, transaction};
use tokio_postgres::NoTls;

async fn connect(test: &str) -> PgResult<Option<TestTransaction<tokio_postgres::Client>>> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            return Ok(None);
        }
    };

    let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .map_err(PgError::from_db_error)?;
    tokio::spawn(async move {
        let _ = connection.await;
    });

    let harness = TestTransaction::new(client);
    harness.start().await?;
    harness
        .query(
            "CREATE TEMP TABLE member (
                id BIGSERIAL PRIMARY KEY,
                first_name TEXT NOT NULL,
                visits BIGINT NOT NULL DEFAULT 0,
                deleted_at TIMESTAMPTZ
            )",
            &[],
        )
        .await?;
    harness
        .query(
            "CREATE TEMP TABLE visit_log (id BIGSERIAL PRIMARY KEY, member_id BIGINT NOT NULL)",
            &[],
        )
        .await?;
    Ok(Some(harness))
}

fn members() -> Table {
    Table::new("member").soft_delete("deletedAt").snake_case(true)
}

#[tokio::test]
async fn live_crud_roundtrip() -> PgResult<()> {
    let Some(db) = connect("live_crud_roundtrip").await? else {
        return Ok(());
    };

    let id: i64 = members()
        .query()
        .insert(Record::new().set("firstName", "Ann"))
        .get("id")
        .fetch_value(&db)
        .await?;

    let row: Row = members()
        .query()
        .select(["id", "firstName", "visits"])
        .eq("id", id)
        .take()
        .fetch_one(&db)
        .await?;
    assert_eq!(row.try_get::<String>("firstName")?, "Ann");
    assert_eq!(row.try_get::<i64>("visits")?, 0);

    let updated = members().query().eq("id", id).increment("visits", 3).execute(&db).await?;
    assert_eq!(updated, 1);

    members().query().eq("id", id).delete().execute(&db).await?;
    let remaining: i64 = members().query().count().fetch_value(&db).await?;
    assert_eq!(remaining, 0);
    let with_deleted: i64 = members().query().include_deleted().count().fetch_value(&db).await?;
    assert_eq!(with_deleted, 1);

    db.close().await
}

#[tokio::test]
async fn live_appended_query_runs_in_one_statement() -> PgResult<()> {
    let Some(db) = connect("live_appended_query_runs_in_one_statement").await? else {
        return Ok(());
    };

    let id: i64 = members()
        .query()
        .insert(Record::new().set("firstName", "Bo"))
        .get("id")
        .fetch_value(&db)
        .await?;

    let log = Table::new("visit_log")
        .snake_case(true)
        .query()
        .insert(Record::new().set("memberId", id));
    let n = members()
        .query()
        .eq("id", id)
        .increment("visits", 1)
        .append_query_required(&log)
        .execute(&db)
        .await?;
    assert_eq!(n, 1);

    let logged: i64 = Table::new("visit_log").query().count().fetch_value(&db).await?;
    assert_eq!(logged, 1);

    db.close().await
}

#[tokio::test]
async fn live_transaction_rolls_back_savepoint() -> PgResult<()> {
    let Some(db) = connect("live_transaction_rolls_back_savepoint").await? else {
        return Ok(());
    };

    transaction(&db, async |tx| {
        members()
            .query()
            .insert(Record::new().set("firstName", "Cy"))
            .execute(tx)
            .await?;
        let nested: PgResult<()> = tx
            .transaction(async |tx| {
                members()
                    .query()
                    .insert(Record::new().set("firstName", "Dee"))
                    .execute(tx)
                    .await?;
                Err(PgError::validation("discard"))
            })
            .await;
        assert!(nested.is_err());
        Ok(())
    })
    .await?;

    let names: Vec<String> = members().query().pluck("firstName").fetch_pluck(&db).await?;
    assert_eq!(names, vec!["Cy".to_string()]);

    db.close().await
}

#[tokio::test]
async fn live_required_append_aborts_whole_statement() -> PgResult<()> {
    let Some(db) = connect("live_required_append_aborts_whole_statement").await? else {
        return Ok(());
    };

    let id: i64 = members()
        .query()
        .insert(Record::new().set("firstName", "Eve"))
        .get("id")
        .fetch_value(&db)
        .await?;

    let missing_log = Table::new("visit_log")
        .snake_case(true)
        .query()
        .eq("memberId", -1)
        .update(Record::new().set("memberId", id));
    let result: PgResult<u64> = transaction(&db, async |tx| {
        members()
            .query()
            .eq("id", id)
            .increment("visits", 1)
            .append_query_required(&missing_log)
            .execute(tx)
            .await
    })
    .await;
    assert!(result.is_err_and(|e| e.is_not_found()));

    let visits: i64 = members().query().eq("id", id).get("visits").fetch_value(&db).await?;
    assert_eq!(visits, 0);

    // main statement empty while the dependent wrote a row: not an error
    let log = Table::new("visit_log")
        .snake_case(true)
        .query()
        .insert(Record::new().set("memberId", id));
    let n = members()
        .query()
        .eq("id", -1)
        .increment("visits", 1)
        .append_query_required(&log)
        .execute(&db)
        .await?;
    assert_eq!(n, 0);

    db.close().await
}
