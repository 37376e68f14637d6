use roster_api::test_support::{TestDatabase, TestDatabaseError};
use sqlx::migrate::Migrator;

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn table_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name IN ('users', 'user_sessions', 'employees')",
    )
    .fetch_one(pool)
    .await
    .expect("lookup succeeded")
}

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping migration revert test: no test database configured");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let pool = test_db.pool_clone();

    TEST_MIGRATOR.run(&pool).await.expect("migrations run");
    assert_eq!(table_count(&pool).await, 3);

    TEST_MIGRATOR
        .undo(&pool, 0)
        .await
        .expect("migrations revert");
    assert_eq!(table_count(&pool).await, 0, "tables should be dropped after revert");

    TEST_MIGRATOR.run(&pool).await.expect("migrations rerun");
    assert_eq!(table_count(&pool).await, 3);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn username_uniqueness_is_enforced_by_schema() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping schema test: no test database configured");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };
    let pool = test_db.pool_clone();

    sqlx::query("INSERT INTO users (username, password_hash) VALUES ('alice', 'x')")
        .execute(&pool)
        .await
        .expect("first insert");
    let err = sqlx::query("INSERT INTO users (username, password_hash) VALUES ('alice', 'y')")
        .execute(&pool)
        .await
        .expect_err("duplicate insert must fail");
    let code = err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned());
    assert_eq!(code.as_deref(), Some("23505"));

    let negative = sqlx::query(
        "INSERT INTO employees (name, position, salary) VALUES ('Eve', 'Intern', -1)",
    )
    .execute(&pool)
    .await;
    assert!(negative.is_err(), "negative salary must violate the check");

    test_db.close().await.expect("failed to drop test database");
}
