mod support;

use std::time::{Duration, Instant};

use mlp_api::bootstrap::{
    BootstrapError, SchemaMigrator, backfill_pipeline_versions, connect_database,
};
use mlp_config::shared::{DatabaseConfig, RetryConfig};
use mlp_telemetry::init_test_tracing;
use sqlx::{Executor, MySqlPool};

use crate::support::database::{create_test_database, drop_test_database, test_database_config};

/// Returns the throwaway catalog config, or `None` with a note when no test
/// server is configured.
fn database_config_or_skip(test: &str) -> Option<DatabaseConfig> {
    let config = test_database_config();
    if config.is_none() {
        eprintln!("skipping {test}: TEST_MYSQL_HOST is not set");
    }

    config
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_elapsed_ms: 500,
        initial_delay_ms: 100,
        max_delay_ms: 200,
        backoff_factor: 2.0,
    }
}

async fn table_exists(pool: &MySqlPool, table: &str) -> bool {
    let count: i64 = sqlx::query_scalar(
        "select count(*) from information_schema.tables \
         where table_schema = database() and table_name = ?",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .expect("failed to query information_schema.tables");

    count > 0
}

async fn count_rows(pool: &MySqlPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("select count(*) from `{table}`"))
        .fetch_one(pool)
        .await
        .expect("failed to count rows")
}

async fn foreign_key_count(pool: &MySqlPool, table: &str, constraint: &str) -> i64 {
    sqlx::query_scalar(
        "select count(*) from information_schema.table_constraints \
         where constraint_schema = database() \
         and table_name = ? \
         and constraint_name = ? \
         and constraint_type = 'FOREIGN KEY'",
    )
    .bind(table)
    .bind(constraint)
    .fetch_one(pool)
    .await
    .expect("failed to query information_schema.table_constraints")
}

async fn index_exists(pool: &MySqlPool, table: &str, index: &str) -> bool {
    let count: i64 = sqlx::query_scalar(
        "select count(*) from information_schema.statistics \
         where table_schema = database() and table_name = ? and index_name = ?",
    )
    .bind(table)
    .bind(index)
    .fetch_one(pool)
    .await
    .expect("failed to query information_schema.statistics");

    count > 0
}

/// The shape of the pipelines table as deployments from before the
/// versioning feature left it: no versioning table and no
/// `DefaultVersionId` column, since the pointer arrived together with the
/// table it points at.
async fn create_legacy_pipelines_table(pool: &MySqlPool, pipelines: u32) {
    pool.execute(
        r"create table pipelines (
            UUID varchar(255) not null,
            CreatedAtInSec bigint not null,
            Name varchar(255) not null,
            Description varchar(255) not null,
            Parameters longtext,
            Status varchar(255) not null,
            primary key (UUID),
            unique key idx_pipelines_name (Name)
        )",
    )
    .await
    .expect("failed to create pipelines table");

    seed_pipelines(pool, pipelines).await;
}

async fn seed_pipelines(pool: &MySqlPool, pipelines: u32) {
    for i in 0..pipelines {
        sqlx::query(
            "insert into pipelines (UUID, CreatedAtInSec, Name, Description, Parameters, Status) \
             values (?, ?, ?, ?, ?, ?)",
        )
        .bind(format!("pipeline-{i}"))
        .bind(i64::from(i))
        .bind(format!("pipeline {i}"))
        .bind("")
        .bind("[]")
        .bind("READY")
        .execute(pool)
        .await
        .expect("failed to insert pipeline");
    }
}

#[tokio::test]
async fn dial_failure_surfaces_once_the_budget_is_spent() {
    init_test_tracing();

    // Port 1 on loopback refuses immediately, so each attempt is cheap and
    // the budget alone bounds the duration.
    let config = DatabaseConfig {
        driver: "mysql".to_owned(),
        host: "127.0.0.1".to_owned(),
        port: 1,
        username: "root".to_owned(),
        password: None,
        name: "unreachable".to_owned(),
        group_concat_max_len: 1024,
    };

    let started = Instant::now();
    let error = connect_database(&config, &fast_retry())
        .await
        .expect_err("connecting to a closed port must fail");

    assert!(matches!(error, BootstrapError::Database(_)));
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn migrate_creates_every_table_on_a_fresh_catalog() {
    init_test_tracing();
    let Some(config) = database_config_or_skip("migrate_creates_every_table_on_a_fresh_catalog")
    else {
        return;
    };

    let pool = create_test_database(&config).await;
    SchemaMigrator::new(pool.clone())
        .migrate()
        .await
        .expect("migration failed");

    for table in [
        "experiments",
        "jobs",
        "pipelines",
        "pipeline_versions",
        "resource_references",
        "run_details",
        "run_metrics",
        "db_statuses",
        "default_experiments",
    ] {
        assert!(table_exists(&pool, table).await, "table {table} is missing");
    }

    // No pipelines existed, so the first-startup backfill had nothing to do.
    assert_eq!(count_rows(&pool, "pipeline_versions").await, 0);

    pool.close().await;
    drop_test_database(&config).await;
}

#[tokio::test]
async fn migrate_backfills_versions_for_preexisting_pipelines() {
    init_test_tracing();
    let Some(config) =
        database_config_or_skip("migrate_backfills_versions_for_preexisting_pipelines")
    else {
        return;
    };

    let pool = create_test_database(&config).await;
    create_legacy_pipelines_table(&pool, 3).await;

    SchemaMigrator::new(pool.clone())
        .migrate()
        .await
        .expect("migration failed");

    let versions: Vec<(String, Option<String>)> =
        sqlx::query_as("select UUID, PipelineId from pipeline_versions order by UUID")
            .fetch_all(&pool)
            .await
            .expect("failed to read pipeline versions");
    assert_eq!(versions.len(), 3);
    for (uuid, pipeline_id) in &versions {
        // The implicit version reuses the pipeline's own identifier.
        assert_eq!(pipeline_id.as_deref(), Some(uuid.as_str()));
    }

    // The legacy table had no DefaultVersionId column at all; migration must
    // have added it before the backfill could write the pointers.
    let pipelines: Vec<(String, Option<String>)> =
        sqlx::query_as("select UUID, DefaultVersionId from pipelines order by UUID")
            .fetch_all(&pool)
            .await
            .expect("failed to read pipelines");
    for (uuid, default_version) in &pipelines {
        assert_eq!(default_version.as_deref(), Some(uuid.as_str()));
    }

    pool.close().await;
    drop_test_database(&config).await;
}

#[tokio::test]
async fn migrate_twice_leaves_the_catalog_unchanged() {
    init_test_tracing();
    let Some(config) = database_config_or_skip("migrate_twice_leaves_the_catalog_unchanged")
    else {
        return;
    };

    let pool = create_test_database(&config).await;
    create_legacy_pipelines_table(&pool, 2).await;

    let migrator = SchemaMigrator::new(pool.clone());
    migrator.migrate().await.expect("first migration failed");
    migrator.migrate().await.expect("second migration failed");

    // The backfill ran exactly once and the foreign keys were not duplicated.
    assert_eq!(count_rows(&pool, "pipeline_versions").await, 2);
    assert_eq!(
        foreign_key_count(&pool, "run_metrics", "fk_run_metrics_run_uuid").await,
        1
    );
    assert_eq!(
        foreign_key_count(
            &pool,
            "pipeline_versions",
            "fk_pipeline_versions_pipeline_id"
        )
        .await,
        1
    );

    pool.close().await;
    drop_test_database(&config).await;
}

#[tokio::test]
async fn migrate_drops_the_obsolete_version_index() {
    init_test_tracing();
    let Some(config) = database_config_or_skip("migrate_drops_the_obsolete_version_index") else {
        return;
    };

    let pool = create_test_database(&config).await;
    let migrator = SchemaMigrator::new(pool.clone());
    migrator.migrate().await.expect("first migration failed");

    // Plant the index an older deployment would have left behind.
    pool.execute(
        "create unique index idx_pipeline_version_uuid_name on pipeline_versions (UUID, Name)",
    )
    .await
    .expect("failed to create index");
    assert!(index_exists(&pool, "pipeline_versions", "idx_pipeline_version_uuid_name").await);

    migrator.migrate().await.expect("second migration failed");
    assert!(!index_exists(&pool, "pipeline_versions", "idx_pipeline_version_uuid_name").await);

    // A third run must not fail on the now absent index.
    migrator.migrate().await.expect("third migration failed");

    pool.close().await;
    drop_test_database(&config).await;
}

#[tokio::test]
async fn backfill_is_transactional_and_not_repeatable() {
    init_test_tracing();
    let Some(config) = database_config_or_skip("backfill_is_transactional_and_not_repeatable")
    else {
        return;
    };

    let pool = create_test_database(&config).await;
    SchemaMigrator::new(pool.clone())
        .migrate()
        .await
        .expect("migration failed");

    seed_pipelines(&pool, 3).await;

    backfill_pipeline_versions(&pool)
        .await
        .expect("backfill failed");
    assert_eq!(count_rows(&pool, "pipeline_versions").await, 3);

    // A second run collides on the versions' primary keys; the transaction
    // rolls back and leaves the catalog exactly as the first run did.
    let error = backfill_pipeline_versions(&pool)
        .await
        .expect_err("rerunning the backfill must fail");
    assert!(matches!(error, BootstrapError::Backfill(_)));
    assert_eq!(count_rows(&pool, "pipeline_versions").await, 3);

    pool.close().await;
    drop_test_database(&config).await;
}

#[tokio::test]
async fn backfill_dropped_before_commit_leaves_no_trace() {
    init_test_tracing();
    let Some(config) = database_config_or_skip("backfill_dropped_before_commit_leaves_no_trace")
    else {
        return;
    };

    let pool = create_test_database(&config).await;
    SchemaMigrator::new(pool.clone())
        .migrate()
        .await
        .expect("migration failed");
    seed_pipelines(&pool, 3).await;

    // The insert itself succeeds, then the transaction is dropped without a
    // commit, as a crash between the two backfill statements would leave it.
    {
        let mut tx = pool.begin().await.expect("failed to begin transaction");
        sqlx::query(
            "insert into pipeline_versions \
             (UUID, Name, CreatedAtInSec, Parameters, Status, PipelineId) \
             select UUID, Name, CreatedAtInSec, Parameters, Status, UUID from pipelines",
        )
        .execute(&mut *tx)
        .await
        .expect("insert failed");
    }

    assert_eq!(count_rows(&pool, "pipeline_versions").await, 0);

    let pointers: Vec<Option<String>> = sqlx::query_scalar("select DefaultVersionId from pipelines")
        .fetch_all(&pool)
        .await
        .expect("failed to read pipelines");
    assert_eq!(pointers.len(), 3);
    assert!(pointers.iter().all(Option::is_none));

    pool.close().await;
    drop_test_database(&config).await;
}

#[tokio::test]
async fn pooled_connections_apply_the_group_concat_limit() {
    init_test_tracing();
    let Some(mut config) =
        database_config_or_skip("pooled_connections_apply_the_group_concat_limit")
    else {
        return;
    };
    config.group_concat_max_len = 4096;

    let pool = connect_database(&config, &RetryConfig::default())
        .await
        .expect("failed to connect");

    let limit: u64 = sqlx::query_scalar("select @@session.group_concat_max_len")
        .fetch_one(&pool)
        .await
        .expect("failed to read session variable");
    assert_eq!(limit, 4096);

    pool.close().await;
    drop_test_database(&config).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_serves_concurrent_workers() {
    init_test_tracing();
    let Some(config) = database_config_or_skip("pool_serves_concurrent_workers") else {
        return;
    };

    let pool = connect_database(&config, &RetryConfig::default())
        .await
        .expect("failed to connect");

    let mut workers = Vec::new();
    for worker in 0..32i64 {
        let pool = pool.clone();
        workers.push(tokio::spawn(async move {
            let value: i64 = sqlx::query_scalar("select ?")
                .bind(worker)
                .fetch_one(&pool)
                .await
                .expect("query failed");
            value
        }));
    }

    for (worker, handle) in workers.into_iter().enumerate() {
        let value = handle.await.expect("worker panicked");
        assert_eq!(value, worker as i64);
    }

    pool.close().await;
    drop_test_database(&config).await;
}
