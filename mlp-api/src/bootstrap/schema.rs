use sqlx::MySqlPool;
use tracing::{debug, info};

use crate::bootstrap::backfill::backfill_pipeline_versions;
use crate::bootstrap::error::{BootstrapError, BootstrapResult};
use crate::bootstrap::provision::{ProvisionOutcome, classify_provision};

/// Table whose absence marks the very first startup after pipeline
/// versioning was introduced.
const PIPELINE_VERSIONS_TABLE: &str = "pipeline_versions";

/// Unique index made obsolete by the versioning foreign key; dropped when
/// still present.
const OBSOLETE_VERSION_INDEX: &str = "idx_pipeline_version_uuid_name";

const RUN_METRICS_RUN_FK: &str = "fk_run_metrics_run_uuid";
const PIPELINE_VERSIONS_PIPELINE_FK: &str = "fk_pipeline_versions_pipeline_id";

/// One entity table this binary expects: its columns (name and definition)
/// and its key clauses.
///
/// Reconciliation is additive only: absent tables are created whole, present
/// tables gain any missing columns. Nothing is ever dropped, truncated, or
/// retyped here (the two deliberate widenings are separate migration steps).
struct ExpectedTable {
    name: &'static str,
    columns: &'static [(&'static str, &'static str)],
    keys: &'static str,
}

impl ExpectedTable {
    fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|(column, definition)| format!("{column} {definition}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!("create table {} ({columns}, {})", self.name, self.keys)
    }
}

const EXPECTED_TABLES: &[ExpectedTable] = &[
    ExpectedTable {
        name: "experiments",
        columns: &[
            ("UUID", "varchar(255) not null"),
            ("Name", "varchar(255) not null"),
            ("Description", "varchar(255) not null"),
            ("CreatedAtInSec", "bigint not null"),
        ],
        keys: "primary key (UUID), unique key idx_experiments_name (Name)",
    },
    ExpectedTable {
        name: "jobs",
        columns: &[
            ("UUID", "varchar(255) not null"),
            ("DisplayName", "varchar(255) not null"),
            ("Name", "varchar(255) not null"),
            ("Namespace", "varchar(255) not null"),
            ("Description", "varchar(255) not null"),
            ("MaxConcurrency", "bigint not null"),
            ("Enabled", "tinyint(1) not null"),
            ("CreatedAtInSec", "bigint not null"),
            ("UpdatedAtInSec", "bigint not null"),
            ("Conditions", "varchar(255) not null"),
            ("CronScheduleStartTimeInSec", "bigint"),
            ("CronScheduleEndTimeInSec", "bigint"),
            ("Schedule", "varchar(255)"),
            ("PeriodicScheduleStartTimeInSec", "bigint"),
            ("PeriodicScheduleEndTimeInSec", "bigint"),
            ("IntervalSecond", "bigint"),
            ("PipelineId", "varchar(255) not null"),
            ("PipelineName", "varchar(255) not null"),
            ("PipelineSpecManifest", "longtext"),
            ("WorkflowSpecManifest", "longtext"),
            ("Parameters", "longtext"),
        ],
        keys: "primary key (UUID)",
    },
    ExpectedTable {
        name: "pipelines",
        columns: &[
            ("UUID", "varchar(255) not null"),
            ("CreatedAtInSec", "bigint not null"),
            ("Name", "varchar(255) not null"),
            ("Description", "varchar(255) not null"),
            ("Parameters", "longtext"),
            ("Status", "varchar(255) not null"),
            ("DefaultVersionId", "varchar(255)"),
        ],
        keys: "primary key (UUID), unique key idx_pipelines_name (Name)",
    },
    ExpectedTable {
        name: PIPELINE_VERSIONS_TABLE,
        columns: &[
            ("UUID", "varchar(255) not null"),
            ("CreatedAtInSec", "bigint not null"),
            ("Name", "varchar(255) not null"),
            ("Parameters", "longtext"),
            ("PipelineId", "varchar(255)"),
            ("Status", "varchar(255) not null"),
            ("CodeSourceUrl", "varchar(255)"),
        ],
        keys: "primary key (UUID)",
    },
    ExpectedTable {
        name: "resource_references",
        columns: &[
            ("ResourceUUID", "varchar(255) not null"),
            ("ResourceType", "varchar(255) not null"),
            ("ReferenceUUID", "varchar(255) not null"),
            ("ReferenceType", "varchar(255) not null"),
            ("Relationship", "varchar(255) not null"),
            ("Payload", "longtext not null"),
        ],
        keys: "primary key (ResourceUUID, ResourceType, ReferenceType)",
    },
    ExpectedTable {
        name: "run_details",
        columns: &[
            ("UUID", "varchar(255) not null"),
            ("DisplayName", "varchar(255) not null"),
            ("Name", "varchar(255) not null"),
            ("StorageState", "varchar(255) not null"),
            ("Namespace", "varchar(255) not null"),
            ("Description", "varchar(255) not null"),
            ("CreatedAtInSec", "bigint not null"),
            ("ScheduledAtInSec", "bigint not null"),
            ("FinishedAtInSec", "bigint not null"),
            ("Conditions", "varchar(255) not null"),
            ("PipelineId", "varchar(255) not null"),
            ("PipelineName", "varchar(255) not null"),
            ("PipelineSpecManifest", "longtext"),
            ("WorkflowSpecManifest", "longtext"),
            ("Parameters", "longtext"),
            ("PipelineRuntimeManifest", "longtext not null"),
            ("WorkflowRuntimeManifest", "longtext not null"),
        ],
        keys: "primary key (UUID)",
    },
    ExpectedTable {
        name: "run_metrics",
        columns: &[
            ("RunUUID", "varchar(255) not null"),
            ("NodeID", "varchar(255) not null"),
            ("Name", "varchar(255) not null"),
            ("NumberValue", "double"),
            ("Format", "varchar(255)"),
            ("Payload", "longtext"),
        ],
        keys: "primary key (RunUUID, NodeID, Name)",
    },
    ExpectedTable {
        name: "db_statuses",
        columns: &[("HaveSampleLoaded", "tinyint(1) not null")],
        keys: "primary key (HaveSampleLoaded)",
    },
    ExpectedTable {
        name: "default_experiments",
        columns: &[("DefaultExperimentId", "varchar(255) not null")],
        keys: "primary key (DefaultExperimentId)",
    },
];

/// Brings the live catalog's schema to the shape this binary expects.
///
/// Steps run in a fixed order against the pooled handle; none of them is
/// retried here because failures at this layer are structural, not
/// transient. Re-running the whole sequence against an already migrated
/// catalog is a no-op.
pub struct SchemaMigrator {
    pool: MySqlPool,
}

impl SchemaMigrator {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> BootstrapResult<()> {
        // The feature detector must be read before any table creation: once
        // the versioning table exists, a fresh catalog is indistinguishable
        // from an already backfilled one.
        let versions_existed = self
            .table_exists(PIPELINE_VERSIONS_TABLE)
            .await
            .map_err(migration_error("detect_pipeline_versions_table"))?;

        self.reconcile_tables().await?;

        self.widen_to_longtext("resource_references", "Payload")
            .await
            .map_err(migration_error("widen_resource_reference_payload"))?;

        self.ensure_foreign_key(
            "run_metrics",
            RUN_METRICS_RUN_FK,
            "alter table run_metrics \
             add constraint fk_run_metrics_run_uuid \
             foreign key (RunUUID) references run_details (UUID) \
             on delete cascade on update cascade",
            "add_run_metrics_foreign_key",
        )
        .await?;

        self.ensure_foreign_key(
            PIPELINE_VERSIONS_TABLE,
            PIPELINE_VERSIONS_PIPELINE_FK,
            "alter table pipeline_versions \
             add constraint fk_pipeline_versions_pipeline_id \
             foreign key (PipelineId) references pipelines (UUID) \
             on delete cascade on update cascade",
            "add_pipeline_versions_foreign_key",
        )
        .await?;

        if !versions_existed {
            info!("pipeline versioning tables created for the first time, backfilling from pipelines");
            backfill_pipeline_versions(&self.pool).await?;
        }

        self.widen_to_longtext("pipelines", "Description")
            .await
            .map_err(migration_error("widen_pipeline_description"))?;

        self.drop_obsolete_version_index().await?;

        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "select count(*) from information_schema.tables \
             where table_schema = database() and table_name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Brings every expected table into existence with its expected columns.
    ///
    /// A missing table is created whole. A table left behind by an older
    /// deployment may lack columns later features read or write (the
    /// versioning backfill writes `pipelines.DefaultVersionId`, introduced
    /// together with the versioning table itself), so present tables gain
    /// any missing columns in place.
    async fn reconcile_tables(&self) -> BootstrapResult<()> {
        for table in EXPECTED_TABLES {
            let exists = self
                .table_exists(table.name)
                .await
                .map_err(migration_error("reconcile_tables"))?;

            if exists {
                self.add_missing_columns(table)
                    .await
                    .map_err(migration_error("reconcile_tables"))?;
            } else {
                sqlx::query(&table.create_statement())
                    .execute(&self.pool)
                    .await
                    .map_err(migration_error("reconcile_tables"))?;
                debug!(table = table.name, "created table");
            }
        }

        Ok(())
    }

    async fn add_missing_columns(&self, table: &ExpectedTable) -> Result<(), sqlx::Error> {
        let existing: Vec<String> = sqlx::query_scalar(
            "select column_name from information_schema.columns \
             where table_schema = database() and table_name = ?",
        )
        .bind(table.name)
        .fetch_all(&self.pool)
        .await?;

        for &(column, definition) in table.columns {
            if existing
                .iter()
                .any(|present| present.eq_ignore_ascii_case(column))
            {
                continue;
            }

            let statement = format!("alter table {} add column {column} {definition}", table.name);
            sqlx::query(&statement).execute(&self.pool).await?;
            info!(table = table.name, column, "added missing column");
        }

        Ok(())
    }

    /// Widens a free-text column to an unbounded type. MySQL treats a
    /// `modify column` to the type the column already has as a no-op, so
    /// re-running this is safe.
    async fn widen_to_longtext(&self, table: &str, column: &str) -> Result<(), sqlx::Error> {
        let statement = format!("alter table {table} modify column {column} longtext not null");
        sqlx::query(&statement).execute(&self.pool).await?;

        Ok(())
    }

    /// Adds a foreign key, tolerating one that is already in place.
    ///
    /// The engine rejects a duplicate constraint, so this attempts the
    /// creation first and on failure consults the catalog: a present
    /// constraint downgrades the failure to a no-op, anything else keeps the
    /// original error.
    async fn ensure_foreign_key(
        &self,
        table: &str,
        constraint: &str,
        statement: &'static str,
        step: &'static str,
    ) -> BootstrapResult<()> {
        let creation = sqlx::query(statement).execute(&self.pool).await;

        let creation_error = match creation {
            Ok(_) => {
                info!(table, constraint, "created foreign key");
                return Ok(());
            }
            Err(error) => error,
        };

        let present = match self.foreign_key_exists(table, constraint).await {
            Ok(present) => Some(present),
            Err(_) => None,
        };

        match classify_provision(false, present) {
            ProvisionOutcome::AlreadyPresent => {
                debug!(table, constraint, "foreign key already present, skipping");
                Ok(())
            }
            _ => Err(BootstrapError::Migration {
                step,
                source: creation_error,
            }),
        }
    }

    async fn foreign_key_exists(
        &self,
        table: &str,
        constraint: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "select count(*) from information_schema.table_constraints \
             where constraint_schema = database() \
             and table_name = ? \
             and constraint_name = ? \
             and constraint_type = 'FOREIGN KEY'",
        )
        .bind(table)
        .bind(constraint)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Drops the obsolete unique index on the versioning table if it is
    /// still around. An absent index is success, not an error.
    async fn drop_obsolete_version_index(&self) -> BootstrapResult<()> {
        let count: i64 = sqlx::query_scalar(
            "select count(*) from information_schema.statistics \
             where table_schema = database() \
             and table_name = ? \
             and index_name = ?",
        )
        .bind(PIPELINE_VERSIONS_TABLE)
        .bind(OBSOLETE_VERSION_INDEX)
        .fetch_one(&self.pool)
        .await
        .map_err(migration_error("detect_obsolete_version_index"))?;

        if count == 0 {
            return Ok(());
        }

        sqlx::query("alter table pipeline_versions drop index idx_pipeline_version_uuid_name")
            .execute(&self.pool)
            .await
            .map_err(migration_error("drop_obsolete_version_index"))?;
        info!(index = OBSOLETE_VERSION_INDEX, "dropped obsolete index");

        Ok(())
    }
}

fn migration_error(step: &'static str) -> impl FnOnce(sqlx::Error) -> BootstrapError {
    move |source| BootstrapError::Migration { step, source }
}
