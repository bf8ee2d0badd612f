use sqlx::MySqlPool;
use tracing::info;

use crate::bootstrap::error::{BootstrapError, BootstrapResult};

/// One-time derivation of pipeline versions from pre-existing pipelines.
///
/// Runs only on the first startup after the versioning table is introduced
/// (the caller detects that through the table's prior absence). Pipelines
/// created before versioning existed get one implicit version each. The
/// version deliberately reuses the pipeline's identifier: object-store paths
/// for uploaded packages are derived from that identifier, and minting a new
/// one would orphan them. Identifiers only need to be unique within a
/// resource type, so a pipeline and its implicit version sharing one is fine.
///
/// Both statements run in a single transaction: either every pipeline gains
/// its version and its default-version pointer, or the database is left
/// exactly as it was and the next startup retries the whole backfill.
pub async fn backfill_pipeline_versions(pool: &MySqlPool) -> BootstrapResult<()> {
    let mut tx = pool.begin().await.map_err(BootstrapError::Backfill)?;

    let inserted = sqlx::query(
        "insert into pipeline_versions \
         (UUID, Name, CreatedAtInSec, Parameters, Status, PipelineId) \
         select UUID, Name, CreatedAtInSec, Parameters, Status, UUID from pipelines",
    )
    .execute(&mut *tx)
    .await
    .map_err(BootstrapError::Backfill)?;

    sqlx::query("update pipelines set DefaultVersionId = UUID")
        .execute(&mut *tx)
        .await
        .map_err(BootstrapError::Backfill)?;

    tx.commit().await.map_err(BootstrapError::Backfill)?;

    info!(
        pipelines = inserted.rows_affected(),
        "backfilled implicit pipeline versions"
    );

    Ok(())
}
