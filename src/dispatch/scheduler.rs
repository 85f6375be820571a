use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::{
    db::DbPool,
    error::Result,
    push::PushGateway,
    state::AppState,
};

use super::{
    dispatch_job::{DispatchJob, DispatchOutcome},
    store::DispatchStore,
};

/// Postgres advisory lock key shared by every replica.
pub const DISPATCH_LOCK_KEY: i64 = 0x706c_616e_7473;

/// Runs the job while holding the cluster-wide advisory lock.
///
/// The lock is session scoped, so lock and unlock go through the same pooled
/// connection.
pub async fn run_exclusive<S, G>(pool: &DbPool, job: &DispatchJob<S, G>) -> Result<DispatchOutcome>
where
    S: DispatchStore,
    G: PushGateway,
{
    let mut conn = pool.acquire().await?;

    let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
        .bind(DISPATCH_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await?;
    if !locked {
        warn!("Dispatch lock held by another instance; skipping");
        return Ok(DispatchOutcome::Skipped);
    }

    let outcome = job.run().await;

    if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(DISPATCH_LOCK_KEY)
        .execute(&mut *conn)
        .await
    {
        // Dropping the connection from the pool releases the session lock.
        error!("Failed to release dispatch lock: {}", e);
        conn.detach();
    }

    outcome
}

pub async fn start_dispatch_scheduler(state: AppState) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let schedule = state.config.dispatch_cron.clone();

    let job = Job::new_async(schedule.as_str(), move |_uuid, _l| {
        let state = state.clone();

        Box::pin(async move {
            match run_exclusive(&state.db, state.dispatch_job.as_ref()).await {
                Ok(DispatchOutcome::Completed(_)) => {}
                Ok(DispatchOutcome::Skipped) => info!("Scheduled dispatch skipped"),
                Err(e) => error!("Scheduled dispatch failed: {:?}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!(schedule = %schedule, "Dispatch scheduler started");
    Ok(scheduler)
}
