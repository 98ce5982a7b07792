//! Caller-side waiting for an application to settle.
//!
//! Structural operations return before the executor has finished. These
//! helpers poll `inspect` until the application reaches the state the
//! caller expects. Dropping the returned future cancels the wait.

use std::time::Duration;

use shoal_state::{AppSummary, OpStatus};
use tokio::time::MissedTickBehavior;

use crate::error::{SchedulerError, SchedulerResult};
use crate::scheduler::Scheduler;

/// Wait until application `id` reports `expected`.
pub async fn wait_for_status(
    scheduler: &Scheduler,
    id: &str,
    expected: OpStatus,
    timeout: Duration,
    poll_interval: Duration,
) -> SchedulerResult<AppSummary> {
    tokio::time::timeout(timeout, poll_status(scheduler, id, expected, poll_interval))
        .await
        .unwrap_or_else(|_| {
            Err(SchedulerError::Timeout {
                what: format!("application {id} to reach {expected}"),
                elapsed: timeout,
            })
        })
}

/// Wait until application `id` no longer exists.
pub async fn wait_for_removal(
    scheduler: &Scheduler,
    id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> SchedulerResult<()> {
    tokio::time::timeout(timeout, poll_removal(scheduler, id, poll_interval))
        .await
        .unwrap_or_else(|_| {
            Err(SchedulerError::Timeout {
                what: format!("removal of application {id}"),
                elapsed: timeout,
            })
        })
}

async fn poll_status(
    scheduler: &Scheduler,
    id: &str,
    expected: OpStatus,
    poll_interval: Duration,
) -> SchedulerResult<AppSummary> {
    let mut ticker = ticker(poll_interval);
    loop {
        ticker.tick().await;
        let summary = scheduler.inspect(id).await?;
        if summary.op_status == expected {
            return Ok(summary);
        }
    }
}

async fn poll_removal(
    scheduler: &Scheduler,
    id: &str,
    poll_interval: Duration,
) -> SchedulerResult<()> {
    let mut ticker = ticker(poll_interval);
    loop {
        ticker.tick().await;
        match scheduler.inspect(id).await {
            Err(SchedulerError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
            Ok(_) => {}
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    // `interval` panics on a zero period.
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use shoal_canary::CreateAppRequest;
    use shoal_state::{StateStore, VersionSpec};

    use crate::executor::{LocalExecutor, LocalExecutorConfig};

    fn scheduler(launch_latency: Duration) -> Scheduler {
        let executor = LocalExecutor::new(LocalExecutorConfig {
            launch_latency,
            retire_latency: Duration::ZERO,
        });
        Scheduler::new(StateStore::open_in_memory().unwrap(), Arc::new(executor))
    }

    fn request() -> CreateAppRequest {
        CreateAppRequest {
            version: VersionSpec {
                name: "demo".to_string(),
                cpu: 0.01,
                mem: 5.0,
                disk: 0.0,
                image: None,
                cmd: None,
                env: HashMap::new(),
                labels: HashMap::new(),
            },
            instances: 2,
        }
    }

    #[tokio::test]
    async fn times_out_while_busy() {
        let scheduler = scheduler(Duration::from_secs(2));
        let id = scheduler.create_app(request()).await.unwrap();

        let err = wait_for_status(
            &scheduler,
            &id,
            OpStatus::Noop,
            Duration::from_millis(50),
            Duration::from_millis(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SchedulerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn unknown_application_fails_fast() {
        let scheduler = scheduler(Duration::ZERO);
        let err = wait_for_status(
            &scheduler,
            "app_missing",
            OpStatus::Noop,
            Duration::from_secs(5),
            Duration::ZERO,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SchedulerError::NotFound(_)));
    }

    #[tokio::test]
    async fn removal_of_unknown_is_immediate() {
        let scheduler = scheduler(Duration::ZERO);
        wait_for_removal(
            &scheduler,
            "app_missing",
            Duration::from_secs(1),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
    }
}
