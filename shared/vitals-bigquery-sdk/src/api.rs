//! Warehouse operations used by the loader

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::types::{DatasetRef, JobRef, JobState, LoadJobConfig, TableDefinition, TableRef};
use crate::{BigQueryError, Result};

/// The subset of the BigQuery API the warehouse loader needs.
#[async_trait]
pub trait WarehouseApi: Send + Sync {
    /// Create the dataset; an existing dataset is not an error.
    async fn ensure_dataset(&self, dataset: &DatasetRef, location: &str) -> Result<()>;

    /// Delete the table. Returns `false` if it did not exist.
    async fn delete_table(&self, table: &TableRef) -> Result<bool>;

    async fn create_table(&self, table: &TableRef, definition: &TableDefinition) -> Result<()>;

    /// Start a load job from newline-delimited JSON bytes.
    async fn start_load(
        &self,
        table: &TableRef,
        config: &LoadJobConfig,
        ndjson: Vec<u8>,
    ) -> Result<JobRef>;

    async fn job_state(&self, job: &JobRef) -> Result<JobState>;

    async fn table_row_count(&self, table: &TableRef) -> Result<u64>;
}

/// Poll `job` until it is done. A job that finishes with an error result fails.
pub async fn wait_for_job<A>(api: &A, job: &JobRef, poll_interval: Duration) -> Result<()>
where
    A: WarehouseApi + ?Sized,
{
    loop {
        match api.job_state(job).await? {
            JobState::Done(None) => return Ok(()),
            JobState::Done(Some(error)) => {
                return Err(BigQueryError::JobFailed {
                    job_id: job.job_id.clone(),
                    reason: error.reason,
                    message: error.message,
                })
            }
            state => {
                debug!(job_id = %job.job_id, ?state, "Waiting for job");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorProto;
    use std::sync::Mutex;

    /// Replays a fixed sequence of job states.
    struct ScriptedJobs {
        states: Mutex<Vec<JobState>>,
    }

    #[async_trait]
    impl WarehouseApi for ScriptedJobs {
        async fn ensure_dataset(&self, _: &DatasetRef, _: &str) -> Result<()> {
            Ok(())
        }
        async fn delete_table(&self, _: &TableRef) -> Result<bool> {
            Ok(false)
        }
        async fn create_table(&self, _: &TableRef, _: &TableDefinition) -> Result<()> {
            Ok(())
        }
        async fn start_load(&self, _: &TableRef, _: &LoadJobConfig, _: Vec<u8>) -> Result<JobRef> {
            unreachable!()
        }
        async fn job_state(&self, _: &JobRef) -> Result<JobState> {
            Ok(self.states.lock().unwrap().remove(0))
        }
        async fn table_row_count(&self, _: &TableRef) -> Result<u64> {
            Ok(0)
        }
    }

    fn job() -> JobRef {
        JobRef {
            project_id: "p".into(),
            job_id: "j1".into(),
            location: None,
        }
    }

    #[tokio::test]
    async fn test_wait_polls_until_done() {
        let api = ScriptedJobs {
            states: Mutex::new(vec![JobState::Pending, JobState::Running, JobState::Done(None)]),
        };
        tokio_test::assert_ok!(wait_for_job(&api, &job(), Duration::from_millis(1)).await);
        assert!(api.states.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wait_surfaces_error_result() {
        let api = ScriptedJobs {
            states: Mutex::new(vec![JobState::Done(Some(ErrorProto {
                reason: "invalid".into(),
                message: "schema mismatch".into(),
            }))]),
        };
        let err = tokio_test::assert_err!(wait_for_job(&api, &job(), Duration::from_millis(1)).await);
        assert!(matches!(err, BigQueryError::JobFailed { ref reason, .. } if reason == "invalid"));
    }
}
