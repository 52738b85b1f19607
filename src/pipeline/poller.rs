use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::providers::{GenerationJob, VideoGenerator};
use crate::Result;

/// Query `job` every `interval` until it reaches a terminal status.
///
/// `on_update` sees every fetched job along with the check number. There is no
/// overall deadline; a query error ends the loop.
pub async fn poll_until_terminal<F>(
    generator: &dyn VideoGenerator,
    job: GenerationJob,
    interval: Duration,
    mut on_update: F,
) -> Result<GenerationJob>
where
    F: FnMut(&GenerationJob, u32),
{
    let mut job = job;
    let mut check_count = 0;

    while !job.is_terminal() {
        sleep(interval).await;
        check_count += 1;

        job = generator.job_status(&job.id).await?;
        debug!("Job {} is {} (check #{})", job.id, job.status, check_count);
        on_update(&job, check_count);
    }

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{JobStatus, MockVideoGenerator};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TICK: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_polls_until_succeeded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut generator = MockVideoGenerator::new();
        generator.expect_job_status().returning(move |id| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            Ok(match call {
                0 => GenerationJob {
                    status: JobStatus::Processing,
                    ..GenerationJob::starting(id)
                },
                1 => GenerationJob {
                    status: JobStatus::from_provider("canceled"),
                    ..GenerationJob::starting(id)
                },
                _ => GenerationJob::succeeded(id, "https://cdn.example.com/out.mp4"),
            })
        });

        let mut seen = Vec::new();
        let job = poll_until_terminal(&generator, GenerationJob::starting("p1"), TICK, |job, n| {
            seen.push((job.status, n))
        })
        .await
        .unwrap();

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.output_url.as_deref(), Some("https://cdn.example.com/out.mp4"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            seen,
            vec![
                (JobStatus::Processing, 1),
                (JobStatus::Processing, 2),
                (JobStatus::Succeeded, 3)
            ]
        );
    }

    #[tokio::test]
    async fn test_terminal_job_is_not_queried() {
        let generator = MockVideoGenerator::new();
        let job = GenerationJob::failed("p2", "boom");

        let result = poll_until_terminal(&generator, job.clone(), TICK, |_, _| {}).await;
        tokio_test::assert_ok!(&result);
        assert_eq!(result.unwrap(), job);
    }

    #[tokio::test]
    async fn test_query_error_stops_polling() {
        let mut generator = MockVideoGenerator::new();
        generator
            .expect_job_status()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("Replicate API error (404 Not Found): not found")));

        let err = poll_until_terminal(&generator, GenerationJob::starting("p3"), TICK, |_, _| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
