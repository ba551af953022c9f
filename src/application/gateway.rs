//! Rate limited request gateway with retry support
//!
//! Every call to a rate limited upstream goes through one `RequestGateway`:
//! - A single worker task runs queued calls one at a time, in submission order
//! - Consecutive calls start at least `interval` apart, however fast they finish
//! - Each call is retried up to `max_retries` times, `min_timeout` apart
//! - Exhausted calls fail with the endpoint and last error attached

use futures::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep, sleep_until};

use crate::domain::error::GatewayError;

/// Throttling and retry settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Minimum spacing between the starts of two queued calls
    pub interval: Duration,
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Minimum wait between attempts of one call
    pub min_timeout: Duration,
    /// Double the wait after every failed attempt instead of keeping it fixed
    pub exponential_backoff: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_retries: 3,
            min_timeout: Duration::from_millis(2000),
            exponential_backoff: false,
        }
    }
}

impl GatewayConfig {
    /// Delay before the attempt that follows failed attempt number `attempt` (1-based).
    fn retry_delay(&self, attempt: u32) -> Duration {
        if self.exponential_backoff {
            self.min_timeout
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        } else {
            self.min_timeout
        }
    }
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Handle to the request queue. Clones share the same worker and rate limit.
#[derive(Clone)]
pub struct RequestGateway {
    jobs: mpsc::UnboundedSender<Job>,
    config: GatewayConfig,
}

impl RequestGateway {
    /// Creates the gateway and spawns its worker on the current runtime.
    pub fn new(config: GatewayConfig) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(rx, config.interval));
        Self { jobs, config }
    }

    /// Queues `call` and waits for its result.
    ///
    /// `endpoint` only labels logs and errors. `call` may run several times, so it
    /// must be idempotent.
    ///
    /// # Example
    /// ```ignore
    /// let pools = gateway
    ///     .submit("/ranking/ether/hotpools", || async { fetch().await })
    ///     .await?;
    /// ```
    pub async fn submit<F, Fut, T, E>(
        &self,
        endpoint: impl Into<String>,
        call: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let endpoint = endpoint.into();
        let config = self.config.clone();
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            Box::pin(async move {
                let result = execute_with_retry(&config, &endpoint, call).await;
                // The submitter may have gone away; the call still ran to completion.
                let _ = tx.send(result);
            })
        });

        self.jobs.send(job).map_err(|_| GatewayError::Closed)?;
        rx.await.map_err(|_| GatewayError::Closed)?
    }
}

/// Worker loop: one job at a time, starts spaced by `interval`.
async fn run_queue(mut rx: mpsc::UnboundedReceiver<Job>, interval: Duration) {
    let mut last_start: Option<Instant> = None;

    while let Some(job) = rx.recv().await {
        if let Some(previous) = last_start {
            sleep_until(previous + interval).await;
        }
        last_start = Some(Instant::now());
        job().await;
    }

    tracing::debug!("Request queue closed");
}

async fn execute_with_retry<F, Fut, T, E>(
    config: &GatewayConfig,
    endpoint: &str,
    call: F,
) -> Result<T, GatewayError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = config.max_retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{}", crate::strings::logs::request_recovered(endpoint, attempt));
                }
                return Ok(value);
            }
            Err(error) => {
                last_error = error.to_string();
                tracing::warn!(
                    "{}",
                    crate::strings::logs::request_failed(endpoint, attempt, attempts, &last_error)
                );
                if attempt < attempts {
                    sleep(config.retry_delay(attempt)).await;
                }
            }
        }
    }

    tracing::error!("{}", crate::strings::logs::request_exhausted(endpoint, attempts));
    Err(GatewayError::Exhausted {
        endpoint: endpoint.to_string(),
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn config(interval_ms: u64, max_retries: u32, min_timeout_ms: u64) -> GatewayConfig {
        GatewayConfig {
            interval: Duration::from_millis(interval_ms),
            max_retries,
            min_timeout: Duration::from_millis(min_timeout_ms),
            exponential_backoff: false,
        }
    }

    #[test]
    fn test_retry_delay() {
        let fixed = config(2000, 3, 2000);
        assert_eq!(fixed.retry_delay(1), Duration::from_millis(2000));
        assert_eq!(fixed.retry_delay(3), Duration::from_millis(2000));

        let exponential = GatewayConfig {
            exponential_backoff: true,
            ..fixed
        };
        assert_eq!(exponential.retry_delay(1), Duration::from_millis(2000));
        assert_eq!(exponential.retry_delay(2), Duration::from_millis(4000));
        assert_eq!(exponential.retry_delay(3), Duration::from_millis(8000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_and_serialized() {
        let gateway = RequestGateway::new(config(2000, 0, 10));
        let starts = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..5u32 {
            let gateway = gateway.clone();
            let starts = starts.clone();
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            handles.push(tokio::spawn(async move {
                gateway
                    .submit(format!("/call/{i}"), move || {
                        let starts = starts.clone();
                        let in_flight = in_flight.clone();
                        let max_in_flight = max_in_flight.clone();
                        async move {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            max_in_flight.fetch_max(now, Ordering::SeqCst);
                            starts.lock().unwrap().push((i, Instant::now()));
                            sleep(Duration::from_millis(300)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, String>(i)
                        }
                    })
                    .await
            }));
            // Keep submission order deterministic.
            tokio::task::yield_now().await;
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Ok(i as u32));
        }

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 5);
        let order: Vec<u32> = starts.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        for pair in starts.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(2000));
        }
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_delays_next_start() {
        let gateway = RequestGateway::new(config(1000, 0, 10));
        let starts = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let starts = starts.clone();
            gateway
                .submit("/slow", move || {
                    let starts = starts.clone();
                    async move {
                        starts.lock().unwrap().push(Instant::now());
                        sleep(Duration::from_millis(5000)).await;
                        Ok::<_, String>(())
                    }
                })
                .await
                .unwrap();
        }

        let starts = starts.lock().unwrap();
        assert!(starts[1] - starts[0] >= Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_endpoint() {
        let gateway = RequestGateway::new(config(2000, 3, 2000));
        let attempts = Arc::new(Mutex::new(Vec::new()));

        let recorded = attempts.clone();
        let result = gateway
            .submit("/token/ether/0xdead", move || {
                let recorded = recorded.clone();
                async move {
                    let mut guard = recorded.lock().unwrap();
                    guard.push(Instant::now());
                    Err::<(), _>(format!("503 Service Unavailable #{}", guard.len()))
                }
            })
            .await;

        assert_eq!(
            result,
            Err(GatewayError::Exhausted {
                endpoint: "/token/ether/0xdead".to_string(),
                attempts: 4,
                last_error: "503 Service Unavailable #4".to_string(),
            })
        );
        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 4);
        for pair in attempts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(2000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let gateway = RequestGateway::new(config(2000, 3, 2000));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = gateway
            .submit("/pool/ether/0xpool/price", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("connection reset")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_call_does_not_block_queue() {
        let gateway = RequestGateway::new(config(500, 1, 100));
        let failing = gateway.submit("/bad", || async { Err::<(), _>("400 Bad Request") });
        assert!(failing.await.is_err());

        let ok = gateway.submit("/good", || async { Ok::<_, String>("fine") });
        assert_eq!(ok.await, Ok("fine"));
    }
}
