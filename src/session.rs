use futures::FutureExt;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::classifier::{ResultClassifier, Verdict};
use crate::config::ScanConfig;
use crate::error::{DirProbeError, Result};
use crate::governor::RateGovernor;
use crate::identity::IdentityPool;
use crate::probe::{ProbeError, ProbeOutcome, Prober};
use crate::resolver::TargetResolver;
use crate::sink::ResultSink;
use crate::source::CandidateSource;
use crate::tracker::{Completion, ScanTracker, Snapshot};

/// Terminal record for one candidate, delivered to the result sink.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub candidate: String,
    pub url: String,
    pub verdict: Verdict,
    pub attempts: u32,
    pub outcome: ProbeOutcome,
}

impl ScanResult {
    /// Failure-class results carry a transport error instead of a status.
    pub fn is_failure(&self) -> bool {
        self.outcome.is_error()
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.outcome.status, &self.outcome.error) {
            (Some(status), _) => {
                write!(f, "[{status}] {}", self.url)?;
                if let Some(length) = self.outcome.content_length {
                    write!(f, " (size: {length})")?;
                }
                if let Some(ref location) = self.outcome.redirect_location {
                    write!(f, " -> {location}")?;
                }
                Ok(())
            }
            (None, Some(error)) => write!(f, "[ERR] {} ({error})", self.url),
            (None, None) => write!(f, "[ERR] {}", self.url),
        }
    }
}

/// Lifecycle of a scan session. `Completed` is terminal; a completed
/// session cannot be resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Cancelling = 3,
    Completed = 4,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ScanState::Idle,
            1 => ScanState::Running,
            2 => ScanState::Draining,
            3 => ScanState::Cancelling,
            _ => ScanState::Completed,
        }
    }
}

/// Settable-once cancellation trigger, shared with all workers. Triggering
/// more than once is harmless.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One candidate owned by a worker until its terminal outcome.
#[derive(Debug)]
struct ScanRequest {
    candidate: String,
    url: Url,
    attempt: u32,
}

enum Pulled {
    /// A request ready to probe
    Request(ScanRequest),
    /// Candidate that could not be resolved into a request URL
    Invalid { candidate: String, message: String },
    /// A queued retry drained during cancellation; finalize without probing
    Abandoned(ScanRequest),
    /// Nothing left for this worker
    Exhausted,
}

/// Drives a wordlist through a fixed worker pool:
/// resolve → admit → probe → classify, with retries re-enqueued and
/// qualifying results pushed to the sink under backpressure.
pub struct ScanSession {
    inner: Arc<SessionInner>,
    workers: usize,
}

struct SessionInner {
    resolver: TargetResolver,
    prober: Prober,
    governor: RateGovernor,
    classifier: ResultClassifier,
    identities: IdentityPool,
    tracker: Arc<ScanTracker>,
    cancelled: Arc<AtomicBool>,
    state: AtomicU8,
    retries: Mutex<VecDeque<ScanRequest>>,
}

impl ScanSession {
    pub fn new(base: &str, config: ScanConfig) -> Result<Self> {
        config.validate()?;

        let resolver = TargetResolver::new(base)?;
        let prober = Prober::new(&config)?;
        let workers = config.worker_count();
        let governor = RateGovernor::new(workers, config.rate_limit_rps);
        let classifier = ResultClassifier::new(&config);
        let identities = IdentityPool::new(
            config.user_agents.clone().unwrap_or_default(),
            config.rotation_policy.unwrap_or_default(),
        );

        Ok(Self {
            workers,
            inner: Arc::new(SessionInner {
                resolver,
                prober,
                governor,
                classifier,
                identities,
                tracker: Arc::new(ScanTracker::new()),
                cancelled: Arc::new(AtomicBool::new(false)),
                state: AtomicU8::new(ScanState::Idle as u8),
                retries: Mutex::new(VecDeque::new()),
            }),
        })
    }

    /// Shared handle for progress observers; polling never blocks the scan.
    pub fn tracker(&self) -> Arc<ScanTracker> {
        self.inner.tracker.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.inner.cancelled.clone())
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Run the scan to completion or cancellation and return the final
    /// snapshot. Fails only on a permanently closed sink; per-candidate
    /// faults become failure-class results.
    pub async fn run<C, S>(&self, source: C, sink: S) -> Result<Snapshot>
    where
        C: CandidateSource + 'static,
        S: ResultSink + 'static,
    {
        if self
            .inner
            .state
            .compare_exchange(
                ScanState::Idle as u8,
                ScanState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(DirProbeError::Config(
                "scan session already ran; create a new session".to_string(),
            ));
        }

        if let Some(total) = source.size_hint() {
            self.inner.tracker.set_total(total);
        }
        info!("starting scan with {} workers", self.workers);

        let source: Arc<dyn CandidateSource> = Arc::new(source);
        let sink: Arc<dyn ResultSink> = Arc::new(sink);

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            handles.push(tokio::spawn(worker_loop(
                self.inner.clone(),
                source.clone(),
                sink.clone(),
                worker_id,
            )));
        }

        let mut fatal = None;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                }
                Err(join_err) => warn!("worker task failed to join: {join_err}"),
            }
        }

        self.inner
            .state
            .store(ScanState::Completed as u8, Ordering::SeqCst);

        match fatal {
            Some(err) => Err(err),
            None => {
                let snapshot = self.inner.tracker.snapshot();
                info!(
                    "scan completed: {} probed, {} reported, {} suppressed, {} failed",
                    snapshot.completed, snapshot.reported, snapshot.suppressed, snapshot.failed
                );
                Ok(snapshot)
            }
        }
    }
}

async fn worker_loop(
    inner: Arc<SessionInner>,
    source: Arc<dyn CandidateSource>,
    sink: Arc<dyn ResultSink>,
    worker_id: usize,
) -> Result<()> {
    debug!("worker {worker_id} started");
    loop {
        match inner.next_pulled(&*source) {
            Pulled::Exhausted => break,
            Pulled::Invalid { candidate, message } => {
                inner.tracker.note_finished(Completion::Failed);
                let url = format!(
                    "{}{}",
                    inner.resolver.base(),
                    candidate.trim_start_matches('/')
                );
                let outcome = ProbeOutcome::failure(ProbeError::Other(message), Duration::ZERO);
                sink.emit(ScanResult {
                    candidate,
                    url,
                    verdict: Verdict::Report,
                    attempts: 1,
                    outcome,
                })
                .await?;
            }
            Pulled::Abandoned(request) => {
                inner.finalize_abandoned(&*sink, request).await?;
            }
            Pulled::Request(request) => {
                let candidate = request.candidate.clone();
                let url = request.url.to_string();
                let attempt = request.attempt;

                // Worker boundary: a fault while processing one candidate
                // becomes a failure-class result, and the worker keeps pulling
                let processed = AssertUnwindSafe(inner.process(&*sink, request))
                    .catch_unwind()
                    .await;
                match processed {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => return Err(err),
                    Err(_) => {
                        warn!("worker {worker_id} fault while probing {candidate}");
                        inner.tracker.note_finished(Completion::Failed);
                        let outcome = ProbeOutcome::failure(
                            ProbeError::Other("internal worker fault".to_string()),
                            Duration::ZERO,
                        );
                        sink.emit(ScanResult {
                            candidate,
                            url,
                            verdict: Verdict::Report,
                            attempts: attempt,
                            outcome,
                        })
                        .await?;
                    }
                }
            }
        }
    }
    debug!("worker {worker_id} stopped");
    Ok(())
}

impl SessionInner {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn transition(&self, from: ScanState, to: ScanState) {
        let _ = self.state.compare_exchange(
            from as u8,
            to as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Hand the calling worker its next unit of work. Queued retries take
    /// priority over fresh candidates; after cancellation nothing new is
    /// pulled and pending retries are drained for finalization.
    fn next_pulled(&self, source: &dyn CandidateSource) -> Pulled {
        if self.is_cancelled() {
            self.transition(ScanState::Running, ScanState::Cancelling);
            self.transition(ScanState::Draining, ScanState::Cancelling);
            return match self.retries.lock().unwrap().pop_front() {
                Some(request) => Pulled::Abandoned(request),
                None => Pulled::Exhausted,
            };
        }

        if let Some(request) = self.retries.lock().unwrap().pop_front() {
            return Pulled::Request(request);
        }

        match source.next_candidate() {
            Some(candidate) => {
                self.tracker.note_started();
                match self.resolver.resolve(&candidate) {
                    Ok(url) => Pulled::Request(ScanRequest {
                        candidate,
                        url,
                        attempt: 1,
                    }),
                    Err(err) => Pulled::Invalid {
                        candidate,
                        message: err.to_string(),
                    },
                }
            }
            None => {
                self.transition(ScanState::Running, ScanState::Draining);
                Pulled::Exhausted
            }
        }
    }

    async fn process(&self, sink: &dyn ResultSink, request: ScanRequest) -> Result<()> {
        // Cancellation is observed before acquiring a permit; the candidate
        // was already dispatched, so it finalizes instead of probing
        if self.is_cancelled() {
            return self.finalize_abandoned(sink, request).await;
        }

        let permit = self.governor.acquire().await;
        let agent = self.identities.select();
        let outcome = self.prober.probe(&request.url, agent).await;
        let verdict = self.classifier.classify(&outcome, request.attempt);
        drop(permit);

        debug!(
            "{} -> {:?} in {}ms (attempt {})",
            request.url,
            outcome.status,
            outcome.elapsed.as_millis(),
            request.attempt
        );

        match verdict {
            Verdict::Retry => {
                if self.is_cancelled() {
                    return self.finalize_abandoned(sink, request).await;
                }
                debug!(
                    "re-enqueueing {} for attempt {}",
                    request.candidate,
                    request.attempt + 1
                );
                let retry = ScanRequest {
                    attempt: request.attempt + 1,
                    ..request
                };
                self.retries.lock().unwrap().push_back(retry);
            }
            Verdict::Suppress => {
                self.tracker.note_finished(Completion::Suppressed);
            }
            Verdict::Report => {
                let completion = if outcome.is_error() {
                    Completion::Failed
                } else {
                    Completion::Reported
                };
                self.tracker.note_finished(completion);
                sink.emit(ScanResult {
                    candidate: request.candidate,
                    url: request.url.to_string(),
                    verdict: Verdict::Report,
                    attempts: request.attempt,
                    outcome,
                })
                .await?;
            }
        }

        Ok(())
    }

    /// Terminal accounting for a dispatched candidate that will not be
    /// probed (again) because the session is cancelling.
    async fn finalize_abandoned(&self, sink: &dyn ResultSink, request: ScanRequest) -> Result<()> {
        self.tracker.note_finished(Completion::Failed);
        let outcome = ProbeOutcome::failure(
            ProbeError::Other("scan cancelled before completion".to_string()),
            Duration::ZERO,
        );
        sink.emit(ScanResult {
            candidate: request.candidate,
            url: request.url.to_string(),
            verdict: Verdict::Report,
            attempts: request.attempt,
            outcome,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::WordlistSource;
    use mockito::Server;
    use tokio::sync::mpsc;

    fn words(items: &[&str]) -> WordlistSource {
        WordlistSource::new(items.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_scan_accounts_for_every_candidate() {
        let mut server = Server::new_async().await;
        let _m1 = server
            .mock("GET", "/alpha")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;
        let _m2 = server
            .mock("GET", "/beta")
            .with_status(404)
            .create_async()
            .await;
        let _m3 = server
            .mock("GET", "/gamma")
            .with_status(403)
            .create_async()
            .await;

        let config = ScanConfig {
            concurrency: Some(2),
            timeout: Some(5),
            excluded_status_codes: Some(vec![404]),
            soft_404_threshold: None,
            ..Default::default()
        };
        let session = ScanSession::new(&server.url(), config).unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let snapshot = session
            .run(words(&["alpha", "beta", "gamma"]), tx)
            .await
            .unwrap();

        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.completed, 3);
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.reported, 2);
        assert_eq!(snapshot.suppressed, 1);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(
            snapshot.reported + snapshot.suppressed + snapshot.failed,
            snapshot.total
        );
        assert_eq!(session.state(), ScanState::Completed);

        let mut candidates = Vec::new();
        while let Ok(result) = rx.try_recv() {
            candidates.push(result.candidate);
        }
        candidates.sort();
        assert_eq!(candidates, vec!["alpha".to_string(), "gamma".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_base_fails_before_starting() {
        let result = ScanSession::new("ftp://example.com", ScanConfig::default());
        assert!(matches!(result, Err(DirProbeError::InvalidBase(_))));
    }

    #[tokio::test]
    async fn test_unresolvable_candidate_becomes_failure_result() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/admin")
            .with_status(200)
            .create_async()
            .await;

        let config = ScanConfig {
            concurrency: Some(1),
            timeout: Some(5),
            soft_404_threshold: None,
            ..Default::default()
        };
        let session = ScanSession::new(&server.url(), config).unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let snapshot = session
            .run(words(&["../escape", "admin"]), tx)
            .await
            .unwrap();

        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.reported, 1);

        let mut results = Vec::new();
        while let Ok(result) = rx.try_recv() {
            results.push(result);
        }
        assert_eq!(results.len(), 2);
        let failure = results.iter().find(|r| r.is_failure()).unwrap();
        assert_eq!(failure.candidate, "../escape");
    }

    #[tokio::test]
    async fn test_transport_failures_retry_up_to_ceiling() {
        let config = ScanConfig {
            concurrency: Some(1),
            timeout: Some(1),
            retry_ceiling: Some(2),
            ..Default::default()
        };
        // RFC 5737 TEST-NET-1: every probe fails at transport level
        let session = ScanSession::new("http://192.0.2.1:81", config).unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        let snapshot = session.run(words(&["x"]), tx).await.unwrap();

        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 1);

        let result = rx.try_recv().unwrap();
        assert!(result.is_failure());
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn test_candidate_succeeding_after_transport_failures_is_reported() {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // First two connections are dropped without a response, the third
        // gets a 200
        tokio::spawn(async move {
            for attempt in 0..3 {
                let (mut socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                if attempt == 2 {
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                        )
                        .await;
                    let _ = socket.shutdown().await;
                }
            }
        });

        let config = ScanConfig {
            concurrency: Some(1),
            timeout: Some(2),
            retry_ceiling: Some(3),
            soft_404_threshold: None,
            ..Default::default()
        };
        let session = ScanSession::new(&format!("http://{addr}"), config).unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        let snapshot = session.run(words(&["flaky"]), tx).await.unwrap();

        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.reported, 1);
        assert_eq!(snapshot.failed, 0);

        let result = rx.try_recv().unwrap();
        assert!(!result.is_failure());
        assert_eq!(result.outcome.status, Some(200));
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_dispatches() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .expect_at_least(1)
            .create_async()
            .await;

        let candidates: Vec<String> = (0..200).map(|i| format!("path-{i}")).collect();
        let config = ScanConfig {
            concurrency: Some(2),
            timeout: Some(5),
            rate_limit_rps: Some(20.0),
            soft_404_threshold: None,
            ..Default::default()
        };
        let session = ScanSession::new(&server.url(), config).unwrap();
        let cancel = session.cancel_handle();
        let (tx, mut rx) = mpsc::channel(16);

        let consumer = tokio::spawn(async move {
            let mut received = 0usize;
            while rx.recv().await.is_some() {
                received += 1;
            }
            received
        });

        let runner = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
            cancel.cancel(); // idempotent
        };

        let (run_result, _) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(10), session.run(words_from(candidates), tx)),
            runner
        );
        let snapshot = run_result.expect("scan hung after cancellation").unwrap();

        assert!(snapshot.completed < 200);
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(session.state(), ScanState::Completed);

        let received = consumer.await.unwrap();
        assert!(received <= snapshot.completed);
    }

    fn words_from(candidates: Vec<String>) -> WordlistSource {
        WordlistSource::new(candidates)
    }

    #[tokio::test]
    async fn test_completed_session_cannot_be_rerun() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/a")
            .with_status(200)
            .create_async()
            .await;

        let config = ScanConfig {
            concurrency: Some(1),
            timeout: Some(5),
            soft_404_threshold: None,
            ..Default::default()
        };
        let session = ScanSession::new(&server.url(), config).unwrap();

        let (tx, _rx) = mpsc::channel(4);
        session.run(words(&["a"]), tx).await.unwrap();

        let (tx, _rx) = mpsc::channel(4);
        let rerun = session.run(words(&["a"]), tx).await;
        assert!(matches!(rerun, Err(DirProbeError::Config(_))));
    }

    #[tokio::test]
    async fn test_backpressure_does_not_drop_results() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let candidates: Vec<String> = (0..20).map(|i| format!("p{i}")).collect();
        let config = ScanConfig {
            concurrency: Some(4),
            timeout: Some(5),
            soft_404_threshold: None,
            ..Default::default()
        };
        let session = ScanSession::new(&server.url(), config).unwrap();
        // Capacity 1 forces producers to wait on the consumer
        let (tx, mut rx) = mpsc::channel(1);

        let consumer = tokio::spawn(async move {
            let mut received = 0usize;
            while rx.recv().await.is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
                received += 1;
            }
            received
        });

        let snapshot = session.run(words_from(candidates), tx).await.unwrap();
        let received = consumer.await.unwrap();

        assert_eq!(snapshot.reported, 20);
        assert_eq!(received, 20);
    }

    #[tokio::test]
    async fn test_closed_sink_is_fatal() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let config = ScanConfig {
            concurrency: Some(1),
            timeout: Some(5),
            soft_404_threshold: None,
            ..Default::default()
        };
        let session = ScanSession::new(&server.url(), config).unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = session.run(words(&["a", "b"]), tx).await;
        assert!(matches!(result, Err(DirProbeError::SinkClosed)));
    }
}
