//! Upload lifecycle controller.
//!
//! Owns the single upload session and drives it through
//! `idle -> loading -> success | error`, with an explicit reset back to
//! idle. The session is published on a watch channel for display; the
//! payload is handed back as the output of [`UploadController::submit`].

use super::client::AnalysisBackend;
use super::error::UploadError;
use super::file::UploadFile;
use super::progress::{ProgressConfig, ProgressTicker};
use crate::models::{AnalysisPayload, UploadSession, UploadState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Timing settings for the controller.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub progress: ProgressConfig,
    /// How long the completed (100%) state stays visible before the payload
    /// is handed over.
    pub display_delay: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            progress: ProgressConfig::default(),
            display_delay: Duration::from_millis(600),
        }
    }
}

impl From<&crate::config::UploadConfig> for ControllerSettings {
    fn from(config: &crate::config::UploadConfig) -> Self {
        Self {
            progress: ProgressConfig::from(config),
            display_delay: Duration::from_millis(config.display_delay_ms),
        }
    }
}

/// The loading phase of one attempt. Holds the progress ticker and settles
/// the session exactly once; if dropped unsettled, the attempt is marked
/// as interrupted.
struct LoadingScope<'a> {
    session: &'a watch::Sender<UploadSession>,
    attempt: u64,
    ticker: ProgressTicker,
    settled: bool,
}

impl<'a> LoadingScope<'a> {
    fn enter(
        session: &'a Arc<watch::Sender<UploadSession>>,
        attempt: u64,
        progress: ProgressConfig,
    ) -> Self {
        Self {
            session,
            attempt,
            ticker: ProgressTicker::start(Arc::clone(session), attempt, progress),
            settled: false,
        }
    }

    fn succeed(mut self) {
        self.settle(|s| {
            s.progress = 100.0;
            s.state = UploadState::Success;
        });
    }

    fn fail(mut self, err: &UploadError) {
        let message = err.user_message();
        self.settle(|s| {
            s.state = UploadState::Error;
            s.error_message = Some(message);
        });
    }

    // Ticker stops before the terminal state is published.
    fn settle(&mut self, apply: impl FnOnce(&mut UploadSession)) {
        self.ticker.stop();
        self.settled = true;

        let attempt = self.attempt;
        self.session.send_if_modified(|s| {
            if s.attempt != attempt || s.state != UploadState::Loading {
                return false;
            }
            apply(s);
            true
        });
    }
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Upload attempt {} abandoned while loading", self.attempt);
            let message = UploadError::Interrupted.user_message();
            self.settle(|s| {
                s.state = UploadState::Error;
                s.error_message = Some(message);
            });
        }
    }
}

/// Drives uploads to an [`AnalysisBackend`], one at a time.
pub struct UploadController {
    backend: Arc<dyn AnalysisBackend>,
    session: Arc<watch::Sender<UploadSession>>,
    settings: ControllerSettings,
}

impl UploadController {
    pub fn new(backend: Arc<dyn AnalysisBackend>, settings: ControllerSettings) -> Self {
        let (session, _) = watch::channel(UploadSession::default());

        Self {
            backend,
            session: Arc::new(session),
            settings,
        }
    }

    /// Observe session changes.
    pub fn subscribe(&self) -> watch::Receiver<UploadSession> {
        self.session.subscribe()
    }

    /// Current session state.
    pub fn snapshot(&self) -> UploadSession {
        self.session.borrow().clone()
    }

    pub fn endpoint(&self) -> &str {
        self.backend.endpoint()
    }

    /// Submit a file and wait for the analysis payload.
    ///
    /// Ignored with [`UploadError::Busy`] while another submission is
    /// loading. A name without the `.csv` suffix fails immediately without
    /// contacting the service. On success the session shows 100% for the
    /// configured display delay before the payload is returned. If the
    /// session is reset or resubmitted during that delay, the payload is
    /// discarded and [`UploadError::Interrupted`] is returned instead.
    pub async fn submit(&self, file: UploadFile) -> Result<AnalysisPayload, UploadError> {
        let is_csv = file.has_csv_extension();
        let name = file.name().to_string();
        let mut outcome = Err(UploadError::Busy);

        self.session.send_if_modified(|s| {
            if s.state == UploadState::Loading {
                return false;
            }

            let attempt = s.attempt + 1;
            *s = if is_csv {
                outcome = Ok(attempt);
                UploadSession {
                    attempt,
                    state: UploadState::Loading,
                    file_name: Some(name.clone()),
                    progress: 0.0,
                    error_message: None,
                }
            } else {
                outcome = Err(UploadError::InvalidFile);
                UploadSession {
                    attempt,
                    state: UploadState::Error,
                    file_name: None,
                    progress: 0.0,
                    error_message: Some(UploadError::InvalidFile.user_message()),
                }
            };
            true
        });

        let attempt = match outcome {
            Ok(attempt) => attempt,
            Err(err) => {
                warn!("Submission of {} not accepted: {}", name, err);
                return Err(err);
            }
        };

        info!("Uploading {} to {} (attempt {})", name, self.endpoint(), attempt);
        let scope = LoadingScope::enter(&self.session, attempt, self.settings.progress.clone());

        match self.send(&file).await {
            Ok(payload) => {
                scope.succeed();
                info!(
                    "Analysis received: {} weeks, {} risk cases",
                    payload.metrics.len(),
                    payload.top_risks.len()
                );
                tokio::time::sleep(self.settings.display_delay).await;

                // A reset or newer submission during the delay owns the session now.
                if self.session.borrow().attempt != attempt {
                    warn!("Upload attempt {} superseded before hand-over", attempt);
                    return Err(UploadError::Interrupted);
                }
                Ok(payload)
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    async fn send(&self, file: &UploadFile) -> Result<AnalysisPayload, UploadError> {
        let contents = file.read().await.map_err(|e| {
            warn!("Failed to read {}: {}", file.name(), e);
            UploadError::Unreadable
        })?;

        self.backend
            .analyze(file.name(), contents)
            .await
            .map_err(|e| {
                warn!("Upload failed: {}", e);
                UploadError::from(e)
            })
    }

    /// Return a settled session to idle.
    ///
    /// Only acts from `success` or `error`; returns whether it did.
    pub fn reset(&self) -> bool {
        let reset = self.session.send_if_modified(|s| {
            if !s.state.is_terminal() {
                return false;
            }
            *s = UploadSession {
                attempt: s.attempt + 1,
                ..UploadSession::default()
            };
            true
        });

        if reset {
            debug!("Upload session reset");
        }
        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MlWeights;
    use crate::upload::client::BackendError;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Outcome {
        Payload,
        Transport,
        Status,
        Malformed,
    }

    struct FakeBackend {
        outcome: Outcome,
        delay: Duration,
        calls: AtomicUsize,
        observer: Mutex<Option<watch::Receiver<UploadSession>>>,
        states_at_call: Mutex<Vec<UploadState>>,
    }

    impl FakeBackend {
        fn new(outcome: Outcome, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                delay,
                calls: AtomicUsize::new(0),
                observer: Mutex::new(None),
                states_at_call: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AnalysisBackend for FakeBackend {
        fn endpoint(&self) -> &str {
            "http://fake/analyze"
        }

        fn analyze<'a>(
            &'a self,
            _file_name: &'a str,
            _contents: Vec<u8>,
        ) -> BoxFuture<'a, Result<AnalysisPayload, BackendError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(rx) = self.observer.lock().unwrap().as_ref() {
                self.states_at_call.lock().unwrap().push(rx.borrow().state);
            }

            async move {
                tokio::time::sleep(self.delay).await;
                match self.outcome {
                    Outcome::Payload => Ok(sample_payload()),
                    Outcome::Transport => Err(BackendError::Transport("refused".to_string())),
                    Outcome::Status => Err(BackendError::Status(500, "boom".to_string())),
                    Outcome::Malformed => Err(BackendError::Malformed("no metrics".to_string())),
                }
            }
            .boxed()
        }
    }

    fn sample_payload() -> AnalysisPayload {
        AnalysisPayload {
            metrics: vec![],
            ml_weights: MlWeights::default(),
            rag_explanations: vec![],
            top_risks: vec![],
            executive_summary: "All good.".to_string(),
            advanced_analysis: None,
        }
    }

    fn fast_settings() -> ControllerSettings {
        ControllerSettings {
            progress: ProgressConfig {
                tick: Duration::from_millis(1),
                max_increment: 12.0,
                ceiling: 95.0,
            },
            display_delay: Duration::from_millis(10),
        }
    }

    fn csv() -> UploadFile {
        UploadFile::from_bytes("decisions.csv", b"date,model_decision\n".to_vec())
    }

    /// Collect every published session until one settles.
    fn record(mut rx: watch::Receiver<UploadSession>) -> tokio::task::JoinHandle<Vec<UploadSession>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                let done = snapshot.state.is_terminal();
                seen.push(snapshot);
                if done {
                    break;
                }
            }
            seen
        })
    }

    #[tokio::test]
    async fn test_non_csv_is_rejected_without_network_call() {
        let backend = FakeBackend::new(Outcome::Payload, Duration::ZERO);
        let controller = UploadController::new(backend.clone(), fast_settings());

        for name in ["report.xlsx", "data.CSV", "notes.csv.bak"] {
            let err = controller
                .submit(UploadFile::from_bytes(name, vec![]))
                .await
                .unwrap_err();
            assert_eq!(err, UploadError::InvalidFile);

            let session = controller.snapshot();
            assert_eq!(session.state, UploadState::Error);
            assert_eq!(session.error_message.as_deref(), Some("Please upload a CSV file"));
            assert_eq!(session.progress, 0.0);
        }

        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_reaches_100_before_payload_is_returned() {
        let backend = FakeBackend::new(Outcome::Payload, Duration::from_millis(30));
        let controller = UploadController::new(backend.clone(), fast_settings());
        let recorder = record(controller.subscribe());

        let payload = controller.submit(csv()).await.unwrap();
        assert_eq!(payload.executive_summary, "All good.");
        assert_eq!(backend.calls(), 1);

        let session = controller.snapshot();
        assert_eq!(session.state, UploadState::Success);
        assert_eq!(session.progress, 100.0);
        assert_eq!(session.file_name.as_deref(), Some("decisions.csv"));

        let seen = recorder.await.unwrap();
        assert!(seen.iter().any(|s| s.state == UploadState::Loading));
        let mut last = 0.0;
        for snapshot in &seen {
            assert!(snapshot.progress >= last, "progress went backwards");
            if snapshot.state == UploadState::Loading {
                assert!(snapshot.progress <= 95.0);
            }
            last = snapshot.progress;
        }
        assert_eq!(seen.last().map(|s| s.state), Some(UploadState::Success));
    }

    #[tokio::test]
    async fn test_instant_response_still_passes_through_loading() {
        let backend = FakeBackend::new(Outcome::Payload, Duration::ZERO);
        let controller = UploadController::new(backend.clone(), fast_settings());
        *backend.observer.lock().unwrap() = Some(controller.subscribe());

        tokio_test::assert_ok!(controller.submit(csv()).await);
        assert_eq!(*backend.states_at_call.lock().unwrap(), vec![UploadState::Loading]);
    }

    #[tokio::test]
    async fn test_network_failures_map_to_connectivity_error() {
        for outcome in [Outcome::Transport, Outcome::Status] {
            let backend = FakeBackend::new(outcome, Duration::from_millis(15));
            let controller = UploadController::new(backend.clone(), fast_settings());

            let err = controller.submit(csv()).await.unwrap_err();
            assert_eq!(err, UploadError::Connectivity);

            let session = controller.snapshot();
            assert_eq!(session.state, UploadState::Error);
            assert_eq!(
                session.error_message.as_deref(),
                Some("Failed to connect to backend. Is the server running?")
            );
            assert!(session.progress <= 95.0);

            // Ticker is stopped: progress stays frozen.
            let frozen = session.progress;
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(controller.snapshot().progress, frozen);
        }
    }

    #[tokio::test]
    async fn test_malformed_response_has_distinct_error() {
        let backend = FakeBackend::new(Outcome::Malformed, Duration::ZERO);
        let controller = UploadController::new(backend, fast_settings());

        let err = controller.submit(csv()).await.unwrap_err();
        assert_eq!(err, UploadError::MalformedResponse);
        assert_eq!(controller.snapshot().state, UploadState::Error);
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_without_network_call() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(Outcome::Payload, Duration::ZERO);
        let controller = UploadController::new(backend.clone(), fast_settings());

        let err = controller
            .submit(UploadFile::from_path(dir.path().join("gone.csv")))
            .await
            .unwrap_err();

        assert_eq!(err, UploadError::Unreadable);
        assert_eq!(backend.calls(), 0);
        assert_eq!(controller.snapshot().state, UploadState::Error);
    }

    #[tokio::test]
    async fn test_submission_while_loading_is_ignored() {
        let backend = FakeBackend::new(Outcome::Payload, Duration::from_millis(60));
        let controller = UploadController::new(backend.clone(), fast_settings());

        let (first, second, reset_refused) = tokio::join!(controller.submit(csv()), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let second = controller
                .submit(UploadFile::from_bytes("other.csv", vec![]))
                .await;
            (second, controller.reset())
        }, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            controller.reset()
        });

        tokio_test::assert_ok!(first);
        assert_eq!(second.0, Err(UploadError::Busy));
        assert!(!second.1);
        assert!(!reset_refused);
        assert_eq!(backend.calls(), 1);
        assert_eq!(
            controller.snapshot().file_name.as_deref(),
            Some("decisions.csv")
        );
    }

    #[tokio::test]
    async fn test_reset_after_error_returns_to_idle() {
        let backend = FakeBackend::new(Outcome::Transport, Duration::from_millis(10));
        let controller = UploadController::new(backend, fast_settings());
        let _ = controller.submit(csv()).await;

        assert!(controller.reset());
        let session = controller.snapshot();
        assert_eq!(session.state, UploadState::Idle);
        assert_eq!(session.progress, 0.0);
        assert!(session.file_name.is_none());
        assert!(session.error_message.is_none());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.snapshot().progress, 0.0);
        assert_eq!(controller.snapshot().state, UploadState::Idle);
    }

    #[tokio::test]
    async fn test_reset_after_success_and_resubmit() {
        let backend = FakeBackend::new(Outcome::Payload, Duration::ZERO);
        let controller = UploadController::new(backend.clone(), fast_settings());

        tokio_test::assert_ok!(controller.submit(csv()).await);
        assert!(controller.reset());
        let session = controller.snapshot();
        assert_eq!(session.state, UploadState::Idle);
        assert_eq!(session.progress, 0.0);
        assert!(session.file_name.is_none());
        assert!(!controller.reset());

        tokio_test::assert_ok!(controller.submit(csv()).await);
        assert_eq!(backend.calls(), 2);
        assert_eq!(controller.snapshot().state, UploadState::Success);
    }

    #[tokio::test]
    async fn test_reset_during_display_delay_discards_payload() {
        let backend = FakeBackend::new(Outcome::Payload, Duration::ZERO);
        let mut settings = fast_settings();
        settings.display_delay = Duration::from_millis(200);
        let controller = UploadController::new(backend.clone(), settings);

        let (first, second) = tokio::join!(controller.submit(csv()), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(controller.snapshot().state, UploadState::Success);
            assert!(controller.reset());
            assert_eq!(controller.snapshot().state, UploadState::Idle);
            controller
                .submit(UploadFile::from_bytes("b.csv", vec![]))
                .await
        });

        assert_eq!(first, Err(UploadError::Interrupted));
        tokio_test::assert_ok!(second);
        assert_eq!(backend.calls(), 2);

        let session = controller.snapshot();
        assert_eq!(session.state, UploadState::Success);
        assert_eq!(session.file_name.as_deref(), Some("b.csv"));
    }

    #[tokio::test]
    async fn test_resubmit_during_display_delay_supersedes_first() {
        let backend = FakeBackend::new(Outcome::Payload, Duration::ZERO);
        let mut settings = fast_settings();
        settings.display_delay = Duration::from_millis(100);
        let controller = UploadController::new(backend.clone(), settings);

        let (first, second) = tokio::join!(controller.submit(csv()), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            controller
                .submit(UploadFile::from_bytes("b.csv", vec![]))
                .await
        });

        assert_eq!(first, Err(UploadError::Interrupted));
        tokio_test::assert_ok!(second);
    }

    #[tokio::test]
    async fn test_dropped_submission_is_marked_interrupted() {
        let backend = FakeBackend::new(Outcome::Payload, Duration::from_secs(5));
        let controller = UploadController::new(backend, fast_settings());

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), controller.submit(csv())).await;
        assert!(timed_out.is_err());

        let session = controller.snapshot();
        assert_eq!(session.state, UploadState::Error);
        assert_eq!(session.error_message.as_deref(), Some("Upload was interrupted"));

        let frozen = session.progress;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.snapshot().progress, frozen);
        assert!(controller.reset());
    }
}
