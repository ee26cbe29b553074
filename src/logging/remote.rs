//! Best-effort alert delivery to an external channel.
//!
//! Alerts are handed to a dedicated worker thread through a bounded queue.
//! `emit` never blocks the caller; the worker runs each delivery as one
//! transport session (open, authenticate, transmit, close) with the configured
//! timeout.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::record::DEFAULT_TIME_FORMAT;
use super::{Level, LogRecord, LogSink, SinkError};

const FLUSH_POLL: Duration = Duration::from_millis(5);

/// Upper bound applied to `timeout_ms`.
pub const MAX_ALERT_TIMEOUT: Duration = Duration::from_secs(600);

fn default_min_level() -> Level {
    Level::Error
}

fn default_subject_prefix() -> String {
    "[alert]".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_queue_capacity() -> usize {
    64
}

/// Remote channel parameters, typically the `[alerts]` config table.
#[derive(Clone, Deserialize)]
pub struct RemoteSettings {
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_min_level")]
    pub min_level: Level,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Upper bound for each transport call and for `flush`.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl RemoteSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            secret: None,
            recipients: Vec::new(),
            min_level: default_min_level(),
            subject_prefix: default_subject_prefix(),
            timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }

    /// `timeout_ms`, clamped to [`MAX_ALERT_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms).min(MAX_ALERT_TIMEOUT)
    }
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("recipients", &self.recipients)
            .field("min_level", &self.min_level)
            .field("timeout_ms", &self.timeout_ms)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

/// The message a transport transmits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub subject: String,
    pub recipients: Vec<String>,
    pub level: String,
    pub source: String,
    pub message: String,
    pub timestamp: String,
    /// The full rendered log line.
    pub body: String,
}

impl Alert {
    pub fn from_record(record: &LogRecord, settings: &RemoteSettings) -> Self {
        Self {
            subject: format!(
                "{} {} in {}",
                settings.subject_prefix,
                record.level(),
                record.source()
            ),
            recipients: settings.recipients.clone(),
            level: record.level().to_string(),
            source: record.source().to_string(),
            message: record.message().to_string(),
            timestamp: record.timestamp().to_rfc3339(),
            body: record.render(DEFAULT_TIME_FORMAT),
        }
    }
}

/// Opens sessions to an alerting endpoint.
pub trait AlertTransport: Send + 'static {
    type Session: AlertSession;

    /// Connects to `settings.endpoint`. Must give up after `timeout`.
    fn open(&mut self, settings: &RemoteSettings, timeout: Duration)
        -> Result<Self::Session, SinkError>;
}

/// One open connection to the alerting endpoint.
pub trait AlertSession {
    fn authenticate(&mut self, username: Option<&str>, secret: Option<&str>)
        -> Result<(), SinkError>;

    fn transmit(&mut self, alert: &Alert) -> Result<(), SinkError>;

    fn close(self) -> Result<(), SinkError>;
}

enum Job {
    Deliver(Alert),
    Flush(SyncSender<()>),
}

/// Delivery counters shared with the worker thread.
#[derive(Debug, Default)]
pub struct RemoteStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl RemoteStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Sink forwarding records at or above `settings.min_level` to an [`AlertTransport`].
pub struct RemoteSink {
    settings: RemoteSettings,
    queue: Option<SyncSender<Job>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<RemoteStats>,
}

impl RemoteSink {
    /// Starts the delivery worker.
    pub fn spawn<T: AlertTransport>(transport: T, settings: RemoteSettings) -> Result<Self, SinkError> {
        let (queue, jobs) = mpsc::sync_channel(settings.queue_capacity.max(1));
        let stats = Arc::new(RemoteStats::default());

        let worker = thread::Builder::new()
            .name("shell-fnd-alerts".to_string())
            .spawn({
                let settings = settings.clone();
                let stats = Arc::clone(&stats);
                move || run_worker(transport, settings, jobs, stats)
            })
            .map_err(|e| SinkError::io("alert worker", e))?;

        Ok(Self {
            settings,
            queue: Some(queue),
            worker: Some(worker),
            stats,
        })
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    pub fn stats(&self) -> Arc<RemoteStats> {
        Arc::clone(&self.stats)
    }

    /// Waits until every queued alert has been attempted, up to the configured timeout.
    fn drain(&self) -> Result<(), SinkError> {
        let queue = self.queue.as_ref().ok_or(SinkError::Closed)?;
        let timeout = self.settings.timeout();
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now);
        let (ack, acked) = mpsc::sync_channel(1);

        let mut job = Job::Flush(ack);
        loop {
            match queue.try_send(job) {
                Ok(()) => break,
                Err(TrySendError::Full(returned)) => {
                    if Instant::now() >= deadline {
                        return Err(SinkError::Timeout(timeout));
                    }
                    job = returned;
                    thread::sleep(FLUSH_POLL);
                }
                Err(TrySendError::Disconnected(_)) => return Err(SinkError::Closed),
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        acked
            .recv_timeout(remaining)
            .map_err(|_| SinkError::Timeout(timeout))
    }
}

impl fmt::Debug for RemoteSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSink")
            .field("settings", &self.settings)
            .field("open", &self.queue.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl LogSink for RemoteSink {
    fn name(&self) -> &str {
        "remote"
    }

    fn min_level(&self) -> Level {
        self.settings.min_level
    }

    fn emit(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        let queue = self.queue.as_ref().ok_or(SinkError::Closed)?;
        let alert = Alert::from_record(record, &self.settings);
        queue.try_send(Job::Deliver(alert)).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::QueueFull,
            TrySendError::Disconnected(_) => SinkError::Closed,
        })
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.drain()
    }

    /// Drains the queue and stops the worker. If draining times out the worker
    /// is detached rather than joined.
    fn close(&mut self) -> Result<(), SinkError> {
        if self.queue.is_none() {
            return Ok(());
        }
        let drained = self.drain();
        self.queue = None;
        if let Some(worker) = self.worker.take() {
            if drained.is_ok() {
                let _ = worker.join();
            }
        }
        drained
    }
}

impl Drop for RemoteSink {
    fn drop(&mut self) {
        // dropping the sender lets the worker finish the queue and exit
        self.queue = None;
    }
}

fn run_worker<T: AlertTransport>(
    mut transport: T,
    settings: RemoteSettings,
    jobs: Receiver<Job>,
    stats: Arc<RemoteStats>,
) {
    for job in jobs {
        match job {
            Job::Deliver(alert) => match deliver(&mut transport, &settings, &alert) {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        endpoint = %settings.endpoint,
                        error = %err,
                        "alert delivery failed"
                    );
                }
            },
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

fn deliver<T: AlertTransport>(
    transport: &mut T,
    settings: &RemoteSettings,
    alert: &Alert,
) -> Result<(), SinkError> {
    let mut session = transport.open(settings, settings.timeout())?;
    if let Err(err) = session.authenticate(settings.username.as_deref(), settings.secret.as_deref()) {
        let _ = session.close();
        return Err(err);
    }
    let sent = session.transmit(alert);
    let closed = session.close();
    sent.and(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every session call into a shared log.
    #[derive(Clone, Default)]
    struct FakeTransport {
        calls: Arc<Mutex<Vec<String>>>,
        reject_auth: bool,
        delay: Option<Duration>,
    }

    struct FakeSession {
        transport: FakeTransport,
    }

    impl FakeTransport {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AlertTransport for FakeTransport {
        type Session = FakeSession;

        fn open(
            &mut self,
            settings: &RemoteSettings,
            timeout: Duration,
        ) -> Result<FakeSession, SinkError> {
            self.record(format!("open {} {}ms", settings.endpoint, timeout.as_millis()));
            Ok(FakeSession {
                transport: self.clone(),
            })
        }
    }

    impl AlertSession for FakeSession {
        fn authenticate(
            &mut self,
            username: Option<&str>,
            _secret: Option<&str>,
        ) -> Result<(), SinkError> {
            self.transport
                .record(format!("auth {}", username.unwrap_or("-")));
            if self.transport.reject_auth {
                return Err(SinkError::Rejected("bad credentials".into()));
            }
            Ok(())
        }

        fn transmit(&mut self, alert: &Alert) -> Result<(), SinkError> {
            if let Some(delay) = self.transport.delay {
                thread::sleep(delay);
            }
            self.transport.record(format!("send {}", alert.subject));
            Ok(())
        }

        fn close(self) -> Result<(), SinkError> {
            self.transport.record("close".to_string());
            Ok(())
        }
    }

    fn settings() -> RemoteSettings {
        let mut settings = RemoteSettings::new("alerts.example.test");
        settings.username = Some("robot".into());
        settings.secret = Some("hunter2".into());
        settings.recipients = vec!["ops@example.test".into()];
        settings.timeout_ms = 1_000;
        settings
    }

    #[test]
    fn test_session_sequence() {
        let transport = FakeTransport::default();
        let mut sink = RemoteSink::spawn(transport.clone(), settings()).unwrap();

        sink.emit(&LogRecord::new(Level::Error, "gui", "conversion failed"))
            .unwrap();
        sink.close().unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                "open alerts.example.test 1000ms".to_string(),
                "auth robot".to_string(),
                "send [alert] ERROR in gui".to_string(),
                "close".to_string(),
            ]
        );
        assert_eq!(sink.stats().delivered(), 1);
    }

    #[test]
    fn test_auth_failure_counts_and_closes() {
        let transport = FakeTransport {
            reject_auth: true,
            ..FakeTransport::default()
        };
        let mut sink = RemoteSink::spawn(transport.clone(), settings()).unwrap();

        sink.emit(&LogRecord::new(Level::Error, "gui", "x")).unwrap();
        sink.flush().unwrap();

        let stats = sink.stats();
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.delivered(), 0);
        assert_eq!(transport.calls().last().map(String::as_str), Some("close"));
    }

    #[test]
    fn test_emit_does_not_block_on_slow_endpoint() {
        let transport = FakeTransport {
            delay: Some(Duration::from_millis(200)),
            ..FakeTransport::default()
        };
        let mut config = settings();
        config.queue_capacity = 1;
        config.timeout_ms = 50;
        let mut sink = RemoteSink::spawn(transport, config).unwrap();

        let started = Instant::now();
        let results: Vec<_> = (0..5)
            .map(|i| sink.emit(&LogRecord::new(Level::Error, "gui", format!("{i}"))))
            .collect();
        assert!(started.elapsed() < Duration::from_millis(150));
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SinkError::QueueFull))));

        assert!(matches!(sink.flush(), Err(SinkError::Timeout(_))));
    }

    #[test]
    fn test_oversized_timeout_is_clamped() {
        let transport = FakeTransport::default();
        let mut config = settings();
        config.timeout_ms = u64::MAX;
        assert_eq!(config.timeout(), MAX_ALERT_TIMEOUT);

        let mut sink = RemoteSink::spawn(transport.clone(), config).unwrap();
        sink.emit(&LogRecord::new(Level::Error, "gui", "x")).unwrap();
        sink.flush().unwrap();
        assert_eq!(
            transport.calls().first().map(String::as_str),
            Some("open alerts.example.test 600000ms")
        );
    }

    #[test]
    fn test_emit_after_close() {
        let mut sink = RemoteSink::spawn(FakeTransport::default(), settings()).unwrap();
        sink.close().unwrap();
        assert!(matches!(
            sink.emit(&LogRecord::new(Level::Error, "gui", "late")),
            Err(SinkError::Closed)
        ));
    }

    #[test]
    fn test_settings_from_config_and_redaction() {
        let settings: RemoteSettings = toml::from_str(
            r#"
            endpoint = "https://hooks.example.test/alert"
            secret = "s3cret"
            min_level = "warning"
            "#,
        )
        .unwrap();
        assert_eq!(settings.min_level, Level::Warning);
        assert_eq!(settings.timeout(), Duration::from_secs(5));
        assert!(!format!("{settings:?}").contains("s3cret"));
    }
}
