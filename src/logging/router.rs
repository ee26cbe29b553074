//! Fan-out of log records to registered sinks.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::{ConsoleSink, Level, LogRecord, LogSink, SinkError};

/// Source name on records the router emits about its own sinks.
const ROUTER_SOURCE: &str = "shell_fnd::router";

type SinkSlot = Arc<Mutex<Box<dyn LogSink>>>;

thread_local! {
    /// Routers currently delivering on this thread, by address.
    static DELIVERING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Delivers records to every registered sink, best-effort.
///
/// Sinks are visited in registration order. Each sink sits behind its own
/// mutex, so concurrent callers serialize per sink while unrelated sinks stay
/// independent. A sink that errors or panics is reported to the fallback sink
/// and skipped; the caller never sees the failure.
///
/// ## Example
///
/// ```
/// use shell_fnd::logging::{Level, LogRouter, UiBuffer, UiSink};
///
/// let router = LogRouter::new();
/// let buffer = UiBuffer::new();
/// router.add_sink(UiSink::new(buffer.clone(), Level::Warning));
///
/// router.info("gui", "not shown");
/// router.error("gui", "shown");
/// assert_eq!(buffer.len(), 1);
/// ```
pub struct LogRouter {
    sinks: RwLock<Vec<SinkSlot>>,
    fallback: Mutex<Box<dyn LogSink>>,
    closed: AtomicBool,
}

impl LogRouter {
    /// A router with no sinks and a stderr fallback.
    pub fn new() -> Self {
        Self::with_fallback(ConsoleSink::default())
    }

    /// A router reporting sink failures to `fallback` instead of stderr.
    pub fn with_fallback(fallback: impl LogSink + 'static) -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            fallback: Mutex::new(Box::new(fallback)),
            closed: AtomicBool::new(false),
        }
    }

    /// Registers a sink. Sinks cannot be removed.
    pub fn add_sink(&self, sink: impl LogSink + 'static) {
        let slot: SinkSlot = Arc::new(Mutex::new(Box::new(sink)));
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(slot);
    }

    pub fn sink_count(&self) -> usize {
        self.slots().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn log(&self, level: Level, source: &str, message: impl Into<String>) {
        if self.is_closed() {
            return;
        }
        self.route(&LogRecord::new(level, source, message));
    }

    pub fn debug(&self, source: &str, message: impl Into<String>) {
        self.log(Level::Debug, source, message);
    }

    pub fn info(&self, source: &str, message: impl Into<String>) {
        self.log(Level::Info, source, message);
    }

    pub fn warning(&self, source: &str, message: impl Into<String>) {
        self.log(Level::Warning, source, message);
    }

    pub fn error(&self, source: &str, message: impl Into<String>) {
        self.log(Level::Error, source, message);
    }

    /// Delivers an already built record to every sink accepting its level.
    ///
    /// Records a sink emits into this same router while being delivered to
    /// (on the same thread) are dropped instead of re-entering it. Forwarding
    /// into a different router is fine.
    pub fn route(&self, record: &LogRecord) {
        if self.is_closed() {
            return;
        }
        let Some(_guard) = DeliveryGuard::enter(self) else {
            return;
        };

        for slot in self.slots() {
            let outcome = {
                let mut sink = slot.lock().unwrap_or_else(PoisonError::into_inner);
                if !sink.accepts(record.level()) {
                    continue;
                }
                isolate(|| sink.emit(record)).map_err(|err| (sink.name().to_string(), err))
            };
            if let Err((name, err)) = outcome {
                self.report_failure(&name, "deliver record", &err);
            }
        }
    }

    /// Sends `record` straight to the fallback sink, bypassing registered sinks.
    pub fn fallback(&self, record: &LogRecord) {
        let mut fallback = self.fallback.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = isolate(|| fallback.emit(record)) {
            tracing::warn!(error = %err, "fallback log sink failed");
        }
    }

    /// Returns a logger that stamps every record with `source`.
    pub fn scoped(self: &Arc<Self>, source: impl Into<String>) -> Logger {
        Logger {
            router: Arc::clone(self),
            source: source.into(),
        }
    }

    /// Flushes every sink, isolating failures like [`route`](Self::route).
    pub fn flush_all(&self) {
        self.visit("flush", |sink| sink.flush());
    }

    /// Flushes and closes every sink. Later records are dropped.
    pub fn close_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.visit("close", |sink| sink.close());
        let mut fallback = self.fallback.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = isolate(|| fallback.flush());
    }

    fn visit(
        &self,
        action: &str,
        mut f: impl FnMut(&mut Box<dyn LogSink>) -> Result<(), SinkError>,
    ) {
        for slot in self.slots() {
            let outcome = {
                let mut sink = slot.lock().unwrap_or_else(PoisonError::into_inner);
                isolate(|| f(&mut *sink)).map_err(|err| (sink.name().to_string(), err))
            };
            if let Err((name, err)) = outcome {
                self.report_failure(&name, action, &err);
            }
        }
    }

    fn slots(&self) -> Vec<SinkSlot> {
        self.sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn report_failure(&self, sink: &str, action: &str, err: &SinkError) {
        tracing::warn!(sink, action, error = %err, "log sink failed");
        let notice = LogRecord::new(
            Level::Warning,
            ROUTER_SOURCE,
            format!("log sink '{sink}' failed to {action}: {err}"),
        );
        self.fallback(&notice);
    }
}

impl Default for LogRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRouter")
            .field("sinks", &self.sink_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A cheap, clonable handle logging under a fixed source name.
#[derive(Debug, Clone)]
pub struct Logger {
    router: Arc<LogRouter>,
    source: String,
}

impl Logger {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn router(&self) -> &Arc<LogRouter> {
        &self.router
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.router.log(level, &self.source, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }
}

struct DeliveryGuard {
    router: usize,
}

impl DeliveryGuard {
    /// `None` when `router` is already delivering on this thread.
    fn enter(router: &LogRouter) -> Option<Self> {
        let router = router as *const LogRouter as usize;
        DELIVERING.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&router) {
                return None;
            }
            active.push(router);
            Some(DeliveryGuard { router })
        })
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERING.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|&r| r == self.router) {
                active.remove(pos);
            }
        });
    }
}

/// Runs a sink operation, turning a panic into [`SinkError::Panicked`].
fn isolate(f: impl FnOnce() -> Result<(), SinkError>) -> Result<(), SinkError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(SinkError::Panicked(panic_message(payload.as_ref()))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{UiBuffer, UiSink};
    use std::thread;

    /// Always fails with the configured behavior.
    struct BrokenSink {
        panic: bool,
    }

    impl LogSink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        fn min_level(&self) -> Level {
            Level::Debug
        }

        fn emit(&mut self, _record: &LogRecord) -> Result<(), SinkError> {
            if self.panic {
                panic!("sink exploded");
            }
            Err(SinkError::Rejected("always".into()))
        }
    }

    fn recorder(level: Level) -> (UiBuffer, UiSink) {
        let buffer = UiBuffer::new();
        let sink = UiSink::new(buffer.clone(), level).with_time_format("");
        (buffer, sink)
    }

    fn router_with_fallback() -> (LogRouter, UiBuffer) {
        let (fallback_buffer, fallback) = recorder(Level::Debug);
        (LogRouter::with_fallback(fallback), fallback_buffer)
    }

    #[test]
    fn test_min_level_filter() {
        let router = LogRouter::new();
        let (buffer, sink) = recorder(Level::Warning);
        router.add_sink(sink);

        router.log(Level::Info, "a", "m1");
        router.log(Level::Error, "a", "m2");

        assert_eq!(buffer.lines(), vec![" [ERROR]: m2".to_string()]);
    }

    #[test]
    fn test_call_order_preserved() {
        let router = LogRouter::new();
        let (buffer, sink) = recorder(Level::Debug);
        router.add_sink(sink);

        for i in 0..50 {
            router.info("a", format!("m{i}"));
        }

        let expected: Vec<String> = (0..50).map(|i| format!(" [INFO]: m{i}")).collect();
        assert_eq!(buffer.lines(), expected);
    }

    #[test]
    fn test_failing_sink_does_not_block_later_sinks() {
        let (router, fallback) = router_with_fallback();
        let (first, first_sink) = recorder(Level::Debug);
        let (last, last_sink) = recorder(Level::Debug);
        router.add_sink(first_sink);
        router.add_sink(BrokenSink { panic: false });
        router.add_sink(last_sink);

        router.error("a", "boom");

        assert_eq!(first.len(), 1);
        assert_eq!(last.len(), 1);
        let notices = fallback.lines();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("log sink 'broken' failed to deliver record"));
    }

    #[test]
    fn test_panicking_sink_is_isolated() {
        let (router, fallback) = router_with_fallback();
        let (last, last_sink) = recorder(Level::Debug);
        router.add_sink(BrokenSink { panic: true });
        router.add_sink(last_sink);

        router.info("a", "one");
        router.info("a", "two");

        assert_eq!(last.len(), 2);
        assert!(fallback.lines()[0].contains("sink exploded"));
    }

    #[test]
    fn test_close_drops_later_records() {
        let router = LogRouter::new();
        let (buffer, sink) = recorder(Level::Debug);
        router.add_sink(sink);

        router.info("a", "before");
        router.close_all();
        router.info("a", "after");

        assert!(router.is_closed());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_scoped_logger_from_threads() {
        let router = Arc::new(LogRouter::new());
        let (buffer, sink) = recorder(Level::Debug);
        router.add_sink(sink);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let logger = router.scoped(format!("worker-{t}"));
                thread::spawn(move || {
                    for i in 0..25 {
                        logger.info(format!("{t}:{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lines = buffer.lines();
        assert_eq!(lines.len(), 100);
        // per-thread order survives interleaving
        for t in 0..4 {
            let seen: Vec<&String> = lines
                .iter()
                .filter(|l| l.contains(&format!("]: {t}:")))
                .collect();
            let expected: Vec<String> = (0..25).map(|i| format!(" [INFO]: {t}:{i}")).collect();
            assert_eq!(seen, expected.iter().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_reentrant_records_are_dropped() {
        struct Echo {
            router: Arc<LogRouter>,
        }
        impl LogSink for Echo {
            fn name(&self) -> &str {
                "echo"
            }
            fn min_level(&self) -> Level {
                Level::Debug
            }
            fn emit(&mut self, _record: &LogRecord) -> Result<(), SinkError> {
                self.router.info("echo", "nested");
                Ok(())
            }
        }

        let router = Arc::new(LogRouter::new());
        let (buffer, sink) = recorder(Level::Debug);
        router.add_sink(Echo {
            router: Arc::clone(&router),
        });
        router.add_sink(sink);

        router.info("a", "outer");
        assert_eq!(buffer.lines(), vec![" [INFO]: outer".to_string()]);
    }

    #[test]
    fn test_forwarding_into_another_router() {
        struct Forward {
            to: Arc<LogRouter>,
        }
        impl LogSink for Forward {
            fn name(&self) -> &str {
                "forward"
            }
            fn min_level(&self) -> Level {
                Level::Debug
            }
            fn emit(&mut self, record: &LogRecord) -> Result<(), SinkError> {
                self.to.route(record);
                Ok(())
            }
        }

        let downstream = Arc::new(LogRouter::new());
        let (buffer, sink) = recorder(Level::Debug);
        downstream.add_sink(sink);

        let upstream = LogRouter::new();
        upstream.add_sink(Forward {
            to: Arc::clone(&downstream),
        });

        upstream.warning("a", "forwarded");
        upstream.info("a", "again");
        assert_eq!(
            buffer.lines(),
            vec![
                " [WARNING]: forwarded".to_string(),
                " [INFO]: again".to_string()
            ]
        );
    }
}
