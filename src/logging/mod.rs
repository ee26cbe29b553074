//! Log records, sinks and the router that fans records out to them.
//!
//! Logging here is strictly best-effort: no sink failure ever reaches the code
//! that produced the record.

mod console;
mod file;
mod layer;
mod level;
mod record;
mod remote;
mod router;
mod sink;
mod ui;
#[cfg(feature = "webhook")]
mod webhook;

pub use console::ConsoleSink;
pub use file::{DailyFileSink, DEFAULT_MAX_OPEN_FILES};
pub use layer::RouterLayer;
pub use level::Level;
pub use record::{LogRecord, DEFAULT_TIME_FORMAT};
pub use remote::{
    Alert, AlertSession, AlertTransport, RemoteSettings, RemoteSink, RemoteStats, MAX_ALERT_TIMEOUT,
};
pub use router::{LogRouter, Logger};
pub use sink::{LogSink, SinkError};
pub use ui::{UiBuffer, UiSink};
#[cfg(feature = "webhook")]
pub use webhook::{WebhookSession, WebhookTransport};

pub(crate) use router::panic_message;
