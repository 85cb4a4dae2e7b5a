//! Progress and log events emitted by sync jobs
//!
//! A sync job reports through an `EventSink`. The server forwards events to
//! the connected client as JSON lines; one-shot runs just log them.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

/// One event line on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Progress { value: f64 },
    Log { level: LogLevel, message: String },
}

/// Receiver of job progress and user-facing log lines
pub trait EventSink {
    /// Overall progress in `[0, 1]`
    fn progress(&self, value: f64);

    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

fn trace_event(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!("{}", message),
        LogLevel::Info => info!("{}", message),
        LogLevel::Error => error!("{}", message),
    }
}

/// Sends events to the process log only
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn progress(&self, value: f64) {
        info!("Progress: {:.0}%", value * 100.0);
    }

    fn log(&self, level: LogLevel, message: &str) {
        trace_event(level, message);
    }
}

/// Forwards events to a channel, and to the process log
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<SyncEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<SyncEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn progress(&self, value: f64) {
        debug!("Progress: {:.3}", value);
        // A closed receiver means the client went away; the job still finishes
        let _ = self.tx.send(SyncEvent::Progress { value });
    }

    fn log(&self, level: LogLevel, message: &str) {
        trace_event(level, message);
        let _ = self.tx.send(SyncEvent::Log {
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_event_json() {
        let progress = serde_json::to_string(&SyncEvent::Progress { value: 0.5 }).unwrap();
        assert_eq!(progress, r#"{"event":"progress","value":0.5}"#);

        let log = serde_json::to_string(&SyncEvent::Log {
            level: LogLevel::Error,
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(log, r#"{"event":"log","level":"error","message":"boom"}"#);
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);

        sink.info("hello");
        sink.progress(1.0);

        assert_eq!(
            rx.try_recv().unwrap(),
            SyncEvent::Log {
                level: LogLevel::Info,
                message: "hello".into()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), SyncEvent::Progress { value: 1.0 });
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = ChannelSink::new(tx);
        sink.error("nobody listening");
    }
}
