use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::cascade::StrategyId;

// Log targets
pub const CASCADE: &str = "cascade";
pub const SCANNER: &str = "scanner";
pub const ANCHORS: &str = "anchors";
pub const EXPAND: &str = "expand";
pub const LAYOUT: &str = "layout";

const DEBUG_TARGETS: &[&str] = &[CASCADE, SCANNER, ANCHORS, EXPAND, LAYOUT];

pub const LOG_FILE_NAME: &str = "spanlight-debug.log";

/// One cascade step as reported by its `CASCADE` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: StrategyId,
    pub matched: bool,
    pub skipped: bool,
    pub rects: usize,
    pub confidence: f64,
}

/// Shared, append-only record of strategy attempts.
#[derive(Debug, Clone, Default)]
pub struct AttemptLog {
    attempts: Arc<Mutex<Vec<StrategyAttempt>>>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StrategyAttempt>> {
        self.attempts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, attempt: StrategyAttempt) {
        self.lock().push(attempt);
    }

    pub fn snapshot(&self) -> Vec<StrategyAttempt> {
        self.lock().clone()
    }

    /// Return the recorded attempts and start over.
    pub fn take(&self) -> Vec<StrategyAttempt> {
        std::mem::take(&mut *self.lock())
    }
}

/// Layer turning cascade events into [`StrategyAttempt`]s.
pub struct AttemptRecorder {
    log: AttemptLog,
}

impl AttemptRecorder {
    pub fn new(log: AttemptLog) -> Self {
        Self { log }
    }
}

impl<S> Layer<S> for AttemptRecorder
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        if event.metadata().target() != CASCADE {
            return;
        }

        let mut visitor = AttemptVisitor::default();
        event.record(&mut visitor);
        if let Some(attempt) = visitor.finish() {
            self.log.record(attempt);
        }
    }
}

#[derive(Default)]
struct AttemptVisitor {
    strategy: Option<StrategyId>,
    matched: bool,
    skipped: bool,
    rects: usize,
    confidence: f64,
}

impl AttemptVisitor {
    fn finish(self) -> Option<StrategyAttempt> {
        Some(StrategyAttempt {
            strategy: self.strategy?,
            matched: self.matched,
            skipped: self.skipped,
            rects: self.rects,
            confidence: self.confidence,
        })
    }
}

impl Visit for AttemptVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "strategy" {
            self.strategy = value.parse().ok();
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "matched" => self.matched = value,
            "skipped" => self.skipped = value,
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "rects" {
            self.rects = value as usize;
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "rects" {
            self.rects = value.max(0) as usize;
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if field.name() == "confidence" {
            self.confidence = value;
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "strategy" {
            let value = format!("{:?}", value);
            self.record_str(field, value.trim_matches('"'));
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        let directives = DEBUG_TARGETS
            .iter()
            .map(|t| format!("{}=debug", t))
            .collect::<Vec<_>>()
            .join(",");
        return EnvFilter::new(format!("info,{}", directives));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn recorder_layer<S>(attempts: Option<AttemptLog>) -> Option<impl Layer<S>>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    attempts.map(|log| {
        AttemptRecorder::new(log).with_filter(EnvFilter::new(format!("{}=debug", CASCADE)))
    })
}

/// Log to stderr through a non-blocking writer. `RUST_LOG` applies unless `verbose` is set,
/// which turns on debug output for every crate target. When `attempts` is given, cascade
/// steps are also recorded there.
///
/// Keep the returned guard alive for as long as logs should be flushed.
pub fn init_logging(verbose: bool, attempts: Option<AttemptLog>) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(writer)
                .with_filter(env_filter(verbose)),
        )
        .with(recorder_layer(attempts))
        .try_init();

    guard
}

/// Like [`init_logging`], but debug output for every crate target goes to
/// `<log_dir>/spanlight-debug.log` while stderr keeps the regular filter.
pub fn init_logging_with_dir(
    verbose: bool,
    log_dir: &Path,
    attempts: Option<AttemptLog>,
) -> std::io::Result<(WorkerGuard, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::NEVER, log_dir, LOG_FILE_NAME);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(env_filter(true));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(stderr_writer)
        .with_filter(env_filter(verbose));

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(recorder_layer(attempts))
        .try_init();

    Ok((file_guard, stderr_guard))
}
