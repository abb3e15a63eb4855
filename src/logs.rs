// src/logs.rs
//
// =============================================================================
// CNCMARKET: MEMORY LOGGER (v 0.3 )
// =============================================================================
//
// Captures `log` records into a bounded ring so the browser can show them
// in its event pane. Writing to stderr while the terminal is in raw mode
// would tear the screen.

use chrono::Local;
use log::{Level, Metadata, Record, SetLoggerError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ============================================================================
// 1. THE BUFFER (State)
// ============================================================================

#[derive(Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a line, evicting the oldest when full.
    pub fn push(&self, msg: String) {
        let mut lines = self.lock();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(msg);
    }

    /// The newest `n` lines, newest first.
    pub fn latest(&self, n: usize) -> Vec<String> {
        self.lock().iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// ============================================================================
// 2. THE LOGGER (Integration)
// ============================================================================

pub struct TuiLogger {
    buffer: LogBuffer,
    level: Level,
}

impl TuiLogger {
    /// Installs the global logger. Only one logger may exist per process.
    pub fn init(buffer: LogBuffer, level: Level) -> Result<(), SetLoggerError> {
        let logger = Box::new(TuiLogger { buffer, level });
        log::set_logger(Box::leak(logger)).map(|()| log::set_max_level(level.to_level_filter()))
    }

    /// "cncmarket::loader" -> "loader"
    fn short_target(target: &str) -> &str {
        target.rsplit("::").next().unwrap_or(target)
    }

    fn format(&self, record: &Record) -> String {
        format!(
            "[{} {} {}] {}",
            Local::now().format("%H:%M:%S"),
            record.level(),
            Self::short_target(record.target()),
            record.args()
        )
    }
}

impl log::Log for TuiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // HTTP internals are noise in a pane this small.
        metadata.level() <= self.level && !metadata.target().starts_with("hyper")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.buffer.push(self.format(record));
        }
    }

    fn flush(&self) {}
}
