//! Operator-visible message log.
//!
//! Messages that the operator is meant to read (mode banners, progress,
//! summary lines) go through a [`Logger`] that owns its sink. Each component
//! receives the logger it writes to; nothing here is global.
//!
//! Diagnostics meant for developers use `tracing` instead.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

/// Items between coarse progress messages on streams of unknown length.
pub const PROGRESS_INTERVAL: usize = 1_000_000;

/// Destination of operator messages.
pub trait LogSink {
    /// Write one message verbatim. Messages carry their own line endings.
    fn write_message(&mut self, message: &str) -> io::Result<()>;
}

/// Writes to stdout, flushing after every message so progress redraws.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write_message(&mut self, message: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(message.as_bytes())?;
        out.flush()
    }
}

/// Appends to a file.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| Error::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn write_message(&mut self, message: &str) -> io::Result<()> {
        self.writer.write_all(message.as_bytes())?;
        self.writer.flush()
    }
}

/// Keeps messages in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Rc<RefCell<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages written so far, in order.
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    /// All messages concatenated.
    pub fn contents(&self) -> String {
        self.messages.borrow().concat()
    }
}

impl LogSink for MemorySink {
    fn write_message(&mut self, message: &str) -> io::Result<()> {
        self.messages.borrow_mut().push(message.to_string());
        Ok(())
    }
}

/// Formats operator messages and hands them to a sink.
pub struct Logger {
    sink: Box<dyn LogSink>,
    interval: usize,
}

impl Logger {
    pub fn new(sink: Box<dyn LogSink>) -> Self {
        Self {
            sink,
            interval: PROGRESS_INTERVAL,
        }
    }

    /// Use `interval` items between [`Logger::tick`] messages.
    pub fn with_interval(mut self, interval: usize) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Logger writing to stdout.
    pub fn console() -> Self {
        Self::new(Box::new(ConsoleSink))
    }

    /// Logger writing to a newly created file.
    pub fn file(path: &Path) -> Result<Self> {
        Ok(Self::new(Box::new(FileSink::create(path)?)))
    }

    /// Logger writing to memory, plus a handle to read the messages back.
    pub fn memory() -> (Self, MemorySink) {
        let sink = MemorySink::new();
        (Self::new(Box::new(sink.clone())), sink)
    }

    /// Write a message. A failing sink is reported through `tracing` and
    /// otherwise ignored.
    pub fn message(&mut self, message: impl AsRef<str>) {
        if let Err(err) = self.sink.write_message(message.as_ref()) {
            tracing::warn!(%err, "log sink write failed");
        }
    }

    /// Write a message followed by a newline.
    pub fn line(&mut self, message: impl AsRef<str>) {
        self.message(format!("{}\n", message.as_ref()));
    }

    /// Report progress of `current` out of `total`, redrawn in place.
    ///
    /// Emits once per percent (every item when `total < 100`).
    pub fn progress(&mut self, label: &str, current: usize, total: usize) {
        if total == 0 {
            return;
        }
        let checkpoint = if total < 100 { 1 } else { total / 100 };
        if current % checkpoint == 0 {
            self.message(format!("\r{}... ({}%)", label, current * 100 / total));
        }
    }

    /// Report a running count when the total is unknown.
    ///
    /// Emits every `interval` items.
    pub fn tick(&mut self, label: &str, count: usize) {
        if count > 0 && count % self.interval == 0 {
            self.message(format!("\r{}... ({})", label, count));
        }
    }

    /// Finish a progress line.
    pub fn done(&mut self, label: &str) {
        self.message(format!("\r{}... Done   \n", label));
    }
}
