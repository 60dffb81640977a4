//! Labelled logging handle threaded through every component.
//!
//! Components never reach for a global logger name; they receive a
//! [`LogSink`] at construction and log through it. Output goes to the `log`
//! facade under the `packetpusher` target, so whatever logger the binary (or a
//! test) installs decides formatting and filtering.
use std::fmt;
use std::sync::Arc;

use log::Level;

pub const LOG_TARGET: &str = "packetpusher";

#[derive(Clone)]
pub struct LogSink {
    label: Arc<str>,
}

impl LogSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Arc::from(label.into()),
        }
    }

    /// A sink whose label is nested under this one, e.g. `worker-2/io`.
    pub fn child(&self, name: &str) -> Self {
        Self::new(format!("{}/{}", self.label, name))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        log::log!(target: LOG_TARGET, level, "[{}] {}", self.label, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogSink").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_label() {
        let sink = LogSink::new("worker-2");
        assert_eq!(sink.child("io").label(), "worker-2/io");
        assert_eq!(sink.label(), "worker-2");
    }
}
