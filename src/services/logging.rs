//! Job log sinks and tracing initialisation.
//!
//! Jobs report through [ProgressLog] rather than calling [tracing] directly so the
//! same job can run as a Stash plugin (where Stash parses the plugin log protocol
//! from stderr) or as a standalone command.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogMode;

/// Write-only side channel for user-facing job output.
pub trait ProgressLog: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str);

    /// Report completion as a fraction in `0.0..=1.0`.
    fn progress(&self, fraction: f64);
}

/// Forwards job output to [tracing].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ProgressLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn progress(&self, fraction: f64) {
        tracing::info!(progress = fraction, "Progress");
    }
}

/// Writes the Stash plugin log protocol: `\x01<level>\x02<message>` per line.
pub struct PluginLog<W: Write + Send> {
    out: Mutex<W>,
}

impl PluginLog<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> PluginLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write_level(&self, level: char, message: &str) {
        let mut out = self.out.lock();
        for line in message.split('\n') {
            if let Err(e) = writeln!(out, "\x01{}\x02{}", level, line) {
                tracing::warn!(error = %e, "Failed to write plugin log line");
                return;
            }
        }
        let _ = out.flush();
    }
}

impl<W: Write + Send> ProgressLog for PluginLog<W> {
    fn info(&self, message: &str) {
        self.write_level('i', message);
    }

    fn error(&self, message: &str) {
        self.write_level('e', message);
    }

    fn progress(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.write_level('p', &fraction.to_string());
    }
}

/// Build the sink selected by configuration.
pub fn create_progress_log(mode: LogMode) -> Arc<dyn ProgressLog> {
    match mode {
        LogMode::Plugin => Arc::new(PluginLog::stderr()),
        LogMode::Tracing => Arc::new(TracingLog),
    }
}

/// Install the global tracing subscriber. Output goes to stderr so stdout stays clean.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tag_thumbnailer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[cfg(test)]
pub mod testing {
    //! Recording sink for asserting on job output.

    use parking_lot::Mutex;

    use super::ProgressLog;

    #[derive(Debug, Clone, PartialEq)]
    pub enum LogEntry {
        Info(String),
        Error(String),
        Progress(f64),
    }

    #[derive(Debug, Default)]
    pub struct RecordingLog {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl RecordingLog {
        pub fn entries(&self) -> Vec<LogEntry> {
            self.entries.lock().clone()
        }

        pub fn infos(&self) -> Vec<String> {
            self.entries()
                .into_iter()
                .filter_map(|e| match e {
                    LogEntry::Info(m) => Some(m),
                    _ => None,
                })
                .collect()
        }

        pub fn errors(&self) -> Vec<String> {
            self.entries()
                .into_iter()
                .filter_map(|e| match e {
                    LogEntry::Error(m) => Some(m),
                    _ => None,
                })
                .collect()
        }

        pub fn progress(&self) -> Vec<f64> {
            self.entries()
                .into_iter()
                .filter_map(|e| match e {
                    LogEntry::Progress(p) => Some(p),
                    _ => None,
                })
                .collect()
        }
    }

    impl ProgressLog for RecordingLog {
        fn info(&self, message: &str) {
            self.entries.lock().push(LogEntry::Info(message.to_string()));
        }

        fn error(&self, message: &str) {
            self.entries.lock().push(LogEntry::Error(message.to_string()));
        }

        fn progress(&self, fraction: f64) {
            self.entries.lock().push(LogEntry::Progress(fraction));
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn written(log: PluginLog<Vec<u8>>) -> String {
        String::from_utf8(log.into_inner()).unwrap()
    }

    #[test]
    fn test_plugin_log_levels() {
        let log = PluginLog::new(Vec::new());
        log.info("Starting script...");
        log.error("GraphQL Error: boom");
        assert_eq!(
            written(log),
            "\x01i\x02Starting script...\n\x01e\x02GraphQL Error: boom\n"
        );
    }

    #[test]
    fn test_plugin_log_splits_multiline_messages() {
        let log = PluginLog::new(Vec::new());
        log.info("first\nsecond");
        assert_eq!(written(log), "\x01i\x02first\n\x01i\x02second\n");
    }

    #[test]
    fn test_plugin_log_progress_is_clamped() {
        let log = PluginLog::new(Vec::new());
        log.progress(0.25);
        log.progress(1.5);
        log.progress(-0.1);
        assert_eq!(written(log), "\x01p\x020.25\n\x01p\x021\n\x01p\x020\n");
    }
}
