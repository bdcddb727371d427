use std::io::{self, Write};
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

/// Logs to stderr so diagnostics never interleave with files the tool
/// writes.
struct StderrLogger {
    stderr: Mutex<io::Stderr>,
}

impl StderrLogger {
    fn new() -> Self {
        StderrLogger {
            stderr: Mutex::new(io::stderr()),
        }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut stderr) = self.stderr.lock() {
                let _ = writeln!(
                    stderr,
                    "[{}] [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.args()
                );
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut stderr) = self.stderr.lock() {
            let _ = stderr.flush();
        }
    }
}

/// Initialize stderr logging at the given level.
pub fn init_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(StderrLogger::new())).map(|()| log::set_max_level(level))
}
