use simplelog::{ConfigBuilder, LevelFilter, SimpleLogger, TermLogger, TerminalMode};
use std::cell::Cell;

pub fn start_logger(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_location_level(LevelFilter::Error)
        .build();
    if TermLogger::init(level, config.clone(), TerminalMode::Mixed).is_err() {
        // Either no terminal or a logger is already installed.
        let _ = SimpleLogger::init(level, config);
    }
}

/// Indentation-aware diagnostic sink. Messages at or below the verbosity threshold are
/// forwarded to `log::debug!` with the current indentation prepended.
#[derive(Debug, Default)]
pub struct Logger {
    verbosity: usize,
    depth: Cell<usize>,
}

impl Logger {
    pub fn new(verbosity: usize) -> Self {
        Self {
            verbosity,
            depth: Cell::new(0),
        }
    }

    pub fn verbosity(&self) -> usize {
        self.verbosity
    }

    pub fn enabled(&self, level: usize) -> bool {
        level <= self.verbosity
    }

    pub fn log(&self, level: usize, text: &str) {
        if self.enabled(level) {
            log::debug!("{}{}", self.prefix(), text);
        }
    }

    pub fn prefix(&self) -> String {
        "  ".repeat(self.depth.get())
    }

    /// Indent every message until the returned guard is dropped.
    pub fn indent(&self) -> Indent<'_> {
        self.depth.set(self.depth.get() + 1);
        Indent { logger: self }
    }
}

pub struct Indent<'a> {
    logger: &'a Logger,
}

impl Drop for Indent<'_> {
    fn drop(&mut self) {
        let depth = self.logger.depth.get();
        self.logger.depth.set(depth.saturating_sub(1));
    }
}
