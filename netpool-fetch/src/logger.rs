/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Write log records to stderr, one line each.
pub(crate) struct SyncLogger {
    level: LevelFilter,
}

impl SyncLogger {
    pub(crate) fn new(verbose_level: u8) -> Self {
        let level = match verbose_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        SyncLogger { level }
    }

    pub(crate) fn into_global_logger(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for SyncLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = match record.level() {
            Level::Error | Level::Warn => {
                writeln!(stderr, "{}: {}", record.level(), record.args())
            }
            _ => writeln!(
                stderr,
                "{} [{}] {}",
                record.level(),
                record.target(),
                record.args()
            ),
        };
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
