// =============================================================================
// PiBring - Console Logger
// =============================================================================
// `log` backend that writes one line per record to the runtime console.
// Install it only after the runtime console is reachable (after phase 2).
// =============================================================================

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::uart::_print(format_args!("{}", Line(record)));
        }
    }

    fn flush(&self) {}
}

/// `[LEVEL] message\n`, the level padded so messages line up.
struct Line<'a, 'b>(&'a Record<'b>);

impl fmt::Display for Line<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<5}] {}", self.0.level(), self.0.args())?;
        f.write_char('\n')
    }
}

/// Install the console logger with `level` as the maximum level.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
