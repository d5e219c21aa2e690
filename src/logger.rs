//! `log` facade backend that records into the trace stream.
//!
//! Install a [`TraceLogger`] and every `log::info!` and friends shows up as a
//! formatted-print record on the viewer timeline, interleaved with the
//! scheduler and interrupt events around it.

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::drain::DrainSignal;
use crate::kernel::Kernel;
use crate::print::PrintLevel;
use crate::tracer::Tracer;

/// Routes log records to a tracer.
pub struct TraceLogger<'a, K, S> {
    tracer: &'a Tracer<K, S>,
    level: LevelFilter,
}

impl<'a, K, S> TraceLogger<'a, K, S> {
    pub const fn new(tracer: &'a Tracer<K, S>, level: LevelFilter) -> Self {
        Self { tracer, level }
    }
}

/// The tracer's own diagnostics would feed back into the stream.
fn is_own_target(target: &str) -> bool {
    target == "rti" || target.starts_with("rti::")
}

fn print_level(level: Level) -> PrintLevel {
    match level {
        Level::Error => PrintLevel::Error,
        Level::Warn => PrintLevel::Warning,
        _ => PrintLevel::Log,
    }
}

impl<K, S> Log for TraceLogger<'_, K, S>
where
    K: Kernel + Send + Sync,
    S: DrainSignal + Send + Sync,
{
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && !is_own_target(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.tracer.print_fmt(
            print_level(record.level()),
            format_args!("{}: {}", record.target(), record.args()),
        );
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(print_level(Level::Error), PrintLevel::Error);
        assert_eq!(print_level(Level::Warn), PrintLevel::Warning);
        assert_eq!(print_level(Level::Info), PrintLevel::Log);
        assert_eq!(print_level(Level::Trace), PrintLevel::Log);
    }

    #[test]
    fn test_own_records_filtered() {
        assert!(is_own_target("rti"));
        assert!(is_own_target("rti::tracer"));
        assert!(!is_own_target("rtic"));
        assert!(!is_own_target("app::sensor"));
    }
}
