//! Print macros.

/// Record a formatted message in the trace stream.
///
/// ```ignore
/// rti_print!(tracer, "sensor {} ready", id);
/// rti_print!(tracer, level: PrintLevel::Warning, "retry {}", n);
/// ```
#[macro_export]
macro_rules! rti_print {
    ($tracer:expr, level: $level:expr, $($arg:tt)*) => {
        $tracer.print_fmt($level, format_args!($($arg)*))
    };
    ($tracer:expr, $($arg:tt)*) => {
        $tracer.print_fmt($crate::PrintLevel::Log, format_args!($($arg)*))
    };
}
