pub mod device_finder;
pub mod permissions;

pub use device_finder::DeviceFinder;

/// Логирование в горячем цикле захвата: аргументы не форматируются,
/// если уровень отключён.
#[macro_export]
macro_rules! debug_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}

/// То же для уровня TRACE.
#[macro_export]
macro_rules! trace_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!($($arg)*);
        }
    };
}
