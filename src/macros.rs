/// Logs at info level once a step's verbosity reaches `min`.
#[macro_export]
macro_rules! verbose {
    ($min:expr, $verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $min {
            ::log::info!($($arg)*);
        }
    };
}
