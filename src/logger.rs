use crate::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the stderr subscriber and route `log` records through it.
///
/// `level` overrides `PIPESTEP_LOG`. Calling this more than once is harmless: if a global
/// subscriber already exists the existing one keeps receiving events.
pub fn init(level: Option<log::LevelFilter>) {
    let level = level.unwrap_or(*env::PIPESTEP_LOG);
    let filter = EnvFilter::new(level.to_string().to_lowercase());
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(console::Term::stderr().features().colors_supported())
        .without_time()
        .compact();
    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }
    // Another logger may already own the `log` facade (e.g. in tests)
    let _ = tracing_log::LogTracer::builder()
        .with_max_level(level)
        .init();
}
