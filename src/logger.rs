use std::io::Write;

use env_logger::Builder;
use log::{info, LevelFilter};

fn level_color(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1B[1;31m", // Bold Red
        log::Level::Warn => "\x1B[1;33m",  // Bold Yellow
        log::Level::Info => "\x1B[1;32m",  // Bold Green
        log::Level::Debug => "\x1B[1;36m", // Bold Cyan
        log::Level::Trace => "\x1B[1;35m", // Bold Magenta
    }
}

/// Installs the process-wide logger. `RUST_LOG` overrides the `info` default;
/// `actix_server` and `mio` are held at `warn` unless asked for explicitly.
pub fn setup_logger() {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}{}\x1B[0m [{}:{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level_color(record.level()),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .filter(Some("actix_server"), LevelFilter::Warn)
        .filter(Some("mio"), LevelFilter::Warn);

    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    // A second call (tests, the CLI after the server) is harmless.
    if builder.try_init().is_ok() {
        info!("Logger initialized");
    }
}
