use colored::ColoredString;
use env_logger::Env;
use std::io::Write;

/// Initializes the logger with a default `info` filter.
///
/// `ORCHID_LOG` takes precedence for engine-specific filtering (e.g.
/// `ORCHID_LOG=orchid::schema=debug` traces synthesis and the emitted DDL
/// without drowning in driver output); the conventional `RUST_LOG` is
/// honored otherwise. Each line carries the engine component the record
/// came from, with the crate prefix stripped.
pub fn init_logging(name: ColoredString) {
    let env = if std::env::var_os("ORCHID_LOG").is_some() {
        Env::new().filter_or("ORCHID_LOG", "info")
    } else {
        Env::default().default_filter_or("info")
    };
    let _ = env_logger::Builder::from_env(env)
        .format(move |buf, record| {
            let t = chrono::Utc::now();
            let target = record.target();
            let component = target.strip_prefix("orchid::").unwrap_or(target);
            writeln!(
                buf,
                "{} {} {} {}: {}",
                t.format("%Y-%m-%d %H:%M:%S"),
                buf.default_styled_level(record.level()),
                name,
                component,
                record.args()
            )
        })
        .try_init();
}
