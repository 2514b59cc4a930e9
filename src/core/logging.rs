//! Tracing subscriber setup. Logs go to stderr so stdout stays parseable.

use std::env;
use tracing_subscriber::prelude::*;

pub const LOG_ENV: &str = "ORC_LOG";

/// Filter directive for a `-v` count; `ORC_LOG` wins when set.
pub fn filter_directive(verbosity: u8) -> String {
    if let Ok(filter) = env::var(LOG_ENV) {
        if !filter.trim().is_empty() {
            return filter;
        }
    }
    match verbosity {
        0 => "warn".to_string(),
        1 => "orc=info,warn".to_string(),
        _ => "orc=debug,info".to_string(),
    }
}

pub fn init(verbosity: u8) {
    let env_filter = tracing_subscriber::EnvFilter::new(filter_directive(verbosity));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);
    if registry.try_init().is_err() {
        eprintln!("orc: logging init skipped (global subscriber already set)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        if env::var(LOG_ENV).is_ok() {
            return;
        }
        assert_eq!(filter_directive(0), "warn");
        assert!(filter_directive(1).contains("orc=info"));
        assert!(filter_directive(5).contains("orc=debug"));
    }
}
