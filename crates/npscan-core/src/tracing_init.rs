//! Logging setup for the `npscan` binary.
//!
//! Logs go to stderr so that commands like `fetch` keep stdout clean for
//! their JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose per-query and per-connection chatter is capped at `warn`.
const QUIET_DEPENDENCIES: &[&str] = &["sqlx", "hyper_util", "reqwest"];

/// Filter directives for `level`, unless `rust_log` overrides them.
pub fn filter_directives(level: &str, rust_log: Option<&str>) -> String {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return directives.to_string();
    }
    let mut directives = vec![format!(
        "npscan_core={level},npscan_daemon={level},npscan={level}"
    )];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|dep| format!("{dep}=warn")));
    directives.join(",")
}

/// Install the global subscriber at `level`, or per `RUST_LOG` when set.
///
/// `log_json` switches to one JSON object per line.
pub fn init_tracing(level: &str, log_json: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let env_filter =
        tracing_subscriber::EnvFilter::new(filter_directives(level, rust_log.as_deref()));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }
}
