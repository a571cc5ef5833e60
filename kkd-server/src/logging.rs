//! Tracing setup
//!
//! The subscriber is installed before the bootstrap config is read so that
//! config discovery is logged. The config's level is applied afterwards
//! through a reload handle, unless `RUST_LOG` already chose the filter.

use anyhow::{Context, Result};
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

const DEFAULT_LEVEL: &str = "info";

/// Handle to the installed level filter
pub struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilter {
    /// Replace the filter with `level`; `Ok(false)` when `RUST_LOG` takes precedence
    pub fn apply_level(&self, level: &str) -> Result<bool> {
        if self.from_env {
            return Ok(false);
        }
        let filter = EnvFilter::try_new(directives_for(level))
            .with_context(|| format!("Invalid log level {:?}", level))?;
        self.handle
            .reload(filter)
            .context("Tracing subscriber is gone")?;
        Ok(true)
    }

    /// Directives of the active filter
    pub fn current(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }
}

fn directives_for(level: &str) -> String {
    format!("{},tower_http=info", level)
}

/// Reloadable filter layer, seeded from `rust_log` when it parses
pub fn filter_layer(rust_log: Option<&str>) -> (reload::Layer<EnvFilter, Registry>, LogFilter) {
    let from_env = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok());
    let (filter, from_env) = match from_env {
        Some(filter) => (filter, true),
        None => (EnvFilter::new(directives_for(DEFAULT_LEVEL)), false),
    };
    let (layer, handle) = reload::Layer::new(filter);
    (layer, LogFilter { handle, from_env })
}

/// Install the global subscriber
pub fn init() -> LogFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (layer, filter) = filter_layer(rust_log.as_deref());
    tracing_subscriber::registry()
        .with(layer)
        .with(tracing_subscriber::fmt::layer())
        .init();
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_level_replaces_default() {
        let (layer, filter) = filter_layer(None);
        let _subscriber = tracing_subscriber::registry().with(layer);

        assert!(filter.current().contains("info"));
        assert!(filter.apply_level("debug").unwrap());
        let current = filter.current();
        assert!(current.contains("debug"));
        assert!(current.contains("tower_http=info"));
    }

    #[test]
    fn test_rust_log_takes_precedence() {
        let (layer, filter) = filter_layer(Some("warn"));
        let _subscriber = tracing_subscriber::registry().with(layer);

        assert!(!filter.apply_level("debug").unwrap());
        assert!(filter.current().contains("warn"));
        assert!(!filter.current().contains("debug"));
    }
}
