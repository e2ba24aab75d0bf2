//! Tracing / logging initialisation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: crate name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Parse `component=level` overrides, e.g. `chainingest-rpc=debug`.
    pub fn with_overrides(mut self, overrides: &[String]) -> Self {
        for entry in overrides {
            if let Some((component, level)) = entry.split_once('=') {
                self.components.insert(component.to_string(), level.to_string());
            }
        }
        self
    }

    /// The `EnvFilter` directive string, e.g. `info,chainingest_rpc=debug`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install the global subscriber. Call once at startup.
///
/// `RUST_LOG`, when set, takes precedence over `config`.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_sorted_overrides() {
        let cfg = LogConfig::default().with_overrides(&[
            "chainingest-rpc=debug".into(),
            "chainingest-engine=trace".into(),
            "malformed".into(),
        ]);
        assert_eq!(
            cfg.directives(),
            "info,chainingest_engine=trace,chainingest_rpc=debug"
        );
    }

    #[test]
    fn default_is_info_text() {
        let cfg = LogConfig::default();
        assert_eq!(cfg.directives(), "info");
        assert!(!cfg.json);
    }
}
