use std::env;
use tracing::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    /// Used when RUST_LOG is absent.
    pub(crate) default_level: Level,
    pub(crate) ansi: bool,
    /// Warnings captured during config parsing so they can be logged after tracing is initialized.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut warnings = Vec::new();

        let service_name = non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone());
        let environment = non_empty("STAGE").unwrap_or_else(|| "unknown".to_string());

        let default_level = match non_empty("LOG_LEVEL") {
            None => Level::INFO,
            Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                warnings.push(format!("LOG_LEVEL `{raw}` is not a level; using info"));
                Level::INFO
            }),
        };

        let ansi = match non_empty("LOG_ANSI") {
            None => true,
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warnings.push(format!("LOG_ANSI `{raw}` is not a boolean; colours stay on"));
                true
            }),
        };

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            default_level,
            ansi,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ObservabilityConfig::from_lookup(" billing-worker ", |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]);
        assert_eq!(config.service_context.service_name, "billing-worker");
        assert_eq!(config.service_context.component, "billing-worker");
        assert_eq!(config.service_context.environment, "unknown");
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.ansi);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("SERVICE_NAME", "billing"),
            ("STAGE", "production"),
            ("LOG_LEVEL", "Warning"),
            ("LOG_ANSI", "off"),
        ]);
        assert_eq!(config.service_context.service_name, "billing");
        assert_eq!(config.service_context.environment, "production");
        assert_eq!(config.default_level, Level::WARN);
        assert!(!config.ansi);
    }

    #[test]
    fn invalid_values_fall_back_with_warnings() {
        let config = config(&[("LOG_LEVEL", "loud"), ("LOG_ANSI", "maybe"), ("STAGE", "  ")]);
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.ansi);
        assert_eq!(config.service_context.environment, "unknown");
        assert_eq!(config.warnings.len(), 2);
        assert!(config.warnings[0].contains("LOG_LEVEL"));
    }
}
