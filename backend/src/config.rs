use std::net::SocketAddr;

use crate::network::DEFAULT_MAX_RADIUS_M;

pub const DEFAULT_NODE_GEOJSON: &str = "backend/data/NODE_JSON.geojson";
pub const DEFAULT_LINK_GEOJSON: &str = "backend/data/LINK_JSON.geojson";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid value `{value}` for {var}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

/// Service settings read from the environment. The browser client's `VITE_*`
/// names are accepted wherever the plain name is unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub node_geojson: String,
    pub link_geojson: String,
    pub supabase: Option<SupabaseConfig>,
    pub schedule_api: Option<String>,
    pub bind_addr: SocketAddr,
    pub node_max_radius_m: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .or_else(|| lookup(&format!("VITE_{name}")))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = match get("BIND_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError {
                var: "BIND_ADDR",
                value,
            })?,
            None => DEFAULT_BIND_ADDR.parse().map_err(|_| ConfigError {
                var: "BIND_ADDR",
                value: DEFAULT_BIND_ADDR.to_string(),
            })?,
        };

        let node_max_radius_m = match get("NODE_MAX_RADIUS_M") {
            Some(value) => match value.parse::<f64>() {
                Ok(radius) if radius.is_finite() && radius > 0.0 => radius,
                _ => {
                    return Err(ConfigError {
                        var: "NODE_MAX_RADIUS_M",
                        value,
                    });
                }
            },
            None => DEFAULT_MAX_RADIUS_M,
        };

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(SupabaseConfig { url, anon_key }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("SUPABASE_URL and SUPABASE_ANON_KEY must both be set; place data disabled");
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            node_geojson: get("NODE_GEOJSON").unwrap_or_else(|| DEFAULT_NODE_GEOJSON.to_string()),
            link_geojson: get("LINK_GEOJSON").unwrap_or_else(|| DEFAULT_LINK_GEOJSON.to_string()),
            supabase,
            schedule_api: get("SCHEDULE_API"),
            bind_addr,
            node_max_radius_m,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.node_geojson, DEFAULT_NODE_GEOJSON);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.node_max_radius_m, DEFAULT_MAX_RADIUS_M);
        assert!(config.supabase.is_none());
        assert!(config.schedule_api.is_none());
    }

    #[test]
    fn vite_names_are_fallbacks() {
        let config = config(&[
            ("VITE_SUPABASE_URL", "https://db.example"),
            ("VITE_SUPABASE_ANON_KEY", "anon"),
            ("VITE_SCHEDULE_API", "http://vite-scheduler"),
            ("SCHEDULE_API", "http://scheduler"),
        ])
        .unwrap();
        assert_eq!(
            config.supabase,
            Some(SupabaseConfig {
                url: "https://db.example".into(),
                anon_key: "anon".into()
            })
        );
        assert_eq!(config.schedule_api.as_deref(), Some("http://scheduler"));
    }

    #[test]
    fn half_configured_supabase_is_disabled() {
        let config = config(&[("SUPABASE_URL", "https://db.example"), ("SUPABASE_ANON_KEY", " ")]).unwrap();
        assert!(config.supabase.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            config(&[("BIND_ADDR", "nowhere")]).unwrap_err().var,
            "BIND_ADDR"
        );
        assert_eq!(
            config(&[("NODE_MAX_RADIUS_M", "-5")]).unwrap_err().var,
            "NODE_MAX_RADIUS_M"
        );
        let custom = config(&[("NODE_MAX_RADIUS_M", "250")]).unwrap();
        assert_eq!(custom.node_max_radius_m, 250.0);
    }
}
