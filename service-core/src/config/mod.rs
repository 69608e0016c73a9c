use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_port() -> u16 {
    1323
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mut config: Config = config.try_deserialize()?;

        // Unprefixed variables shared with the deployment environment win.
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(endpoint) = env::var("OTLP_ENDPOINT") {
            config.otlp_endpoint = Some(endpoint).filter(|e| !e.is_empty());
        }

        Ok(config)
    }
}

/// Read `key` from `lookup`, usually the process environment.
///
/// A missing variable falls back to `default`; with no default the lookup
/// fails with a configuration error naming the key.
pub fn get_var<F>(lookup: F, key: &str, default: Option<&str>) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::config(format!("{} is required but not set", key))),
        },
    }
}

/// Read and parse a variable, reporting unparseable values as configuration errors.
pub fn parse_var<F, T>(lookup: F, key: &str, default: Option<&str>) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_var(lookup, key, default)?;
    raw.trim()
        .parse::<T>()
        .map_err(|e| AppError::config(format!("{} has invalid value {:?}: {}", key, raw, e)))
}
