use secrecy::{ExposeSecret, SecretString};
use service_core::config::{self as core_config, get_var, parse_var};
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const CLIENT_ID_PREFIX: &str = "sms_relay_listener_";
const DEFAULT_QOS: &str = "1";
const DEFAULT_KEEP_ALIVE_SECS: &str = "30";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub common: core_config::Config,
    pub bark: BarkConfig,
    pub mqtt: MqttConfig,
}

/// Bark endpoint settings.
///
/// Both fields may be empty at startup; the provider refuses to send until
/// they are filled in.
#[derive(Debug, Clone)]
pub struct BarkConfig {
    pub api_base: String,
    pub key: SecretString,
}

impl BarkConfig {
    pub fn new(api_base: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            key: SecretString::new(key.into()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base.trim().is_empty() && !self.key.expose_secret().trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Must be unique per connected process.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Default QoS for subscriptions and publishes (0, 1 or 2).
    pub qos: u8,
    /// Default retained flag for publishes.
    pub retained: bool,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub reconnect_interval: Duration,
}

impl MqttConfig {
    /// Config with the service defaults and a freshly generated client id.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: generate_client_id(),
            username: None,
            password: None,
            qos: 1,
            retained: false,
            keep_alive: Duration::from_secs(30),
            connect_timeout: CONNECT_TIMEOUT,
            reconnect_interval: RECONNECT_INTERVAL,
        }
    }

    pub fn broker_address(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// Client id derived from the local start time. Collisions are unlikely, not impossible.
pub fn generate_client_id() -> String {
    format!(
        "{}{}",
        CLIENT_ID_PREFIX,
        chrono::Local::now().format("%Y%m%d%H%M%S")
    )
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build the relay settings from `lookup`, the process environment in production.
    ///
    /// Missing Bark settings default to empty; a missing or unparseable
    /// `MQTT_HOST` or `MQTT_PORT` is a configuration error.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: Option<&str>| get_var(&lookup, key, default);

        let username = non_empty(var("MQTT_USERNAME", Some(""))?);
        let password = non_empty(var("MQTT_PASSWORD", Some(""))?).map(SecretString::new);

        Ok(RelayConfig {
            common,
            bark: BarkConfig::new(var("BARK_API", Some(""))?, var("BARK_KEY", Some(""))?),
            mqtt: MqttConfig {
                host: required(var("MQTT_HOST", None)?, "MQTT_HOST")?,
                port: parse_var(&lookup, "MQTT_PORT", None)?,
                client_id: generate_client_id(),
                username,
                password,
                qos: parse_qos(parse_var(&lookup, "MQTT_QOS", Some(DEFAULT_QOS))?)?,
                retained: false,
                keep_alive: Duration::from_secs(parse_var(
                    &lookup,
                    "MQTT_KEEP_ALIVE_SECS",
                    Some(DEFAULT_KEEP_ALIVE_SECS),
                )?),
                connect_timeout: CONNECT_TIMEOUT,
                reconnect_interval: RECONNECT_INTERVAL,
            },
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|v| !v.trim().is_empty())
}

fn required(value: String, key: &str) -> Result<String, AppError> {
    non_empty(value).ok_or_else(|| AppError::config(format!("{} must not be empty", key)))
}

fn parse_qos(qos: u8) -> Result<u8, AppError> {
    if qos <= 2 {
        Ok(qos)
    } else {
        Err(AppError::config(format!("MQTT_QOS must be 0, 1 or 2, got {}", qos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn common() -> core_config::Config {
        core_config::Config {
            port: 0,
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }

    fn load_from(vars: &[(&str, &str)]) -> Result<RelayConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_lookup(common(), |key| vars.get(key).cloned())
    }

    #[test]
    fn loads_minimal_environment_with_defaults() {
        let config = load_from(&[("MQTT_HOST", "broker.local"), ("MQTT_PORT", "1883")]).unwrap();

        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.qos, 1);
        assert_eq!(config.mqtt.keep_alive, Duration::from_secs(30));
        assert!(config.mqtt.username.is_none());
        assert!(config.mqtt.password.is_none());
        assert!(!config.bark.is_configured());
    }

    #[test]
    fn loads_credentials_and_bark_settings() {
        let config = load_from(&[
            ("MQTT_HOST", "broker.local"),
            ("MQTT_PORT", "8883"),
            ("MQTT_USERNAME", "relay"),
            ("MQTT_PASSWORD", "hunter2"),
            ("MQTT_QOS", "0"),
            ("BARK_API", "https://api.day.app"),
            ("BARK_KEY", "abc123"),
        ])
        .unwrap();

        assert_eq!(config.mqtt.username.as_deref(), Some("relay"));
        assert_eq!(
            config.mqtt.password.as_ref().map(|p| p.expose_secret().as_str()),
            Some("hunter2")
        );
        assert_eq!(config.mqtt.qos, 0);
        assert!(config.bark.is_configured());
    }

    #[test]
    fn missing_mqtt_host_is_config_error() {
        let err = load_from(&[("MQTT_PORT", "1883")]).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().contains("MQTT_HOST"));
    }

    #[test]
    fn missing_or_invalid_mqtt_port_is_config_error() {
        let err = load_from(&[("MQTT_HOST", "broker.local")]).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().contains("MQTT_PORT"));

        let err = load_from(&[("MQTT_HOST", "broker.local"), ("MQTT_PORT", "abc")]).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().contains("MQTT_PORT"));
    }

    #[test]
    fn client_id_has_prefix_and_timestamp() {
        let id = generate_client_id();
        let suffix = id.strip_prefix(CLIENT_ID_PREFIX).expect("missing prefix");
        assert_eq!(suffix.len(), 14);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn bark_config_requires_both_fields() {
        assert!(BarkConfig::new("https://api.day.app", "key").is_configured());
        assert!(!BarkConfig::new("", "key").is_configured());
        assert!(!BarkConfig::new("https://api.day.app", "").is_configured());
        assert!(!BarkConfig::new("  ", " ").is_configured());
    }

    #[test]
    fn mqtt_defaults() {
        let cfg = MqttConfig::new("broker.local", 1883);
        assert_eq!(cfg.qos, 1);
        assert!(!cfg.retained);
        assert_eq!(cfg.reconnect_interval, Duration::from_secs(1));
        assert_eq!(cfg.broker_address(), "tcp://broker.local:1883");
    }

    #[test]
    fn qos_above_two_is_rejected() {
        assert!(parse_qos(2).is_ok());
        assert!(matches!(parse_qos(3), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn empty_required_value_is_rejected() {
        assert!(required("   ".to_string(), "MQTT_HOST").is_err());
        assert_eq!(required("localhost".to_string(), "MQTT_HOST").unwrap(), "localhost");
    }
}
