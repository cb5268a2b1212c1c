//! Invoker configuration with layered loading and environment variable interpolation.
//!
//! Layers, lowest precedence first: built-in defaults, the TOML file
//! (`riff.toml` or an explicit path) with `${VAR}` interpolation, then
//! environment variables prefixed `RIFF_` with `__` separating sections,
//! e.g. `RIFF_GRPC__STREAM_BUFFER=64`.

use figment::{
    providers::{Env, Format, Toml},
    value::{Dict, Map, Value},
    Error as FigmentError, Figment, Metadata, Profile, Provider,
};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "riff.toml";

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "RIFF_";

/// Errors that can occur when loading or parsing invoker configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error from the Figment configuration library.
    #[error("Configuration error: {0}")]
    Figment(Box<FigmentError>),

    /// The specified configuration file was not found.
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration is invalid or malformed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<FigmentError> for ConfigError {
    fn from(err: FigmentError) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Top-level invoker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvokerConfig {
    /// Listener addresses and shutdown behaviour.
    #[serde(default)]
    pub server: ServerConfig,

    /// The function to host.
    #[serde(default)]
    pub function: FunctionConfig,

    /// Invocation stream settings.
    #[serde(default)]
    pub grpc: GrpcConfig,

    /// Request limits for the HTTP endpoint.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl InvokerConfig {
    /// Loads configuration from `path`, or from `riff.toml` when present.
    ///
    /// An explicit path must exist; the default file is optional, so a bare
    /// environment is enough to configure the invoker.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, ENV_PREFIX)
    }

    fn load_with_env(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.display().to_string()));
                }
                figment = figment.merge(InterpolatingToml::file(path)?);
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    figment = figment.merge(InterpolatingToml::file(&default_path)?);
                }
            }
        }

        figment = figment.merge(Env::prefixed(env_prefix).split("__"));

        figment.extract::<Self>().map_err(ConfigError::from)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new().merge(InterpolatingToml::string(content));
        figment.extract::<Self>().map_err(ConfigError::from)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address of the plain HTTP endpoint.
    #[serde(default = "default_http_address")]
    pub http_address: SocketAddr,

    /// Address of the invocation stream endpoint.
    #[serde(default = "default_grpc_address")]
    pub grpc_address: SocketAddr,

    /// Time to wait for in-flight requests during shutdown.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_address: default_http_address(),
            grpc_address: default_grpc_address(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

const fn default_http_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)
}

const fn default_grpc_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 10382)
}

const fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// The hosted function.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionConfig {
    /// Program run once per invocation.
    #[serde(default)]
    pub command: Option<PathBuf>,

    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Maximum run time of a single invocation.
    #[serde(
        default = "default_function_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout: default_function_timeout(),
        }
    }
}

const fn default_function_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Invocation stream settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GrpcConfig {
    /// Replies buffered per call before the function is paused.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Largest encoded message accepted or sent, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            stream_buffer: default_stream_buffer(),
            max_message_size: default_max_message_size(),
        }
    }
}

const fn default_stream_buffer() -> usize {
    16
}

const fn default_max_message_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

/// Request limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
        }
    }
}

const fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

/// Durations arrive as text (`"30s"`) from TOML or as bare numbers from
/// the environment.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Secs(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Secs(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let parse = |digits: &str| -> Result<u64, String> {
        digits
            .trim()
            .parse()
            .map_err(|_| format!("Invalid duration: {s}"))
    };

    if let Some(stripped) = s.strip_suffix("ms") {
        Ok(Duration::from_millis(parse(stripped)?))
    } else if let Some(stripped) = s.strip_suffix('s') {
        Ok(Duration::from_secs(parse(stripped)?))
    } else if let Some(stripped) = s.strip_suffix('m') {
        let mins = parse(stripped)?;
        mins.checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("Invalid duration: {s}"))
    } else {
        Ok(Duration::from_secs(parse(s)?))
    }
}

struct EnvVarInterpolator;

impl EnvVarInterpolator {
    fn interpolate_value(value: Value) -> Value {
        match value {
            Value::String(_, s) => Value::from(Self::interpolate_string(&s)),
            Value::Dict(tag, dict) => {
                let new_dict: Dict = dict
                    .into_iter()
                    .map(|(k, v)| (k, Self::interpolate_value(v)))
                    .collect();
                Value::Dict(tag, new_dict)
            }
            Value::Array(tag, arr) => {
                Value::Array(tag, arr.into_iter().map(Self::interpolate_value).collect())
            }
            other => other,
        }
    }

    /// Replaces `${NAME}` with the variable's value; unset variables expand
    /// to nothing.
    fn interpolate_string(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();
                let mut var_name = String::new();
                for ch in chars.by_ref() {
                    if ch == '}' {
                        break;
                    }
                    var_name.push(ch);
                }
                if let Ok(val) = std::env::var(&var_name) {
                    result.push_str(&val);
                }
            } else {
                result.push(c);
            }
        }

        result
    }
}

/// TOML configuration provider with environment variable interpolation.
///
/// Supports `${VAR_NAME}` syntax for embedding environment variable values.
pub struct InterpolatingToml {
    content: String,
}

impl InterpolatingToml {
    /// Creates an interpolating TOML provider from a file path.
    pub fn file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|_| ConfigError::FileNotFound(path.as_ref().display().to_string()))?;
        Ok(Self { content })
    }

    /// Creates an interpolating TOML provider from a string.
    pub fn string(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl Provider for InterpolatingToml {
    fn metadata(&self) -> Metadata {
        Metadata::named("Interpolating TOML")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, FigmentError> {
        let base_data = Toml::string(&self.content).data()?;

        Ok(base_data
            .into_iter()
            .map(|(profile, dict)| {
                let new_dict: Dict = dict
                    .into_iter()
                    .map(|(k, v)| (k, EnvVarInterpolator::interpolate_value(v)))
                    .collect();
                (profile, new_dict)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("30s", Duration::from_secs(30))]
    #[case("5s", Duration::from_secs(5))]
    #[case("100ms", Duration::from_millis(100))]
    #[case("5m", Duration::from_secs(300))]
    #[case("60", Duration::from_secs(60))]
    #[case(" 2 s ", Duration::from_secs(2))]
    fn parse_duration_units(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("fast")]
    #[case("-1s")]
    #[case("1h")]
    fn parse_duration_rejects(#[case] input: &str) {
        assert!(parse_duration(input).is_err());
    }

    #[test]
    fn config_from_string() {
        let config_str = r#"
            [server]
            http_address = "0.0.0.0:9000"
            grpc_address = "0.0.0.0:9001"
            shutdown_timeout = "5s"

            [function]
            command = "/usr/bin/wc"
            args = ["-c"]
            timeout = "250ms"

            [grpc]
            stream_buffer = 4
            max_message_size = 1024

            [limits]
            max_body_size = 5242880
        "#;

        let config = InvokerConfig::parse(config_str).unwrap();

        assert_eq!(config.server.http_address, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.server.grpc_address, "0.0.0.0:9001".parse().unwrap());
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.function.command, Some(PathBuf::from("/usr/bin/wc")));
        assert_eq!(config.function.args, ["-c"]);
        assert_eq!(config.function.timeout, Duration::from_millis(250));
        assert_eq!(config.grpc.stream_buffer, 4);
        assert_eq!(config.grpc.max_message_size, 1024);
        assert_eq!(config.limits.max_body_size, 5 * 1024 * 1024);
    }

    #[test]
    fn config_defaults() {
        let config = InvokerConfig::parse("").unwrap();

        assert_eq!(
            config.server.http_address,
            "127.0.0.1:8080".parse().unwrap()
        );
        assert_eq!(
            config.server.grpc_address,
            "127.0.0.1:10382".parse().unwrap()
        );
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.function.command, None);
        assert_eq!(config.function.timeout, Duration::from_secs(60));
        assert_eq!(config.grpc.stream_buffer, 16);
        assert_eq!(config.grpc.max_message_size, 10 * 1024 * 1024);
        assert_eq!(config.limits.max_body_size, 10 * 1024 * 1024);
    }

    #[test]
    fn config_interpolates_env_vars() {
        std::env::set_var("RIFF_CONFIG_TEST_COMMAND", "/opt/fn/run");
        let config_str = r#"
            [function]
            command = "${RIFF_CONFIG_TEST_COMMAND}"
            args = ["--name", "${RIFF_CONFIG_TEST_UNSET}x"]
        "#;

        let config = InvokerConfig::parse(config_str).unwrap();

        assert_eq!(config.function.command, Some(PathBuf::from("/opt/fn/run")));
        assert_eq!(config.function.args, ["--name", "x"]);
    }

    #[test]
    fn config_env_overrides_file() {
        let dir = std::env::temp_dir().join(format!("riff-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("riff.toml");
        std::fs::write(
            &path,
            r#"
            [grpc]
            stream_buffer = 4

            [function]
            timeout = "10s"
            "#,
        )
        .unwrap();

        std::env::set_var("RIFF_ENVTEST_GRPC__STREAM_BUFFER", "64");
        std::env::set_var("RIFF_ENVTEST_FUNCTION__TIMEOUT", "2");

        let config = InvokerConfig::load_with_env(Some(&path), "RIFF_ENVTEST_").unwrap();

        assert_eq!(config.grpc.stream_buffer, 64);
        assert_eq!(config.function.timeout, Duration::from_secs(2));
        assert_eq!(config.grpc.max_message_size, 10 * 1024 * 1024);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = InvokerConfig::load(Some(Path::new("/nonexistent/riff.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let err = InvokerConfig::parse(
            r#"
            [function]
            timeout = "soon"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid duration"));
    }
}
