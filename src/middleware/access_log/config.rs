//! Access-log configuration.
//!
//! Resolved once, in increasing precedence: built-in defaults, the published
//! TOML file (`<config_dir>/log/access.toml`), then `LOG_ACCESS_*`
//! environment variables.
//!
//! Environment values are read the way a shell user writes them: `1`, `on`
//! and `yes` switch a toggle on, and `LOG_ACCESS_MASKING_TEXT=00000000` stays
//! eight zeros.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Error;

/// Where [`publish`] puts the file, relative to the application config dir.
pub const PUBLISHED_PATH: &str = "log/access.toml";

/// Section name when the settings are embedded in a larger figment.
pub const SECTION: &str = "log.access";

pub const ENV_PREFIX: &str = "LOG_ACCESS_";

/// String keys taken verbatim from the environment. Figment would parse
/// `00000000` as the number 0 and lose the zeros.
const VERBATIM_ENV_KEYS: [&str; 2] = ["directory", "masking_text"];

const PUBLISHED_FILE: &str = include_str!("../../../config/log/access.toml");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessLogConfig {
    #[serde(deserialize_with = "lenient::flag")]
    pub enable: bool,
    /// Log directory, relative to the sink root.
    #[serde(deserialize_with = "lenient::text")]
    pub directory: String,
    /// Regular expressions matched against the request URI.
    pub ignore_uri: Vec<String>,

    #[serde(deserialize_with = "lenient::flag")]
    pub execution_time: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub memory_peak_usage: bool,

    #[serde(deserialize_with = "lenient::flag")]
    pub request_url: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub request_http_method: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub request_user_agent: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub request_ip_address: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub request_body: bool,

    #[serde(deserialize_with = "lenient::flag")]
    pub response_status: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub response_status_text: bool,

    #[serde(deserialize_with = "lenient::text")]
    pub masking_text: String,
    /// Top-level body keys whose values are replaced by `masking_text`.
    pub masking_parameters: Vec<String>,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enable: false,
            directory: "access".to_owned(),
            ignore_uri: Vec::new(),
            execution_time: false,
            memory_peak_usage: false,
            request_url: false,
            request_http_method: false,
            request_user_agent: false,
            request_ip_address: false,
            request_body: false,
            response_status: false,
            response_status_text: false,
            masking_text: "********".to_owned(),
            masking_parameters: [
                "password",
                "password_confirmation",
                "current_password",
                "new_password",
                "new_password_confirmation",
            ]
            .map(str::to_owned)
            .to_vec(),
        }
    }
}

impl AccessLogConfig {
    /// Defaults, then `file` (if it exists), then the environment.
    pub fn figment(file: impl AsRef<Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file.as_ref()));
        merge_env(figment)
    }

    pub fn load(file: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::figment(file).extract()?)
    }

    /// Loads `<config_dir>/log/access.toml`.
    pub fn load_published(config_dir: impl AsRef<Path>) -> Result<Self, Error> {
        Self::load(config_dir.as_ref().join(PUBLISHED_PATH))
    }

    /// Reads the `log.access` section of an application-wide figment.
    /// Environment variables still take precedence.
    pub fn from_figment(app: &Figment) -> Result<Self, Error> {
        let figment = Figment::from(Serialized::defaults(Self::default())).merge(app.focus(SECTION));
        Ok(merge_env(figment).extract()?)
    }
}

/// Merges the `LOG_ACCESS_*` variables on top of `figment`.
fn merge_env(figment: Figment) -> Figment {
    let figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&VERBATIM_ENV_KEYS));
    VERBATIM_ENV_KEYS.into_iter().fold(figment, |figment, key| {
        match std::env::var(format!("{ENV_PREFIX}{}", key.to_ascii_uppercase())) {
            Ok(value) => figment.merge(Serialized::default(key, value)),
            Err(_) => figment,
        }
    })
}

/// Deserializers that accept what a config file or shell hands over, not
/// just the exact serde type.
mod lenient {
    use serde::de::{Error, Unexpected};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Text(String),
    }

    /// `true`/`false`, `1`/`0`, and the strings `yes`, `no`, `on`, `off`.
    pub fn flag<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
        match Scalar::deserialize(de)? {
            Scalar::Bool(b) => Ok(b),
            Scalar::Unsigned(1) => Ok(true),
            Scalar::Unsigned(0) => Ok(false),
            Scalar::Unsigned(n) => Err(D::Error::invalid_value(Unexpected::Unsigned(n), &"a boolean")),
            Scalar::Signed(n) => Err(D::Error::invalid_value(Unexpected::Signed(n), &"a boolean")),
            Scalar::Float(f) => Err(D::Error::invalid_value(Unexpected::Float(f), &"a boolean")),
            Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" | "" => Ok(false),
                _ => Err(D::Error::invalid_value(Unexpected::Str(&s), &"a boolean")),
            },
        }
    }

    /// Any scalar, rendered as text.
    pub fn text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        Ok(match Scalar::deserialize(de)? {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s,
        })
    }
}

/// Writes the default configuration to `<config_dir>/log/access.toml`.
///
/// An existing file is left untouched. Returns the file's path either way.
pub fn publish(config_dir: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let path = config_dir.as_ref().join(PUBLISHED_PATH);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            file.write_all(PUBLISHED_FILE.as_bytes())?;
            info!(path = %path.display(), "published access log config");
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "access log config already present");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(path)
}
