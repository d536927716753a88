use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::upscale::DEFAULT_TARGET_WIDTH;

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Parent directory of the per-request scratch directories.
    pub scratch_root: PathBuf,
    pub target_width: u32,
    /// Leave scratch directories on disk after responding.
    pub keep_scratch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            scratch_root: PathBuf::from("./scratch"),
            target_width: DEFAULT_TARGET_WIDTH,
            keep_scratch: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let target_width = parse_var(&lookup, "QR_ART_TARGET_WIDTH", defaults.target_width)?;
        if target_width == 0 {
            return Err(ConfigError::Invalid {
                var: "QR_ART_TARGET_WIDTH",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            host: parse_var(&lookup, "QR_ART_HOST", defaults.host)?,
            port: parse_var(&lookup, "QR_ART_PORT", defaults.port)?,
            scratch_root: lookup("QR_ART_SCRATCH_ROOT")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            target_width,
            keep_scratch: match lookup("QR_ART_KEEP_SCRATCH") {
                Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::Invalid {
                    var: "QR_ART_KEEP_SCRATCH",
                    value,
                    reason: "expected a boolean".to_string(),
                })?,
                None => defaults.keep_scratch,
            },
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            var,
            reason: err.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Lenient boolean parsing shared by config and form fields.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
