//! Logger settings. Each one can be overridden with a `LOG_*` environment variable.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::de::{value::Error as ValueError, DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Verbosity of the braid crates. Dependencies only log warnings and errors.
    ///
    /// Overridden by `LOG_LEVEL`.
    #[serde(default)]
    pub level: LogLevel,

    /// Overridden by `LOG_FORMAT`.
    #[serde(default)]
    pub format: LogFormat,

    /// A full `EnvFilter` directive such as `braid=trace,reqwest=debug`. Replaces `level`.
    ///
    /// Overridden by `LOG_FILTER`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// The stream log lines are written to. Query results always go to stdout.
    ///
    /// Overridden by `LOG_OUTPUT`.
    #[serde(default)]
    pub output: LogOutput,
}

impl LoggingConfig {
    /// The directive to build the subscriber's `EnvFilter` from.
    pub fn filter_directive(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => format!(
                "{},braid={level},braid_config={level},braid_dev_cli={level}",
                LogLevel::Warn,
                level = self.level
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Indented spans, for reading the dispatch of a request.
    #[default]
    PrettyTree,
    PrettyCompact,
    Json,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stderr,
    Stdout,
}

/// Parses a setting as it would be written in the configuration file, ignoring case.
fn parse_setting<T: DeserializeOwned>(value: &str) -> Result<T, ValueError> {
    T::deserialize(value.to_lowercase().into_deserializer())
}

/// Writes a setting as it is spelled in the configuration file.
fn write_setting<T: Serialize>(setting: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match serde_json::to_value(setting) {
        Ok(serde_json::Value::String(name)) => f.write_str(&name),
        _ => Err(fmt::Error),
    }
}

macro_rules! setting_conversions {
    ($($setting:ty),+) => {
        $(
            impl FromStr for $setting {
                type Err = ValueError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    parse_setting(s)
                }
            }

            impl fmt::Display for $setting {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write_setting(self, f)
                }
            }
        )+
    };
}

setting_conversions!(LogLevel, LogFormat, LogOutput);

#[cfg(test)]
mod tests {
    use super::{LogFormat, LogLevel, LogOutput, LoggingConfig};

    #[test]
    fn settings_parse_as_spelled_in_the_config_file() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Pretty-Compact".parse::<LogFormat>().unwrap(), LogFormat::PrettyCompact);
        assert_eq!("stdout".parse::<LogOutput>().unwrap(), LogOutput::Stdout);
        assert!("verbose".parse::<LogLevel>().is_err());

        assert_eq!(LogFormat::PrettyTree.to_string(), "pretty-tree");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn level_applies_to_braid_crates_only() {
        let config = LoggingConfig {
            level: LogLevel::Trace,
            ..LoggingConfig::default()
        };
        assert_eq!(
            config.filter_directive(),
            "warn,braid=trace,braid_config=trace,braid_dev_cli=trace"
        );

        let config = LoggingConfig {
            filter: Some("reqwest=debug".to_string()),
            ..config
        };
        assert_eq!(config.filter_directive(), "reqwest=debug");
    }
}
