use figment::{providers::Env, Figment};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::PathBuf;

use crate::error::RecordError;

/// How the record functions reach the cluster. One per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Direct,
    DataApi,
}

/// Which AWS signer produces the IAM database token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlavour {
    Rds,
    Dsql,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    db_mode: Option<Mode>,
    #[serde(default, deserialize_with = "text")]
    db_name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    cluster_endpoint: Option<String>,
    db_port: Option<u16>,
    #[serde(default, deserialize_with = "text")]
    db_user: Option<String>,
    db_auth_flavour: Option<AuthFlavour>,
    db_ssl_root_cert: Option<PathBuf>,
    #[serde(default, deserialize_with = "text")]
    cluster_arn: Option<String>,
    #[serde(default, deserialize_with = "text")]
    secret_arn: Option<String>,
}

/// The env provider types values that look like numbers or booleans
/// (`DB_USER=1001`); names are always taken as text.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.map(|value| match value {
        Value::String(s) => s,
        other => other.to_string(),
    }))
}

const KEYS: &[&str] = &[
    "db_mode",
    "db_name",
    "cluster_endpoint",
    "db_port",
    "db_user",
    "db_auth_flavour",
    "db_ssl_root_cert",
    "cluster_arn",
    "secret_arn",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub auth: AuthFlavour,
    pub ssl_root_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataApiSettings {
    pub cluster_arn: String,
    pub secret_arn: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settings {
    Direct(DirectSettings),
    DataApi(DataApiSettings),
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, RecordError> {
        Self::from_figment(Figment::new().merge(Env::raw().only(KEYS)))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, RecordError> {
        let raw: RawSettings = figment.extract()?;
        let database = required(raw.db_name, "DB_NAME")?;

        match raw.db_mode.unwrap_or(Mode::Direct) {
            Mode::Direct => Ok(Settings::Direct(DirectSettings {
                host: required(raw.cluster_endpoint, "CLUSTER_ENDPOINT")?,
                port: raw.db_port.unwrap_or(5432),
                user: required(raw.db_user, "DB_USER")?,
                database,
                auth: raw.db_auth_flavour.unwrap_or(AuthFlavour::Rds),
                ssl_root_cert: raw.db_ssl_root_cert,
            })),
            Mode::DataApi => Ok(Settings::DataApi(DataApiSettings {
                cluster_arn: required(raw.cluster_arn, "CLUSTER_ARN")?,
                secret_arn: required(raw.secret_arn, "SECRET_ARN")?,
                database,
            })),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Settings::Direct(_) => Mode::Direct,
            Settings::DataApi(_) => Mode::DataApi,
        }
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, RecordError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RecordError::Config(format!("{name} not set"))),
    }
}
