use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult};
use crate::sql::connection::{ConnectionConfig, DatabaseKind, ServerParams};

/// Environment-backed settings, read once at session start
///
/// `.env` loading happens in the binary before this is built; every field
/// can also be overridden by a CLI flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Model endpoint API key (GOOGLE_API_KEY)
    pub api_key: Option<String>,
    /// Model identifier (ASKDB_MODEL)
    pub model: Option<String>,
    /// Sampling temperature (ASKDB_TEMPERATURE)
    pub temperature: Option<f32>,
    /// Default database file for the embedded engine (DB_PATH)
    pub db_path: Option<PathBuf>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> AgentResult<Self> {
        Ok(Self {
            api_key: read("GOOGLE_API_KEY"),
            model: read("ASKDB_MODEL"),
            temperature: read("ASKDB_TEMPERATURE")
                .map(|v| {
                    v.parse::<f32>().map_err(|_| {
                        AgentError::config(format!("ASKDB_TEMPERATURE is not a number: {}", v))
                    })
                })
                .transpose()?,
            db_path: read("DB_PATH").map(PathBuf::from),
            db_host: read("DB_HOST"),
            db_port: read("DB_PORT")
                .map(|v| {
                    v.parse::<u16>().map_err(|_| {
                        AgentError::config(format!("DB_PORT is not a valid port: {}", v))
                    })
                })
                .transpose()?,
            db_name: read("DB_NAME"),
            db_user: read("DB_USER"),
            db_password: read("DB_PASSWORD"),
        })
    }

    /// Assemble the connection config for the requested engine
    ///
    /// The embedded engine needs only a file path (none means in-memory);
    /// the client/server engines require a database name and user, with
    /// host and port falling back to the engine's conventional defaults.
    pub fn connection_config(&self, kind: DatabaseKind) -> AgentResult<ConnectionConfig> {
        match kind {
            DatabaseKind::Sqlite => Ok(ConnectionConfig::Sqlite {
                path: self.db_path.clone(),
            }),
            DatabaseKind::MySql => Ok(ConnectionConfig::MySql(self.server_params(kind, 3306)?)),
            DatabaseKind::Postgres => {
                Ok(ConnectionConfig::Postgres(self.server_params(kind, 5432)?))
            }
        }
    }

    fn server_params(&self, kind: DatabaseKind, default_port: u16) -> AgentResult<ServerParams> {
        let database = self.db_name.clone().ok_or_else(|| {
            AgentError::config(format!(
                "DB_NAME is required for {} connections",
                kind.dialect_name()
            ))
        })?;
        let user = self.db_user.clone().ok_or_else(|| {
            AgentError::config(format!(
                "DB_USER is required for {} connections",
                kind.dialect_name()
            ))
        })?;

        Ok(ServerParams {
            host: self.db_host.clone().unwrap_or_else(|| "localhost".to_string()),
            port: self.db_port.unwrap_or(default_port),
            database,
            user,
            password: self.db_password.clone().unwrap_or_default(),
        })
    }
}

fn read(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
