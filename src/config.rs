use clap::Parser;
use serde::Deserialize;

use crate::error::Error;

fn default_db_connection_string() -> String {
    "host=127.0.0.1 port=5432 user=postgres".to_string()
}

fn default_db_name() -> String {
    "orchid".to_string()
}

fn default_db_schema() -> String {
    "orchid".to_string()
}

const fn default_db_pool_size() -> usize {
    16
}

/// Database configuration read from command line arguments or from a config
/// file.
///
/// The connection string points at the server's administrative database
/// (usually `postgres`); the orchid database named by `db_name` is created on
/// bootstrap when missing, and all pooled connections pin their
/// `search_path` to `db_schema`.
#[derive(Parser, Deserialize, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct DatabaseConfig {
    /// Connection string for the administrative database, e.g.
    /// `host=127.0.0.1 user=postgres` or `postgres://postgres@127.0.0.1`.
    #[serde(default = "default_db_connection_string")]
    #[arg(long, default_value_t = default_db_connection_string())]
    pub db_connection_string: String,

    /// Name of the database holding all synthesized schemas.
    #[serde(default = "default_db_name")]
    #[arg(long, default_value_t = default_db_name())]
    pub db_name: String,

    /// SQL schema (namespace) the synthesized tables live in.
    #[serde(default = "default_db_schema")]
    #[arg(long, default_value_t = default_db_schema())]
    pub db_schema: String,

    /// Maximum number of pooled connections.
    #[serde(default = "default_db_pool_size")]
    #[arg(long, default_value_t = default_db_pool_size())]
    pub db_pool_size: usize,
}

impl DatabaseConfig {
    /// Driver configuration for the administrative connection used by the
    /// bootstrap DDL.
    pub fn admin_config(&self) -> Result<tokio_postgres::Config, Error> {
        if !self.db_connection_string.starts_with("postgres")
            && !self.db_connection_string.contains("host=")
        {
            return Err(Error::bootstrap(format!(
                "unsupported connection string '{}'",
                self.db_connection_string
            )));
        }
        self.db_connection_string
            .parse::<tokio_postgres::Config>()
            .map_err(Error::from)
    }

    /// Driver configuration for the pooled connections: the orchid database,
    /// with the search path pinned so unqualified table names resolve to the
    /// configured SQL schema on every connection.
    pub fn pool_config(&self) -> Result<tokio_postgres::Config, Error> {
        validate_identifier(&self.db_name)?;
        validate_identifier(&self.db_schema)?;
        let mut config = self.admin_config()?;
        config.dbname(&self.db_name);
        config.options(&format!("-csearch_path={}", self.db_schema));
        Ok(config)
    }
}

/// Database and schema names are interpolated into DDL, so they are held to
/// plain lowercase identifiers.
pub(crate) fn validate_identifier(name: &str) -> Result<(), Error> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    if head_ok && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Ok(())
    } else {
        Err(Error::bootstrap(format!(
            "'{name}' is not a valid database identifier"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            db_connection_string: "host=127.0.0.1 port=5432 user=postgres".to_string(),
            db_name: "orchid".to_string(),
            db_schema: "orchid".to_string(),
            db_pool_size: 4,
        }
    }

    #[test]
    fn pool_config_sets_database() {
        let config = config().pool_config().unwrap();
        assert_eq!(config.get_dbname(), Some("orchid"));
    }

    #[test]
    fn rejects_unsupported_connection_string() {
        let mut bad = config();
        bad.db_connection_string = "mysql://nope".to_string();
        assert!(bad.admin_config().is_err());
    }

    #[test]
    fn identifier_validation() {
        assert!(validate_identifier("orchid_test2").is_ok());
        assert!(validate_identifier("Orchid").is_err());
        assert!(validate_identifier("or chid").is_err());
        assert!(validate_identifier("").is_err());
    }
}
