use std::error::Error as StdError;
use std::fmt;
use std::fmt::Display;

use deadpool_postgres::PoolError;
use tokio_postgres::error::Error as PgError;

/// All failure modes of the engine.
///
/// The variants group into the families the components report: schema
/// synthesis, document validation, the not-found family, decomposition,
/// database transport, bootstrap, and internal invariant violations. The
/// writer rolls back on any of these and returns the original cause
/// unwrapped.
#[derive(Debug)]
pub enum Error {
    /// The registered JSON-Schema is unsupported or malformed at `path`.
    SchemaSynthesis { path: String, detail: String },
    /// The document does not conform to the registered schema.
    Validation { detail: String },
    /// No table with this name exists in the schema.
    UnknownTable { name: String },
    /// No resource-definition is registered for the GVK.
    DefinitionNotFound { gvk: String },
    /// No stored resource matches the namespaced name.
    ResourceNotFound {
        gvk: String,
        namespace: String,
        name: String,
    },
    /// A result set held no row for the primary key.
    NoRowForPrimaryKey { table: String, pk: i64 },
    /// A result set held more than one row for the primary key.
    AmbiguousPrimaryKey { table: String, pk: i64 },
    /// The document cannot be decomposed against the schema at `path`.
    Decomposition { path: String, detail: String },
    /// Transport or SQL failure reported by the driver.
    Postgres(PgError),
    /// Failure checking a connection out of the pool.
    Pool(PoolError),
    /// The database, schema, or search path cannot be established.
    Bootstrap { detail: String },
    /// An engine invariant was violated.
    Internal { detail: String },
}

impl Error {
    pub fn synthesis(path: &[String], detail: impl Into<String>) -> Self {
        Self::SchemaSynthesis {
            path: path_string(path),
            detail: detail.into(),
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
        }
    }

    pub fn decomposition(path: &[String], detail: impl Into<String>) -> Self {
        Self::Decomposition {
            path: path_string(path),
            detail: detail.into(),
        }
    }

    pub fn bootstrap(detail: impl Into<String>) -> Self {
        Self::Bootstrap {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Whether the error belongs to the not-found family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownTable { .. }
                | Self::DefinitionNotFound { .. }
                | Self::ResourceNotFound { .. }
                | Self::NoRowForPrimaryKey { .. }
        )
    }
}

/// Renders a document path for error messages; the empty path is the root.
pub(crate) fn path_string(path: &[String]) -> String {
    if path.is_empty() {
        ".".to_string()
    } else {
        path.join(".")
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaSynthesis { path, detail } => {
                write!(f, "unsupported JSON-Schema at '{path}': {detail}")
            }
            Self::Validation { detail } => {
                write!(f, "document failed validation: {detail}")
            }
            Self::UnknownTable { name } => {
                write!(f, "unknown table '{name}' in schema")
            }
            Self::DefinitionNotFound { gvk } => {
                write!(f, "no resource-definition registered for '{gvk}'")
            }
            Self::ResourceNotFound {
                gvk,
                namespace,
                name,
            } => {
                write!(f, "resource '{namespace}/{name}' of '{gvk}' not found")
            }
            Self::NoRowForPrimaryKey { table, pk } => {
                write!(f, "no row in '{table}' for id {pk}")
            }
            Self::AmbiguousPrimaryKey { table, pk } => {
                write!(f, "more than one row in '{table}' for id {pk}")
            }
            Self::Decomposition { path, detail } => {
                write!(f, "cannot decompose document at '{path}': {detail}")
            }
            Self::Postgres(error) => {
                write!(f, "database error: {error}")
            }
            Self::Pool(error) => {
                write!(f, "connection pool error: {error}")
            }
            Self::Bootstrap { detail } => {
                write!(f, "bootstrap failed: {detail}")
            }
            Self::Internal { detail } => {
                write!(f, "internal error: {detail}")
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Postgres(error) => Some(error),
            Self::Pool(error) => Some(error),
            _ => None,
        }
    }
}

impl From<PgError> for Error {
    fn from(error: PgError) -> Self {
        Self::Postgres(error)
    }
}

impl From<PoolError> for Error {
    fn from(error: PoolError) -> Self {
        Self::Pool(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_rendering() {
        assert_eq!(path_string(&[]), ".");
        assert_eq!(
            path_string(&["spec".to_string(), "ports".to_string()]),
            "spec.ports"
        );
    }

    #[test]
    fn not_found_family() {
        assert!(Error::UnknownTable {
            name: "t".to_string()
        }
        .is_not_found());
        assert!(!Error::internal("x").is_not_found());
    }
}
