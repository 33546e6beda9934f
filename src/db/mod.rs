//! Connection handling and the two data paths: the transactional writer and
//! the wide-select reader.

pub mod params;
pub mod result_set;

use std::collections::{BTreeMap, HashMap};

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::{debug, error, info};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::document::decompose::MappedMatrix;
use crate::error::Error;
use crate::schema::{Schema, Table};
use crate::sql;

use self::params::SqlParam;
use self::result_set::ResultSet;

/// The database handle: a connection pool plus the bootstrap DDL needed to
/// bring the orchid database and its SQL schema into existence.
pub struct OrchidDb {
    pool: Pool,
    config: DatabaseConfig,
}

impl OrchidDb {
    /// Builds the pool. Connections are created lazily, so this succeeds
    /// even before the orchid database exists; `bootstrap_database` must run
    /// before the first query against a fresh server.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, Error> {
        let pg_config = config.pool_config()?;
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.db_pool_size)
            .build()
            .map_err(|e| Error::bootstrap(format!("unable to build the connection pool: {e}")))?;
        Ok(Self {
            pool,
            config: config.clone(),
        })
    }

    /// Ensures the orchid database and SQL schema exist.
    pub async fn bootstrap_database(&self) -> Result<(), Error> {
        self.ensure_database().await?;
        let client = self.pool.get().await?;
        client
            .batch_execute(&format!(
                "create schema if not exists {0}; set search_path to {0}",
                self.config.db_schema
            ))
            .await?;
        Ok(())
    }

    /// Creates the orchid database through an administrative connection when
    /// it does not exist yet; a concurrently created duplicate counts as
    /// success.
    async fn ensure_database(&self) -> Result<(), Error> {
        let admin_config = self.config.admin_config()?;
        let (client, connection) = admin_config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("administrative connection failed: {e}");
            }
        });

        let exists = client
            .query_opt(
                "select 1 from pg_database where datname = $1",
                &[&self.config.db_name],
            )
            .await?
            .is_some();
        if exists {
            return Ok(());
        }

        info!("creating database '{}'", self.config.db_name);
        let ddl = format!(
            "create database {} template 'template1'",
            self.config.db_name
        );
        match client.execute(ddl.as_str(), &[]).await {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(&SqlState::DUPLICATE_DATABASE) => {
                debug!("database '{}' already exists", self.config.db_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Runs the schema's `CREATE TABLE` statements in insertion order.
    pub async fn create_schema_tables(&self, schema: &Schema) -> Result<(), Error> {
        let client = self.pool.get().await?;
        for statement in sql::create_tables(schema) {
            debug!("ddl: {statement}");
            client.batch_execute(&statement).await?;
        }
        Ok(())
    }

    /// Executes the decomposed row matrix inside a single transaction.
    ///
    /// Tables are visited in the schema's insertion order; every insert
    /// returns its generated id, which is cached under the table name and
    /// substituted into the foreign-key slots of later rows. The
    /// transaction is the consistency boundary: any error rolls the whole
    /// document back.
    pub async fn write(&self, schema: &Schema, matrix: &MappedMatrix) -> Result<(), Error> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;
        let statements = sql::inserts(schema);
        let mut pk_cache: HashMap<&str, i64> = HashMap::new();

        for (table, statement) in schema.tables().iter().zip(&statements) {
            let Some(rows) = matrix.get(&table.name) else {
                continue;
            };
            let prepared = txn.prepare_cached(statement).await?;
            for row in rows {
                let bound = interpolate(table, row, &pk_cache)?;
                let refs: Vec<&(dyn ToSql + Sync)> =
                    bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
                let returned = txn.query_one(&prepared, &refs).await?;
                let id: i64 = returned.try_get(0)?;
                pk_cache.insert(table.name.as_str(), id);
            }
        }

        txn.commit().await?;
        Ok(())
    }

    /// Reads a single resource by namespace and name, returning the raw
    /// result set for assembly.
    pub async fn read(
        &self,
        schema: &Schema,
        namespace: &str,
        name: &str,
    ) -> Result<ResultSet, Error> {
        let metadata = schema.get_table(&schema.table_name("metadata"))?;
        let where_columns = vec![
            (metadata.hint.clone(), "namespace".to_string()),
            (metadata.hint.clone(), "name".to_string()),
        ];
        let statement = sql::select(schema, &where_columns)?;
        debug!("query: {statement}");

        let client = self.pool.get().await?;
        let rows = client
            .query(statement.as_str(), &[&namespace, &name])
            .await?;
        ResultSet::from_rows(schema, &rows)
    }

    /// Lists resources, filtered by label equality through the metadata
    /// labels table.
    pub async fn list(
        &self,
        schema: &Schema,
        labels: &BTreeMap<String, String>,
    ) -> Result<ResultSet, Error> {
        let mut where_columns = Vec::new();
        let mut bound: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if !labels.is_empty() {
            let labels_table = schema.get_table(&schema.table_name("metadata_labels"))?;
            for (key, value) in labels {
                where_columns.push((labels_table.hint.clone(), "key".to_string()));
                where_columns.push((labels_table.hint.clone(), "value".to_string()));
                bound.push(key);
                bound.push(value);
            }
        }
        let statement = sql::select(schema, &where_columns)?;
        debug!("query: {statement}");

        let client = self.pool.get().await?;
        let rows = client.query(statement.as_str(), &bound).await?;
        ResultSet::from_rows(schema, &rows)
    }
}

/// Completes a decomposed argument list by walking the table's columns in
/// order: foreign-key slots take the cached primary key of the referenced
/// table, everything else takes the next decomposed value. A missing cached
/// id is tolerated only for nullable foreign keys (an absent optional
/// subtree); otherwise it is an invariant violation.
fn interpolate(
    table: &Table,
    row: &[SqlParam],
    pk_cache: &HashMap<&str, i64>,
) -> Result<Vec<SqlParam>, Error> {
    let mut bound = Vec::with_capacity(table.columns.len());
    let mut position = 0;
    for column in &table.columns {
        if table.is_primary_key(&column.name) {
            continue;
        }
        if let Some(target) = table.foreign_key_table(&column.name) {
            match pk_cache.get(target) {
                Some(id) => bound.push(SqlParam::BigInt(Some(*id))),
                None if !column.not_null => bound.push(SqlParam::BigInt(None)),
                None => {
                    return Err(Error::internal(format!(
                        "no cached primary key for '{target}' while binding '{}.{}'",
                        table.name, column.name
                    )))
                }
            }
        } else {
            let value = row.get(position).ok_or_else(|| {
                Error::internal(format!("too few arguments for table '{}'", table.name))
            })?;
            bound.push(value.clone());
            position += 1;
        }
    }
    if position != row.len() {
        return Err(Error::internal(format!(
            "too many arguments for table '{}'",
            table.name
        )));
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, PgType};
    use crate::jsonschema::JsonType;

    fn table() -> Table {
        let mut schema = Schema::new("cr");
        {
            let ports = schema.table_factory("cr_ports", true);
            ports.add_bigserial_pk();
            ports.add_foreign_key("cr", "cr", true);
            ports.add_column(Column::raw("name", PgType::Text, JsonType::String, false));
            ports.one_to_many = true;
        }
        schema.get_table("cr_ports").unwrap().clone()
    }

    #[test]
    fn interpolation_fills_foreign_keys_from_the_cache() {
        let table = table();
        let mut cache = HashMap::new();
        cache.insert("cr", 7_i64);

        let row = vec![SqlParam::Text(Some("http".to_string()))];
        let bound = interpolate(&table, &row, &cache).unwrap();
        assert_eq!(
            bound,
            vec![
                SqlParam::BigInt(Some(7)),
                SqlParam::Text(Some("http".to_string()))
            ]
        );
    }

    #[test]
    fn missing_cached_id_is_an_invariant_violation() {
        let table = table();
        let row = vec![SqlParam::Text(Some("http".to_string()))];
        assert!(matches!(
            interpolate(&table, &row, &HashMap::new()),
            Err(Error::Internal { .. })
        ));
    }

    #[test]
    fn missing_cached_id_for_nullable_key_binds_null() {
        let mut schema = Schema::new("cr");
        {
            let root = schema.table_factory("cr", false);
            root.add_serial_pk();
            root.add_foreign_key("spec", "cr_spec", false);
        }
        let root = schema.get_table("cr").unwrap().clone();
        let bound = interpolate(&root, &[], &HashMap::new()).unwrap();
        assert_eq!(bound, vec![SqlParam::BigInt(None)]);
    }

    #[test]
    fn surplus_arguments_are_rejected() {
        let table = table();
        let mut cache = HashMap::new();
        cache.insert("cr", 7_i64);
        let row = vec![
            SqlParam::Text(Some("http".to_string())),
            SqlParam::Text(Some("extra".to_string())),
        ];
        assert!(interpolate(&table, &row, &cache).is_err());
    }
}
