//! Orchid stores and serves resources whose shape is declared at runtime by a
//! JSON-Schema document, using PostgreSQL as the backing store.
//!
//! A client registers a *resource-definition* document naming a
//! GroupVersionKind and carrying an OpenAPI v3 schema; Orchid synthesizes a
//! relational schema for it (tables, columns, foreign keys, uniqueness),
//! decomposes incoming documents into per-table rows, writes them inside a
//! single transaction while threading generated primary keys through
//! foreign-key slots, and reassembles nested documents from `LEFT JOIN`
//! result sets.
//!
//! The [`repository::Repository`] is the orchestration front-end; everything
//! else is the machinery it drives:
//!
//! - [`jsonschema`]: the JSON-Schema document model and built-in schemas;
//! - [`schema`]: the relational schema model and the synthesizer;
//! - [`sql`]: `CREATE TABLE` / `INSERT` / `SELECT` statement emitters;
//! - [`document`]: decomposition into row matrices and reassembly;
//! - [`db`]: connection pool, bootstrap DDL, transactional writer, reader.

pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod jsonschema;
pub mod logging;
pub mod repository;
pub mod schema;
pub mod sql;
pub mod validator;

pub use error::Error;
