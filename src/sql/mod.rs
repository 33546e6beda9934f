//! Statement synthesis from a schema model.
//!
//! All identifiers that originate in a JSON-Schema are double-quoted, since
//! property names are carried into column names verbatim (including case).
//! Statements are positional (`$1`, `$2`, …); binding happens in the writer
//! and reader.

use std::collections::VecDeque;

use crate::error::Error;
use crate::schema::{Constraint, Schema, PK_COLUMN};

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

/// One `CREATE TABLE` statement per table, in the schema's insertion order;
/// constraints are rendered inline since that order already satisfies
/// dependencies.
pub fn create_tables(schema: &Schema) -> Vec<String> {
    schema
        .tables()
        .iter()
        .map(|table| {
            let mut clauses: Vec<String> = table.columns.iter().map(|c| c.render()).collect();
            clauses.extend(table.constraints.iter().map(Constraint::render));
            format!(
                "create table if not exists {} ({})",
                table.name,
                clauses.join(", ")
            )
        })
        .collect()
}

/// One positional insert statement per table, aligned with the schema's
/// insertion order. The primary key never appears (it is generated and read
/// back through `returning`); foreign-key columns do, and are bound by the
/// writer from its primary-key cache.
pub fn inserts(schema: &Schema) -> Vec<String> {
    schema
        .tables()
        .iter()
        .map(|table| {
            let columns = table.insert_columns();
            let names: Vec<String> = columns.iter().map(|c| quote(&c.name)).collect();
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("${i}")).collect();
            format!(
                "insert into {} ({}) values ({}) returning {}",
                table.name,
                names.join(", "),
                placeholders.join(", "),
                quote(PK_COLUMN)
            )
        })
        .collect()
}

/// The wide select over every table of the schema.
///
/// Every column is aliased `"hint"."col" as "hint.col"` so the reader can
/// split rows back into per-table entries. One `left join` is emitted per
/// foreign key: joins made while visiting a one-to-many child are appended
/// (the parent side is already introduced), all others are prepended so a
/// referenced one-to-one child is introduced before its referrer's own
/// join appears.
///
/// `where_columns` is an ordered list of `(hint, column)` pairs, each bound
/// to the next positional parameter.
pub fn select(schema: &Schema, where_columns: &[(String, String)]) -> Result<String, Error> {
    let root = schema.get_table(schema.name())?;

    let mut selected = Vec::new();
    for table in schema.tables() {
        for column in &table.columns {
            selected.push(format!(
                "{}.{} as \"{}.{}\"",
                quote(&table.hint),
                quote(&column.name),
                table.hint,
                column.name
            ));
        }
    }

    let mut joins: VecDeque<String> = VecDeque::new();
    for table in schema.tables() {
        if table.name == root.name {
            continue;
        }
        for (column, ref_table, ref_column) in table.foreign_keys() {
            let target = schema.get_table(ref_table)?;
            if table.one_to_many {
                // this table holds the key: the join introduces either the
                // table itself (parent link) or its one-to-one child
                let introduced = if column == ref_table { table } else { target };
                joins.push_back(format!(
                    "left join {} as {} on {}.{} = {}.{}",
                    introduced.name,
                    quote(&introduced.hint),
                    quote(&table.hint),
                    quote(column),
                    quote(&target.hint),
                    quote(ref_column)
                ));
            } else {
                joins.push_front(format!(
                    "left join {} as {} on {}.{} = {}.{}",
                    target.name,
                    quote(&target.hint),
                    quote(&table.hint),
                    quote(column),
                    quote(&target.hint),
                    quote(ref_column)
                ));
            }
        }
    }
    // the root's own joins go first: they introduce its one-to-one children
    for (column, ref_table, ref_column) in root.foreign_keys().collect::<Vec<_>>().into_iter().rev()
    {
        let target = schema.get_table(ref_table)?;
        joins.push_front(format!(
            "left join {} as {} on {}.{} = {}.{}",
            target.name,
            quote(&target.hint),
            quote(&root.hint),
            quote(column),
            quote(&target.hint),
            quote(ref_column)
        ));
    }

    let mut statement = format!(
        "select {} from {} as {}",
        selected.join(", "),
        root.name,
        quote(&root.hint)
    );
    for join in joins {
        statement.push(' ');
        statement.push_str(&join);
    }

    if !where_columns.is_empty() {
        let clauses: Vec<String> = where_columns
            .iter()
            .enumerate()
            .map(|(i, (hint, column))| format!("{}.{} = ${}", quote(hint), quote(column), i + 1))
            .collect();
        statement.push_str(" where ");
        statement.push_str(&clauses.join(" and "));
    }

    Ok(statement)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::jsonschema::JsonSchemaProps;

    fn schema() -> Schema {
        let openapi: JsonSchemaProps = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "spec": {
                    "type": "object",
                    "required": ["simple"],
                    "properties": {
                        "simple": {"type": "string"},
                        "complex": {
                            "type": "object",
                            "properties": {"attribute": {"type": "string"}}
                        },
                        "ports": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {"name": {"type": "string"}}
                            }
                        }
                    }
                }
            }
        }))
        .unwrap();
        let mut schema = Schema::new("cr");
        schema.generate(&openapi).unwrap();
        schema
    }

    #[test]
    fn create_statements_follow_insertion_order() {
        let schema = schema();
        let statements = create_tables(&schema);
        assert_eq!(statements.len(), schema.tables().len());

        for (table, statement) in schema.tables().iter().zip(&statements) {
            assert!(statement.starts_with(&format!("create table if not exists {} (", table.name)));
            assert!(statement.contains("primary key (\"id\")"));
        }

        // a one-to-one parent renders the unique foreign-key pair
        let spec_statement = statements[schema
            .tables()
            .iter()
            .position(|t| t.name == "cr_spec")
            .unwrap()]
        .clone();
        assert!(spec_statement.contains("\"complex\" bigint"));
        assert!(spec_statement
            .contains("foreign key (\"complex\") references cr_spec_complex (\"id\")"));
        assert!(spec_statement.contains("unique (\"complex\")"));
    }

    #[test]
    fn insert_statements_exclude_the_primary_key() {
        let schema = schema();
        let statements = inserts(&schema);

        let ports_position = schema
            .tables()
            .iter()
            .position(|t| t.name == "cr_spec_ports")
            .unwrap();
        assert_eq!(
            statements[ports_position],
            "insert into cr_spec_ports (\"cr_spec\", \"name\") values ($1, $2) returning \"id\""
        );
        for statement in &statements {
            assert!(!statement.contains("(\"id\""));
            assert!(statement.ends_with("returning \"id\""));
        }
    }

    #[test]
    fn select_aliases_and_joins() {
        let schema = schema();
        let statement = select(&schema, &[]).unwrap();

        let root_hint = &schema.get_table("cr").unwrap().hint;
        assert!(statement.starts_with("select "));
        assert!(statement.contains(&format!(" from cr as \"{root_hint}\"")));

        // every join target must be introduced before it is referenced
        let mut introduced = vec![root_hint.clone()];
        let tail = statement.split(" from ").nth(1).unwrap();
        for join in tail.split(" left join ").skip(1) {
            // shape: `<table> as "<hint>" on "<a>"."col" = "<b>"."id"`
            let alias = join.split(" as \"").nth(1).unwrap();
            let hint = alias.split('"').next().unwrap().to_string();
            let condition = join.split(" on ").nth(1).unwrap();
            for side in condition.split(" = ") {
                let used = side.trim_start_matches('"');
                let used_hint = used.split('"').next().unwrap().to_string();
                assert!(
                    used_hint == hint || introduced.contains(&used_hint),
                    "hint '{used_hint}' used before being introduced in: {statement}"
                );
            }
            introduced.push(hint);
        }

        // all tables participate
        for table in schema.tables() {
            assert!(statement.contains(&format!("\"{}\".\"id\" as \"{}.id\"", table.hint, table.hint)));
        }
    }

    #[test]
    fn select_renders_positional_where_clauses() {
        let schema = schema();
        let metadata_hint = schema.get_table("cr_metadata").unwrap().hint.clone();
        let where_columns = vec![
            (metadata_hint.clone(), "namespace".to_string()),
            (metadata_hint.clone(), "name".to_string()),
        ];
        let statement = select(&schema, &where_columns).unwrap();
        assert!(statement.ends_with(&format!(
            "where \"{metadata_hint}\".\"namespace\" = $1 and \"{metadata_hint}\".\"name\" = $2"
        )));
    }
}
