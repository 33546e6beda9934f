fn quoted(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A table constraint, rendered inline in `CREATE TABLE` since the schema's
/// insertion order already satisfies dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    PrimaryKey {
        column: String,
    },
    ForeignKey {
        column: String,
        ref_table: String,
        ref_column: String,
    },
    /// Unique over one or more columns; composite for list-map-keys.
    Unique {
        columns: Vec<String>,
    },
}

impl Constraint {
    pub fn render(&self) -> String {
        match self {
            Self::PrimaryKey { column } => format!("primary key (\"{column}\")"),
            Self::ForeignKey {
                column,
                ref_table,
                ref_column,
            } => {
                format!("foreign key (\"{column}\") references {ref_table} (\"{ref_column}\")")
            }
            Self::Unique { columns } => format!("unique ({})", quoted(columns)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering() {
        let pk = Constraint::PrimaryKey {
            column: "id".to_string(),
        };
        assert_eq!(pk.render(), "primary key (\"id\")");

        let fk = Constraint::ForeignKey {
            column: "cr_spec".to_string(),
            ref_table: "cr_spec".to_string(),
            ref_column: "id".to_string(),
        };
        assert_eq!(
            fk.render(),
            "foreign key (\"cr_spec\") references cr_spec (\"id\")"
        );
    }

    #[test]
    fn composite_unique() {
        let unique = Constraint::Unique {
            columns: vec!["name".to_string(), "port".to_string()],
        };
        assert_eq!(unique.render(), "unique (\"name\", \"port\")");
    }
}
