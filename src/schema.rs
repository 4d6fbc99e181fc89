//! Target table management.
//!
//! The table's existence and shape are owned exclusively by this module, and
//! only before dispatch: [`ensure_table`] must complete and commit before any
//! loader connection touches the table. During the load the table is
//! append-only.

use sqlx::PgPool;

use crate::error::SchemaError;
use crate::infer::ColumnSpec;

/// Quote an identifier for interpolation into dynamic DDL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render the create statement: one column per spec, in header order.
pub fn build_create_table(table: &str, columns: &[ColumnSpec]) -> String {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|col| format!("{} {}", quote_ident(&col.name), col.sql_type.ddl()))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table),
        column_defs.join(", ")
    )
}

/// Create the target table if absent, then truncate it so the load starts
/// from empty. Both statements run in one transaction; any rejection (bad
/// connection, conflicting existing schema) surfaces as [`SchemaError`].
pub async fn ensure_table(
    pool: &PgPool,
    table: &str,
    columns: &[ColumnSpec],
) -> Result<(), SchemaError> {
    log::info!("ensuring table \"{}\" with {} columns", table, columns.len());

    let mut tx = pool.begin().await?;

    sqlx::query(&build_create_table(table, columns))
        .execute(&mut *tx)
        .await?;

    sqlx::query(&format!("TRUNCATE TABLE {}", quote_ident(table)))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!("table \"{}\" ready and empty", table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::SqlType;

    #[test]
    fn create_statement_lists_columns_in_order() {
        let columns = vec![
            ColumnSpec {
                name: "id".to_string(),
                sql_type: SqlType::Integer,
            },
            ColumnSpec {
                name: "amount".to_string(),
                sql_type: SqlType::DoublePrecision,
            },
            ColumnSpec {
                name: "ts".to_string(),
                sql_type: SqlType::Timestamp,
            },
        ];

        assert_eq!(
            build_create_table("excel_data", &columns),
            "CREATE TABLE IF NOT EXISTS \"excel_data\" \
             (\"id\" INTEGER, \"amount\" DOUBLE PRECISION, \"ts\" TIMESTAMP)"
        );
    }

    #[test]
    fn identifiers_with_quotes_are_escaped() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
