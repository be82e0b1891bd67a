// snapshottool/src/store/postgres.rs
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    quote_ident, validate_identifier, validate_table_name, DataAccess, Row, StoreError, StoreResult,
    ID_COLUMN,
};

/// `DataAccess` over a PostgreSQL schema.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub async fn connect(
        db_url: &str,
        schema: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        validate_identifier(schema)?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(db_url)
            .await
            .map_err(|source| StoreError::Query {
                table: "<connect>".to_string(),
                source,
            })?;
        info!("✅ Connected to database (schema: {})", schema);
        Ok(Self::from_pool(pool, schema))
    }

    pub fn from_pool(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Verifies the connection is usable before a run starts touching tables.
    pub async fn check_connection(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Query {
                table: "<ping>".to_string(),
                source,
            })?;
        Ok(())
    }

    fn qualified(&self, table: &str) -> StoreResult<String> {
        qualified_name(&self.schema, table)
    }
}

fn qualified_name(schema: &str, table: &str) -> StoreResult<String> {
    validate_table_name(table)?;
    Ok(format!("{}.{}", quote_ident(schema), quote_ident(table)))
}

fn query_error(table: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |source| StoreError::Query {
        table: table.to_string(),
        source,
    }
}

/// Ids travel as text so integer and uuid keys share one code path.
fn id_as_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Column list in first-seen order across all rows of a batch.
fn batch_columns(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for column in row.keys() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.clone());
            }
        }
    }
    columns
}

fn build_upsert_sql(qualified_table: &str, columns: &[String], conflict_key: &str) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let updates: Vec<String> = columns
        .iter()
        .filter(|c| c.as_str() != conflict_key)
        .map(|c| format!("{0} = EXCLUDED.{0}", quote_ident(c)))
        .collect();

    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    format!(
        "INSERT INTO {table} ({cols}) SELECT {cols} FROM jsonb_populate_recordset(NULL::{table}, $1) \
         ON CONFLICT ({key}) {on_conflict}",
        table = qualified_table,
        cols = column_list,
        key = quote_ident(conflict_key),
        on_conflict = on_conflict,
    )
}

#[async_trait]
impl DataAccess for PgStore {
    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables
             WHERE table_schema = $1 AND table_type = 'BASE TABLE'
             ORDER BY table_name",
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error("information_schema.tables"))?;

        debug!("Discovered {} tables in schema {}", tables.len(), self.schema);
        Ok(tables)
    }

    async fn select_all(&self, table: &str) -> StoreResult<Vec<Row>> {
        let sql = format!("SELECT to_jsonb(t) FROM {} t", self.qualified(table)?);
        let values: Vec<Value> = sqlx::query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error(table))?;

        Ok(values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    async fn select_ids(&self, table: &str) -> StoreResult<Vec<Value>> {
        let sql = format!(
            "SELECT to_jsonb(t.{}) FROM {} t",
            quote_ident(ID_COLUMN),
            self.qualified(table)?
        );
        sqlx::query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error(table))
    }

    async fn delete_by_ids(&self, table: &str, ids: &[Value]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM {} WHERE {}::text = ANY($1)",
            self.qualified(table)?,
            quote_ident(ID_COLUMN)
        );
        let ids: Vec<String> = ids.iter().map(id_as_text).collect();
        let result = sqlx::query(&sql)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(query_error(table))?;
        Ok(result.rows_affected())
    }

    async fn upsert_by_key(&self, table: &str, rows: &[Row], conflict_key: &str) -> StoreResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        validate_identifier(conflict_key)?;
        let columns = batch_columns(rows);
        if !columns.iter().any(|c| c == conflict_key) {
            return Err(StoreError::Rejected(format!(
                "rows for {} carry no {:?} column",
                table, conflict_key
            )));
        }

        let sql = build_upsert_sql(&self.qualified(table)?, &columns, conflict_key);
        let payload = Value::Array(rows.iter().cloned().map(Value::Object).collect());
        let result = sqlx::query(&sql)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(query_error(table))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn test_batch_columns_preserves_first_seen_order() {
        let rows = vec![
            row(json!({"id": 1, "name": "a"})),
            row(json!({"id": 2, "parent_id": 1, "name": "b"})),
        ];
        assert_eq!(batch_columns(&rows), vec!["id", "name", "parent_id"]);
    }

    #[test]
    fn test_build_upsert_sql_updates_non_key_columns() {
        let sql = build_upsert_sql(
            "\"public\".\"items\"",
            &["id".to_string(), "name".to_string()],
            "id",
        );
        assert!(sql.starts_with("INSERT INTO \"public\".\"items\" (\"id\", \"name\")"));
        assert!(sql.contains("jsonb_populate_recordset(NULL::\"public\".\"items\", $1)"));
        assert!(sql.ends_with("ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""));
    }

    #[test]
    fn test_build_upsert_sql_key_only_does_nothing_on_conflict() {
        let sql = build_upsert_sql("\"public\".\"tags\"", &["id".to_string()], "id");
        assert!(sql.ends_with("ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn test_qualified_name_quotes_catalog_names() {
        assert_eq!(
            qualified_name("public", "user-profiles").unwrap(),
            "\"public\".\"user-profiles\""
        );
        assert_eq!(
            qualified_name("public", "x\"; DROP TABLE requests; --").unwrap(),
            "\"public\".\"x\"\"; DROP TABLE requests; --\""
        );
        assert!(qualified_name("public", "").is_err());
    }

    #[test]
    fn test_id_as_text() {
        assert_eq!(id_as_text(&json!(42)), "42");
        assert_eq!(id_as_text(&json!("4f1c")), "4f1c");
    }
}
