//! LanceDB connection and housekeeping helpers.
use anyhow::Result;
use lancedb::{connect, Connection};

use arrow_array::RecordBatchIterator;
use std::sync::Arc;

use crate::schema::build_hierarchy_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

pub async fn ensure_hierarchy_table(conn: &Connection, name: &str, dim: i32) -> Result<()> {
    ensure_table(conn, name, build_hierarchy_schema(dim)).await
}

/// Quote a value for use inside a LanceDB SQL filter.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
