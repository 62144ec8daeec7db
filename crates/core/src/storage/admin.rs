use anyhow::Context;

pub async fn list_tables(pool: &sqlx::PgPool) -> anyhow::Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT table_name::TEXT FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .persistent(false)
    .fetch_all(pool)
    .await
    .context("list tables failed")
}

/// Drops every table in the current schema, including the migration ledger, in one transaction.
/// Returns the dropped table names.
pub async fn drop_tables(pool: &sqlx::PgPool) -> anyhow::Result<Vec<String>> {
    let tables = list_tables(pool).await?;
    if tables.is_empty() {
        return Ok(tables);
    }

    let mut tx = pool.begin().await.context("begin transaction failed")?;
    for table in &tables {
        let sql = format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(table));
        sqlx::query(&sql)
            .persistent(false)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("drop table {table} failed"))?;
    }
    tx.commit().await.context("commit transaction failed")?;

    tracing::info!(count = tables.len(), "dropped all tables");
    Ok(tables)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
