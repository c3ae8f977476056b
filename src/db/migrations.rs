use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Applied in order; the schema version is the number of entries applied.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "history_logs",
        sql: include_str!("schemas/schema_v1.sql"),
    },
    Migration {
        name: "profiles",
        sql: include_str!("schemas/schema_v2.sql"),
    },
];

fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

fn stored_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")
}

/// Bring the schema up to date in a single transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let from = stored_version(conn)?;
    let target = schema_version();

    if from > target {
        bail!("database schema v{from} is newer than this build understands (v{target})");
    }

    let pending = MIGRATIONS.iter().zip(1..).skip(from.max(0) as usize);
    let tx = conn.transaction().context("failed to begin migration")?;
    for (migration, version) in pending {
        tx.execute_batch(migration.sql)
            .with_context(|| format!("schema v{version} ({}) failed", migration.name))?;
        info!("Applied schema v{version} ({})", migration.name);
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to record schema version")?;
    tx.commit().context("failed to commit migration")
}
