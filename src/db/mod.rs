pub mod migrations;
pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

/// Opens the booking store at `path` (`:memory:` in tests) and brings its schema up to date.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("failed to open booking store {path}"))?;

    // Crew and assignment rows point at bookings, so the references must be enforced
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout=5000;",
    )
    .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;
    tracing::debug!(path, "booking store ready");

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = init_db(":memory:").unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);

        let orphan = conn.execute(
            "INSERT INTO crew_assignments (id, booking_id, crew_id, status, assigned_at, updated_at)
             VALUES ('ASG_1', 'BOOK_MISSING', 'C1', 'assigned', 'x', 'x')",
            [],
        );
        assert!(orphan.is_err());
    }
}
