use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing;

use super::DatabaseError;
use crate::config;

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(Duration::from_millis(config::BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_initial.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

/// Count tables in the database (for verification)
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_all_tables() {
        let conn = open_memory_database().unwrap();
        // users, blood_requests, request_responses, donor_verifications,
        // donations, chat_messages, notifications, schema_version
        let count = count_tables(&conn).unwrap();
        assert_eq!(count, 8, "Expected 8 tables, got {count}");
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(count_tables(&conn).unwrap(), 8);
    }

    #[test]
    fn duplicate_donation_for_request_violates_unique() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name, email, role, created_at)
             VALUES ('d1', 'Donor', 'd@x', 'donor', '2026-01-01 00:00:00'),
                    ('p1', 'Patient', 'p@x', 'patient', '2026-01-01 00:00:00'),
                    ('h1', 'Hospital', 'h@x', 'hospital', '2026-01-01 00:00:00');
             INSERT INTO blood_requests (id, patient_id, blood_group, latitude, longitude, created_at)
             VALUES ('r1', 'p1', 'O-', 0.0, 0.0, '2026-01-01 00:00:00');
             INSERT INTO donations (id, donor_id, request_id, hospital_id, donation_date)
             VALUES ('x1', 'd1', 'r1', 'h1', '2026-01-01');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO donations (id, donor_id, request_id, hospital_id, donation_date)
             VALUES ('x2', 'd1', 'r1', 'h1', '2026-01-02')",
            [],
        );
        let err: DatabaseError = dup.unwrap_err().into();
        assert!(err.is_constraint_violation());
    }
}
