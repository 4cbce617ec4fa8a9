use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "school.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    create_schema(&conn)?;
    tracing::info!(path = %db_path.to_string_lossy(), "workspace database ready");
    Ok(conn)
}

pub fn create_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id INTEGER PRIMARY KEY,
            class_name TEXT NOT NULL,
            level TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            student_name TEXT NOT NULL,
            age INTEGER NOT NULL,
            year_enrolled INTEGER NOT NULL,
            graduating_year INTEGER NOT NULL,
            class_id INTEGER,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(student_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS clubs(
            id INTEGER PRIMARY KEY,
            club_name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activities(
            id INTEGER PRIMARY KEY,
            start_date TEXT NOT NULL,
            end_date TEXT,
            description TEXT NOT NULL
        )",
        [],
    )?;

    // Junction tables: one row per (student, owner) pair.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_club(
            student_id INTEGER NOT NULL,
            club_id INTEGER NOT NULL,
            role TEXT,
            PRIMARY KEY(student_id, club_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(club_id) REFERENCES clubs(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_club_club ON student_club(club_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_activity(
            student_id INTEGER NOT NULL,
            activity_id INTEGER NOT NULL,
            category TEXT,
            role TEXT,
            award TEXT,
            hours INTEGER,
            PRIMARY KEY(student_id, activity_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(activity_id) REFERENCES activities(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_activity_activity ON student_activity(activity_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        create_schema(&conn).expect("first");
        create_schema(&conn).expect("second");
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |r| r.get(0),
            )
            .expect("count tables");
        assert_eq!(n, 6);
    }
}
