use super::*;

#[test]
fn test_schema_persists_across_connections() -> anyhow::Result<()> {
    let database = TempDatabase::with_schema("CREATE TABLE notes (body TEXT NOT NULL);")?;
    assert!(database.path().exists());

    let connection = database.open()?;
    connection.execute_batch("INSERT INTO notes (body) VALUES ('hi');")?;

    let count: i64 = database
        .open()?
        .inner()
        .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
    assert_eq!(count, 1);
    Ok(())
}

#[test]
fn test_config_points_at_file() -> anyhow::Result<()> {
    let database = TempDatabase::new()?;
    let config = database.config();
    assert_eq!(config.backend, BackendKind::Embedded);
    assert_eq!(config.database_path.as_deref(), Some(database.path()));
    assert!(config.validate().is_ok());
    Ok(())
}

#[test]
fn test_directory_removed_on_drop() -> anyhow::Result<()> {
    let database = TempDatabase::new()?;
    let dir = database.temp_dir.path().to_path_buf();
    database.open()?;
    drop(database);
    assert!(!dir.exists());
    Ok(())
}
