//! Statement facade tests: DDL through fragments, insert/select/update/delete,
//! table probing and server time.

use anyhow::{Context, Result};
use datagate_core::{Fragment, Inserted, SqlErrorKind, Value};
use datagate_drivers::Sql;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::fixtures::{TestDriver, drop_table, test_sql, unique_name};

/// Create the scratch table used by most tests in this module
fn create_fruit_table(sql: &mut Sql, dbtype: TestDriver) -> Result<String> {
    let table = unique_name("fruit");
    // MySQL does not accept an expression as a column default
    let default_time = match dbtype {
        TestDriver::Mysql => "CURRENT_TIMESTAMP".to_string(),
        _ => sql.stmt_fragment("datetime", &[("delta", Value::from(3600))]),
    };
    let stmt = format!(
        "CREATE TABLE {} (
            id {},
            name VARCHAR(64),
            value INTEGER,
            time TIMESTAMP NOT NULL DEFAULT {}
        ) {}",
        table,
        sql.stmt_fragment("index", &[]),
        default_time,
        sql.stmt_fragment("engine", &[])
    );
    sql.query_raw(&stmt, &[])
        .with_context(|| format!("failed to create {}", table))?;
    Ok(table)
}

fn fruit(name: &str, value: i64) -> Vec<(&'static str, Value)> {
    vec![("name", Value::from(name)), ("value", Value::from(value))]
}

fn fragments_build_valid_ddl(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;

    assert_eq!(db.sql.stmt_fragment("unknown", &[]), "");

    let table = create_fruit_table(&mut db.sql, driver)?;
    assert!(db.sql.table_exists(&table)?);
    drop_table(&mut db.sql, &table);
    Ok(())
}

#[test]
fn test_fragments_build_valid_ddl_sqlite() -> Result<()> {
    fragments_build_valid_ddl(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_fragments_build_valid_ddl(#[case] driver: TestDriver) -> Result<()> {
    fragments_build_valid_ddl(driver)
}

/// The datetime fragment is "now + delta" on the server clock
fn datetime_fragment(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;

    let mut stamps = Vec::new();
    for delta in [-3600, 0, 3600] {
        let expr = db.sql.fragment(Fragment::Datetime { delta });
        let row = db
            .sql
            .query(&format!("SELECT {} AS time", expr), &[])?
            .context("no row")?;
        let time = row
            .get_by_name("time")
            .and_then(Value::as_datetime)
            .with_context(|| format!("not a timestamp: {:?}", row.get_by_name("time")))?;
        stamps.push(time.and_utc().timestamp());
    }

    let (past, present, future) = (stamps[0], stamps[1], stamps[2]);
    assert!((future - present - 3600).abs() < 2, "future drifted");
    assert!((present - past - 3600).abs() < 2, "past drifted");
    Ok(())
}

#[test]
fn test_datetime_fragment_sqlite() -> Result<()> {
    datetime_fragment(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_datetime_fragment(#[case] driver: TestDriver) -> Result<()> {
    datetime_fragment(driver)
}

/// Generated keys count up from 1 in insertion order
fn insert_returns_sequential_ids(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;
    let table = create_fruit_table(&mut db.sql, driver)?;

    let mut ids = Vec::new();
    for (name, value) in [("apple", 2), ("banana", 0), ("cucumber", 3), ("durian", 9)] {
        let inserted = db.sql.insert(&table, &fruit(name, value), Some("id"))?;
        ids.push(inserted.as_i64().context("insert did not return an id")?);
    }
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let rows = db
        .sql
        .query_multiple(&format!("SELECT id, name FROM {} ORDER BY id", table), &[])?;
    let names: Vec<&str> = rows
        .iter()
        .filter_map(|row| row.get_by_name("name").and_then(Value::as_str))
        .collect();
    assert_eq!(names, vec!["apple", "banana", "cucumber", "durian"]);

    drop_table(&mut db.sql, &table);
    Ok(())
}

#[test]
fn test_insert_returns_sequential_ids_sqlite() -> Result<()> {
    insert_returns_sequential_ids(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_insert_returns_sequential_ids(#[case] driver: TestDriver) -> Result<()> {
    insert_returns_sequential_ids(driver)
}

fn insert_into_wrong_table_or_column(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;
    let table = create_fruit_table(&mut db.sql, driver)?;

    let err = db
        .sql
        .insert("wrong_table", &[("a", Value::from("b"))], None)
        .unwrap_err();
    assert_eq!(err.kind(), SqlErrorKind::Execution);
    assert!(err.statement().is_some_and(|s| s.starts_with("INSERT INTO wrong_table (a)")));
    assert_eq!(err.args(), &[Value::from("b")]);

    let err = db
        .sql
        .insert(&table, &[("a", Value::from("b"))], None)
        .unwrap_err();
    assert_eq!(err.kind(), SqlErrorKind::Execution);

    drop_table(&mut db.sql, &table);
    Ok(())
}

#[test]
fn test_insert_into_wrong_table_or_column_sqlite() -> Result<()> {
    insert_into_wrong_table_or_column(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_insert_into_wrong_table_or_column(#[case] driver: TestDriver) -> Result<()> {
    insert_into_wrong_table_or_column(driver)
}

/// pgsql hands back the named column or the whole row
#[test]
#[ignore = "requires docker"]
fn test_insert_returning() -> Result<()> {
    let mut db = test_sql(TestDriver::Postgres)?;
    let table = create_fruit_table(&mut db.sql, TestDriver::Postgres)?;

    let value = db.sql.insert(&table, &fruit("eggplant", 8), Some("value"))?;
    assert_eq!(value.as_i64(), Some(8));

    let row = match db.sql.insert(&table, &fruit("eggplant", 8), None)? {
        Inserted::Row(row) => row,
        other => panic!("expected the whole row, got {:?}", other),
    };
    assert_eq!(row.get_by_name("value").and_then(Value::as_i64), Some(8));
    assert_eq!(row.get_by_name("id").and_then(Value::as_i64), Some(2));

    let err = db
        .sql
        .insert(&table, &fruit("eggplant", 8), Some("address"))
        .unwrap_err();
    assert_eq!(err.kind(), SqlErrorKind::Execution);

    drop_table(&mut db.sql, &table);
    Ok(())
}

/// SQLite stores whatever it is given
#[test]
fn test_sqlite_has_no_type_coercion() -> Result<()> {
    let mut db = test_sql(TestDriver::Sqlite)?;
    let table = create_fruit_table(&mut db.sql, TestDriver::Sqlite)?;

    let id = db
        .sql
        .insert(&table, &[("name", Value::from("eggplant")), ("value", Value::from("a"))], None)?;
    let row = db
        .sql
        .query(&format!("SELECT value FROM {} WHERE id = ?", table), &[id.id().cloned().unwrap_or(Value::Null)])?
        .context("row missing")?;
    assert_eq!(row.get(0), Some(&Value::from("a")));
    Ok(())
}

fn select(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;

    assert!(!db.sql.table_exists("#wrong_table")?);
    assert!(!db.sql.table_exists(&unique_name("wrong_table"))?);

    let table = create_fruit_table(&mut db.sql, driver)?;
    assert!(db.sql.table_exists(&table)?);

    let err = db
        .sql
        .query(&format!("SELECT nothing FROM {}", table), &[])
        .unwrap_err();
    assert_eq!(err.kind(), SqlErrorKind::Execution);

    for (name, value) in [("apple", 1), ("banana", 2), ("cucumber", 3)] {
        db.sql.insert(&table, &fruit(name, value), Some("id"))?;
    }

    let row = db
        .sql
        .query(
            &format!("SELECT id, time FROM {} WHERE name = ?", table),
            &[Value::from("apple")],
        )?
        .context("apple missing")?;
    assert_eq!(row.get_by_name("id").and_then(Value::as_i64), Some(1));
    assert!(row.get_by_name("time").and_then(Value::as_datetime).is_some());

    let values: Vec<i64> = db
        .sql
        .query_multiple(&format!("SELECT value FROM {} ORDER BY value", table), &[])?
        .iter()
        .filter_map(|row| row.get(0).and_then(Value::as_i64))
        .collect();
    assert_eq!(values, vec![1, 2, 3]);

    let none = db.sql.query(
        &format!("SELECT id FROM {} WHERE name = ?", table),
        &[Value::from("durian")],
    )?;
    assert!(none.is_none());

    drop_table(&mut db.sql, &table);
    Ok(())
}

#[test]
fn test_select_sqlite() -> Result<()> {
    select(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_select(#[case] driver: TestDriver) -> Result<()> {
    select(driver)
}

fn update_and_delete(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;
    let table = create_fruit_table(&mut db.sql, driver)?;
    for (name, value) in [("apple", 1), ("banana", 2), ("cucumber", 3)] {
        db.sql.insert(&table, &fruit(name, value), Some("id"))?;
    }

    let err = db
        .sql
        .update(&table, &[("colour", Value::from("red"))], &[])
        .unwrap_err();
    assert_eq!(err.kind(), SqlErrorKind::Execution);

    let updated = db.sql.update(
        &table,
        &[("value", Value::from(10))],
        &[("name", Value::from("apple")), ("id", Value::from(1))],
    )?;
    assert_eq!(updated, 1);
    let row = db
        .sql
        .query(&format!("SELECT value FROM {} WHERE id = ?", table), &[Value::from(1)])?
        .context("apple missing")?;
    assert_eq!(row.get(0).and_then(Value::as_i64), Some(10));

    let deleted = db.sql.delete(&table, &[("name", Value::from("banana"))])?;
    assert_eq!(deleted, 1);

    let count = db
        .sql
        .query(&format!("SELECT COUNT(*) AS cnt FROM {}", table), &[])?
        .and_then(|row| row.get_by_name("cnt").and_then(Value::as_i64));
    assert_eq!(count, Some(2));

    assert_eq!(db.sql.delete(&table, &[])?, 2);

    drop_table(&mut db.sql, &table);
    Ok(())
}

#[test]
fn test_update_and_delete_sqlite() -> Result<()> {
    update_and_delete(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_update_and_delete(#[case] driver: TestDriver) -> Result<()> {
    update_and_delete(driver)
}

fn server_time(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;

    let server = db.sql.time()?;
    let local = chrono::Utc::now().timestamp();
    assert!((server - local).abs() < 5, "server {} vs local {}", server, local);
    Ok(())
}

#[test]
fn test_server_time_sqlite() -> Result<()> {
    server_time(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_server_time(#[case] driver: TestDriver) -> Result<()> {
    server_time(driver)
}
