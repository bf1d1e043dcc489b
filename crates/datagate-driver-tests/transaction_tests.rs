//! Transactions driven through the native handle

use anyhow::{Context, Result};
use datagate_core::{SqlErrorKind, Value};
use datagate_drivers::Sql;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::fixtures::{TestDriver, drop_table, test_sql, unique_name};

fn create_ledger(sql: &mut Sql) -> Result<String> {
    let table = unique_name("ledger");
    sql.query_raw(
        &format!(
            "CREATE TABLE {} (id {}, amount INTEGER NOT NULL) {}",
            table,
            sql.stmt_fragment("index", &[]),
            sql.stmt_fragment("engine", &[])
        ),
        &[],
    )?;
    Ok(table)
}

fn count(sql: &mut Sql, table: &str) -> Result<i64> {
    sql.query(&format!("SELECT COUNT(*) AS cnt FROM {}", table), &[])?
        .and_then(|row| row.get_by_name("cnt").and_then(Value::as_i64))
        .context("count missing")
}

fn commit_keeps_rows(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;
    let table = create_ledger(&mut db.sql)?;
    let insert = format!("INSERT INTO {} (amount) VALUES (?)", table);

    db.sql.get_connection()?.begin_transaction()?;
    db.sql.query_raw(&insert, &[Value::from(10)])?;
    db.sql.query_raw(&insert, &[Value::from(20)])?;
    db.sql.get_connection()?.commit()?;

    assert_eq!(count(&mut db.sql, &table)?, 2);
    drop_table(&mut db.sql, &table);
    Ok(())
}

#[test]
fn test_commit_keeps_rows_sqlite() -> Result<()> {
    commit_keeps_rows(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_commit_keeps_rows(#[case] driver: TestDriver) -> Result<()> {
    commit_keeps_rows(driver)
}

fn failed_step_rolls_back(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;
    let table = create_ledger(&mut db.sql)?;
    let insert = format!("INSERT INTO {} (amount) VALUES (?)", table);

    db.sql.get_connection()?.begin_transaction()?;
    db.sql.query_raw(&insert, &[Value::from(10)])?;
    let err = db
        .sql
        .query_raw(&insert, &[Value::Null])
        .unwrap_err();
    assert_eq!(err.kind(), SqlErrorKind::Execution);
    db.sql.get_connection()?.rollback()?;

    assert_eq!(count(&mut db.sql, &table)?, 0);
    drop_table(&mut db.sql, &table);
    Ok(())
}

#[test]
fn test_failed_step_rolls_back_sqlite() -> Result<()> {
    failed_step_rolls_back(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_failed_step_rolls_back(#[case] driver: TestDriver) -> Result<()> {
    failed_step_rolls_back(driver)
}

/// The facade keeps working after a rollback
fn connection_usable_after_rollback(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;
    let table = create_ledger(&mut db.sql)?;

    db.sql.get_connection()?.begin_transaction()?;
    db.sql.insert(&table, &[("amount", Value::from(5))], Some("id"))?;
    db.sql.get_connection()?.rollback()?;

    let inserted = db.sql.insert(&table, &[("amount", Value::from(7))], Some("id"))?;
    assert!(inserted.as_i64().is_some());
    assert_eq!(count(&mut db.sql, &table)?, 1);

    drop_table(&mut db.sql, &table);
    Ok(())
}

#[test]
fn test_connection_usable_after_rollback_sqlite() -> Result<()> {
    connection_usable_after_rollback(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_connection_usable_after_rollback(#[case] driver: TestDriver) -> Result<()> {
    connection_usable_after_rollback(driver)
}
