use datagate_core::Value;
use pretty_assertions::assert_eq;

use crate::sql::{delete_statement, insert_statement, pairs_to_json, update_statement};

#[test]
fn test_insert_statement_shape() {
    let values = [("name", Value::from("ada")), ("age", Value::from(36))];
    assert_eq!(
        insert_statement("people", &values),
        "INSERT INTO people (name,age) VALUES (?,?)"
    );
}

#[test]
fn test_update_statement_with_filter() {
    let values = [("name", Value::from("ada")), ("age", Value::from(37))];
    let filter = [("id", Value::from(1)), ("active", Value::from(true))];
    assert_eq!(
        update_statement("people", &values, &filter),
        "UPDATE people SET name=?,age=? WHERE id=? AND active=?"
    );
}

#[test]
fn test_update_statement_without_filter() {
    let values = [("age", Value::from(0))];
    assert_eq!(update_statement("people", &values, &[]), "UPDATE people SET age=?");
}

#[test]
fn test_delete_statement() {
    assert_eq!(delete_statement("people", &[]), "DELETE FROM people");
    assert_eq!(
        delete_statement("people", &[("id", Value::from(3))]),
        "DELETE FROM people WHERE id=?"
    );
}

#[test]
fn test_pairs_to_json_keeps_values() {
    let pairs = [("name", Value::from("ada")), ("age", Value::Null)];
    let json: serde_json::Value = serde_json::from_str(&pairs_to_json(&pairs)).unwrap();
    assert_eq!(json, serde_json::json!({"name": "ada", "age": null}));
}
