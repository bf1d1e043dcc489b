use crate::{ConnectionConfig, Fragment, SqlParams, Value, build_server_dsn};

fn params(dbtype: &str, host: Option<&str>, port: Option<&str>) -> SqlParams {
    let mut config = ConnectionConfig::new()
        .with_param("dbtype", dbtype)
        .with_param("dbname", "shop")
        .with_param("dbuser", "root");
    if let Some(host) = host {
        config = config.with_param("dbhost", host);
    }
    if let Some(port) = port {
        config = config.with_param("dbport", port);
    }
    SqlParams::from_config(&config).unwrap()
}

#[test]
fn test_fragment_parse() {
    assert_eq!(Fragment::parse("engine", &[]), Some(Fragment::Engine));
    assert_eq!(Fragment::parse("index", &[]), Some(Fragment::Index));
    assert_eq!(
        Fragment::parse("datetime", &[("delta", Value::Int64(-3600))]),
        Some(Fragment::Datetime { delta: -3600 })
    );
    assert_eq!(
        Fragment::parse("datetime", &[("delta", Value::from("90"))]),
        Some(Fragment::Datetime { delta: 90 })
    );
    assert_eq!(
        Fragment::parse("datetime", &[]),
        Some(Fragment::Datetime { delta: 0 })
    );
    assert_eq!(Fragment::parse("trigger", &[]), None);
}

#[test]
fn test_fragment_parse_truncates_fractional_delta() {
    assert_eq!(
        Fragment::parse("datetime", &[("delta", Value::Float64(3600.0))]),
        Some(Fragment::Datetime { delta: 3600 })
    );
    assert_eq!(
        Fragment::parse("datetime", &[("delta", Value::Float64(-90.9))]),
        Some(Fragment::Datetime { delta: -90 })
    );
    assert_eq!(
        Fragment::parse("datetime", &[("delta", Value::from("12.7"))]),
        Some(Fragment::Datetime { delta: 12 })
    );
}

#[test]
fn test_fragment_sign() {
    assert_eq!(Fragment::signed(0), ('+', 0));
    assert_eq!(Fragment::signed(3600), ('+', 3600));
    assert_eq!(Fragment::signed(-3600), ('-', 3600));
}

#[test]
fn test_server_dsn() {
    assert_eq!(build_server_dsn(&params("mysql", None, None)), "mysql:dbname=shop");
    assert_eq!(
        build_server_dsn(&params("mysql", Some("127.0.0.1"), Some("3306"))),
        "mysql:dbname=shop;host=127.0.0.1;port=3306"
    );
    // port without host is dropped
    assert_eq!(
        build_server_dsn(&params("pgsql", None, Some("5432"))),
        "pgsql:dbname=shop"
    );
}
