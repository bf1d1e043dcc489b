use crate::rewrite_placeholders;
use pretty_assertions::assert_eq;

#[test]
fn test_numbers_in_order() {
    assert_eq!(
        rewrite_placeholders("INSERT INTO t (a,b) VALUES (?,?)"),
        "INSERT INTO t (a,b) VALUES ($1,$2)"
    );
    assert_eq!(
        rewrite_placeholders("UPDATE t SET a=?,b=? WHERE id=? AND tag=?"),
        "UPDATE t SET a=$1,b=$2 WHERE id=$3 AND tag=$4"
    );
}

#[test]
fn test_no_placeholders() {
    assert_eq!(rewrite_placeholders("SELECT 1"), "SELECT 1");
    assert_eq!(rewrite_placeholders(""), "");
}

#[test]
fn test_quoted_text_is_skipped() {
    assert_eq!(
        rewrite_placeholders("SELECT '?' AS q, \"odd?col\" FROM t WHERE a = ?"),
        "SELECT '?' AS q, \"odd?col\" FROM t WHERE a = $1"
    );
}

#[test]
fn test_escaped_quotes() {
    assert_eq!(
        rewrite_placeholders("SELECT 'it''s ?' WHERE a = ? AND b = 'x'"),
        "SELECT 'it''s ?' WHERE a = $1 AND b = 'x'"
    );
}

#[test]
fn test_double_digit_indexes() {
    let sql = vec!["?"; 11].join(",");
    assert_eq!(
        rewrite_placeholders(&sql),
        "$1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11"
    );
}

#[test]
fn test_line_comments_are_skipped() {
    assert_eq!(
        rewrite_placeholders("SELECT a FROM t -- why?\nWHERE b = ?"),
        "SELECT a FROM t -- why?\nWHERE b = $1"
    );
    assert_eq!(
        rewrite_placeholders("SELECT ? -- trailing ?"),
        "SELECT $1 -- trailing ?"
    );
}

#[test]
fn test_block_comments_are_skipped() {
    assert_eq!(
        rewrite_placeholders("SELECT /* ? */ a FROM t WHERE b = ? /* and\n? */ AND c = ?"),
        "SELECT /* ? */ a FROM t WHERE b = $1 /* and\n? */ AND c = $2"
    );
}

#[test]
fn test_comment_markers_inside_literals() {
    assert_eq!(
        rewrite_placeholders("SELECT '-- ?', '/* ? */' WHERE a = ?"),
        "SELECT '-- ?', '/* ? */' WHERE a = $1"
    );
    assert_eq!(
        rewrite_placeholders("SELECT a -- it's ?\nWHERE b = ?"),
        "SELECT a -- it's ?\nWHERE b = $1"
    );
}
