use std::sync::LazyLock;

use regex::Regex;

/// Quoted literals, quoted identifiers and comments, in which `?` is plain text
static SKIPPED_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:''|[^'\\]|\\.)*'|"(?:""|[^"])*"|--[^\n]*|/\*[\s\S]*?\*/"#)
        .expect("valid regex")
});

/// Rewrite positional `?` placeholders to PostgreSQL's `$1, $2, ...`.
///
/// Question marks inside single-quoted literals, double-quoted identifiers,
/// `--` line comments and `/* */` block comments are left alone.
pub fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut last_end = 0;

    for skipped in SKIPPED_TEXT.find_iter(sql) {
        number_placeholders(&sql[last_end..skipped.start()], &mut index, &mut out);
        out.push_str(skipped.as_str());
        last_end = skipped.end();
    }
    number_placeholders(&sql[last_end..], &mut index, &mut out);

    out
}

fn number_placeholders(code: &str, index: &mut usize, out: &mut String) {
    for ch in code.chars() {
        if ch == '?' {
            *index += 1;
            out.push('$');
            out.push_str(&index.to_string());
        } else {
            out.push(ch);
        }
    }
}
