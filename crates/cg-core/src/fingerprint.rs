//! Query fingerprints for matching a job against past executions, and the
//! statement splitting the plan tier relies on.

use sha2::{Digest, Sha256};

/// Strip comments, collapse whitespace and drop trailing semicolons.
///
/// Quoted literals and identifiers are copied verbatim.
pub fn normalize_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        break;
                    }
                }
                pending_space = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                pending_space = true;
            }
            '\'' | '"' => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
                while let Some(n) = chars.next() {
                    out.push(n);
                    if n == '\\' && c == '\'' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if n == c {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }

    while out.ends_with(';') || out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Split `sql` into its statements, comments removed.
///
/// Semicolons inside quoted text do not split. Empty statements are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let normalized = normalize_sql(sql);
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = normalized.chars();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == '\\' && q == '\'' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                ';' => statements.push(std::mem::take(&mut current)),
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                _ => current.push(c),
            },
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether `statement` is a plain query: it opens with `SELECT`, `WITH`,
/// `FROM`, `VALUES` or a parenthesis.
pub fn is_query(statement: &str) -> bool {
    let statement = statement.trim_start();
    if statement.starts_with('(') {
        return true;
    }
    let keyword: String = statement
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(keyword.as_str(), "SELECT" | "WITH" | "FROM" | "VALUES")
}

/// SHA-256 of the normalized query text, hex encoded.
pub fn fingerprint(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_sql(sql).as_bytes());
    format!("{:x}", hasher.finalize())
}
