//! Query complexity scoring.
//!
//! A bounded keyword scan, not a parse: comments and quoted text are blanked
//! out, then a fixed set of constructs is counted and weighted. Text the scan
//! does not recognise contributes nothing, so any dialect (or garbage) is safe
//! to feed in.

use cg_core::{ScoringWeights, TableStatistics};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Highest possible score
pub const MAX_SCORE: u8 = 100;

/// Scores at or above this are Medium
pub const MEDIUM_THRESHOLD: u8 = 30;

/// Scores at or above this are High
pub const HIGH_THRESHOLD: u8 = 70;

/// Risk category derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityCategory {
    Low,
    Medium,
    High,
}

impl ComplexityCategory {
    pub fn from_score(score: u8) -> Self {
        if score >= HIGH_THRESHOLD {
            ComplexityCategory::High
        } else if score >= MEDIUM_THRESHOLD {
            ComplexityCategory::Medium
        } else {
            ComplexityCategory::Low
        }
    }
}

impl fmt::Display for ComplexityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplexityCategory::Low => write!(f, "Low"),
            ComplexityCategory::Medium => write!(f, "Medium"),
            ComplexityCategory::High => write!(f, "High"),
        }
    }
}

/// Construct counts found in a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplexityBreakdown {
    /// `JOIN` keywords, CROSS JOINs included
    pub joins: u32,
    pub cross_joins: u32,
    /// `OVER (` window invocations
    pub windows: u32,
    /// Aggregate calls that are not window functions, plus `GROUP BY` clauses
    pub aggregations: u32,
    pub group_bys: u32,
    pub distincts: u32,
    pub order_bys: u32,
    /// 1 + the deepest parenthesis level holding a `SELECT`; 0 without any `SELECT`
    pub nesting_depth: u32,
    /// Referenced tables above the large-table row limit
    pub large_tables: u32,
    /// `FULL` or `SCAN` keywords, taken as a hint of a full table scan
    pub full_scans: u32,
}

/// Bounded risk score for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComplexityScore {
    pub score: u8,
    pub category: ComplexityCategory,
    pub breakdown: ComplexityBreakdown,
}

impl ComplexityScore {
    /// Score as a float, for the time-estimate formulas
    pub fn value(&self) -> f64 {
        f64::from(self.score)
    }
}

/// Weighted keyword scorer
#[derive(Debug, Clone, Default)]
pub struct ComplexityScorer {
    weights: ScoringWeights,
}

impl ComplexityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score `sql` given statistics for the tables it reads. Never fails.
    pub fn score(&self, sql: &str, tables: &[TableStatistics]) -> ComplexityScore {
        let mut breakdown = scan_constructs(sql);
        breakdown.large_tables = tables
            .iter()
            .filter(|t| t.row_count > self.weights.large_table_rows)
            .count() as u32;

        let w = &self.weights;
        let weighted = [
            (breakdown.joins, w.join),
            (breakdown.windows, w.window),
            (breakdown.aggregations, w.aggregation),
            (breakdown.nesting_depth.saturating_sub(1), w.nesting),
            (breakdown.large_tables, w.large_table),
        ];
        let total = weighted.iter().fold(0u64, |acc, (count, weight)| {
            acc.saturating_add(u64::from(*count).saturating_mul(u64::from(*weight)))
        });

        let score = total.min(u64::from(MAX_SCORE)) as u8;
        ComplexityScore {
            score,
            category: ComplexityCategory::from_score(score),
            breakdown,
        }
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

fn join_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bJOIN\b")
}

fn cross_join_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bCROSS\s+JOIN\b")
}

fn window_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bOVER\s*\(")
}

fn aggregate_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\b(?:COUNT|SUM|AVG|MIN|MAX)\s*\(")
}

fn group_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bGROUP\s+BY\b")
}

fn distinct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bDISTINCT\b")
}

fn order_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bORDER\s+BY\b")
}

fn full_scan_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\b(?:FULL|SCAN)\b")
}

fn select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bSELECT\b")
}

/// Count the scored constructs in `sql`.
pub fn scan_constructs(sql: &str) -> ComplexityBreakdown {
    let text = mask_sql(sql).to_ascii_uppercase();
    let count = |re: &Regex| re.find_iter(&text).count() as u32;

    let group_bys = count(group_by_re());
    let aggregate_calls = aggregate_call_re()
        .find_iter(&text)
        .filter(|m| !is_window_call(&text, m.end() - 1))
        .count() as u32;

    ComplexityBreakdown {
        joins: count(join_re()),
        cross_joins: count(cross_join_re()),
        windows: count(window_re()),
        aggregations: aggregate_calls.saturating_add(group_bys),
        group_bys,
        distincts: count(distinct_re()),
        order_bys: count(order_by_re()),
        nesting_depth: nesting_depth(&text),
        large_tables: 0,
        full_scans: count(full_scan_re()),
    }
}

/// Whether the call whose `(` sits at `open` is followed by `OVER`.
fn is_window_call(text: &str, open: usize) -> bool {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for (offset, b) in bytes[open..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let rest = text[open + offset + 1..].trim_start();
                    return rest.starts_with("OVER")
                        && !rest[4..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_');
                }
            }
            _ => {}
        }
    }
    false
}

fn nesting_depth(text: &str) -> u32 {
    let mut depth_at = Vec::with_capacity(text.len() + 1);
    let mut depth = 0u32;
    for b in text.bytes() {
        depth_at.push(depth);
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    select_re()
        .find_iter(text)
        .map(|m| depth_at[m.start()] + 1)
        .max()
        .unwrap_or(0)
}

/// Replace comments and quoted text with spaces, keeping byte offsets.
fn mask_sql(sql: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Quoted(char),
    }

    let mut out = String::with_capacity(sql.len());
    let mut state = State::Code;
    let mut chars = sql.chars().peekable();

    let blank = |out: &mut String, c: char| {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    };

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '-' if chars.peek() == Some(&'-') => {
                    state = State::LineComment;
                    blank(&mut out, c);
                }
                '/' if chars.peek() == Some(&'*') => {
                    state = State::BlockComment;
                    blank(&mut out, c);
                    if let Some(star) = chars.next() {
                        blank(&mut out, star);
                    }
                }
                '\'' | '"' | '`' => {
                    state = State::Quoted(c);
                    blank(&mut out, c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                }
                blank(&mut out, c);
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    blank(&mut out, c);
                    if let Some(slash) = chars.next() {
                        blank(&mut out, slash);
                    }
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::Quoted(quote) => {
                // backslash escapes the next character in string literals
                if c == '\\' && quote == '\'' {
                    blank(&mut out, c);
                    if let Some(next) = chars.next() {
                        blank(&mut out, next);
                    }
                    continue;
                }
                if c == quote {
                    // doubled quote is an escaped quote
                    if chars.peek() == Some(&quote) {
                        blank(&mut out, c);
                        if let Some(next) = chars.next() {
                            blank(&mut out, next);
                        }
                        continue;
                    }
                    state = State::Code;
                }
                blank(&mut out, c);
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "complexity_test.rs"]
mod tests;
