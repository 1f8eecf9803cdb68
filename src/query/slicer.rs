//! Clause Slicer
//!
//! Cuts a raw query string into its clauses before any key or operator is looked at.
//!
//! ```text
//! In courses dataset courses grouped by Department, find all entries; show Department, where best is the MAX of Average; sort in descending order by best.
//! └──── dataset ─────────────┘└─ group ──────────┘  └─ filter ──────┘  └─ display ──┘  └─ apply ─────────────────────┘  └─ sort ─────────────────────────┘
//! ```
//!
//! Every separator search skips text inside double quotes, so a quoted operand may
//! contain `; `, `, ` or ` and ` without splitting anything.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_till},
    character::complete::{char, multispace0},
    combinator::{opt, recognize, rest, value},
    multi::{many0, many1_count},
    sequence::{preceded, tuple},
    IResult,
};

use crate::query::ast::SortDirection;
use crate::query::error::{QueryError, QueryResult};

/// Two-word key spellings accepted in queries
const SPELLINGS: [(&str, &str); 2] = [("Full Name", "FullName"), ("Short Name", "ShortName")];

/// A query string cut into clauses
#[derive(Debug, Clone, PartialEq)]
pub struct SlicedQuery {
    /// Words of `In <kind> dataset <id>`
    pub dataset: Vec<String>,
    /// Key words after `grouped by`
    pub group: Option<Vec<String>>,
    /// Filter clause, starting with `find`
    pub filter: String,
    /// Entries after `show`
    pub display: Vec<String>,
    /// Entries after `where`
    pub apply: Option<Vec<String>>,
    pub sort: Option<SortClause>,
}

/// The sort clause: one direction and its entries
#[derive(Debug, Clone, PartialEq)]
pub struct SortClause {
    pub direction: SortDirection,
    pub entries: Vec<String>,
}

/// Slice a query string into clauses.
///
/// Checks the terminator and every required leading keyword; the contents of each
/// clause are validated later by the parsers.
pub fn slice_query(input: &str) -> QueryResult<SlicedQuery> {
    let body = input
        .trim()
        .strip_suffix('.')
        .ok_or_else(|| QueryError::syntax("query must end with '.'"))?;
    let body = normalize_spellings(body);

    let mut parts = split_outside_quotes(&body, "; ").into_iter();
    let dataset_part = parts.next().unwrap_or_default();

    let (head, filter) = match find_outside_quotes(dataset_part, ", find") {
        Some(at) => (&dataset_part[..at], dataset_part[at + 2..].to_string()),
        None => {
            let filter = parts
                .next()
                .filter(|part| part.starts_with("find"))
                .ok_or_else(|| QueryError::syntax("dataset clause must be followed by a filter starting with 'find'"))?;
            (dataset_part, filter.to_string())
        }
    };

    let (dataset, group) = slice_dataset(head)?;

    let display_part = parts
        .next()
        .ok_or_else(|| QueryError::syntax("missing display clause"))?;
    let (display, apply) = slice_display(display_part)?;

    let sort = parts.next().map(slice_sort).transpose()?;

    if let Some(extra) = parts.next() {
        return Err(QueryError::Syntax(format!("unexpected clause: '{}'", extra)));
    }

    Ok(SlicedQuery {
        dataset,
        group,
        filter,
        display,
        apply,
        sort,
    })
}

fn slice_dataset(head: &str) -> QueryResult<(Vec<String>, Option<Vec<String>>)> {
    if !head.starts_with("In ") {
        return Err(QueryError::syntax("dataset clause must start with 'In'"));
    }

    let (header, group) = match head.split_once(" grouped by") {
        Some((header, keys)) => {
            let keys = split_list(keys.trim(), "grouped by")?;
            (header, Some(keys))
        }
        None => (head, None),
    };

    let dataset = header.split_whitespace().map(str::to_string).collect();
    Ok((dataset, group))
}

fn slice_display(part: &str) -> QueryResult<(Vec<String>, Option<Vec<String>>)> {
    let entries = part
        .strip_prefix("show ")
        .ok_or_else(|| QueryError::syntax("display clause must start with 'show'"))?;

    match find_outside_quotes(entries, ", where ") {
        Some(at) => {
            let display = split_list(&entries[..at], "show")?;
            let apply = split_list(&entries[at + ", where ".len()..], "where")?;
            Ok((display, Some(apply)))
        }
        None => Ok((split_list(entries, "show")?, None)),
    }
}

fn slice_sort(part: &str) -> QueryResult<SortClause> {
    let (entries, direction) = sort_header(part)
        .map_err(|_| {
            QueryError::syntax(
                "sort clause must start with 'sort in ascending order by' or 'sort in descending order by'",
            )
        })?;

    Ok(SortClause {
        direction,
        entries: split_list(entries, "sort")?,
    })
}

fn sort_header(input: &str) -> IResult<&str, SortDirection> {
    let (input, _) = tag("sort in ")(input)?;
    let (input, direction) = alt((
        value(SortDirection::Ascending, tag("ascending")),
        value(SortDirection::Descending, tag("descending")),
    ))(input)?;
    let (input, _) = tag(" order by ")(input)?;
    Ok((input, direction))
}

/// Split a conjunction-joined list (`a, b, c and d`) into trimmed entries
fn split_list(list: &str, clause: &str) -> QueryResult<Vec<String>> {
    let (entries, _) = split_on_any(list, &[", ", " and "]);
    let entries: Vec<String> = entries.iter().map(|e| e.trim().to_string()).collect();

    if entries.iter().any(String::is_empty) {
        return Err(QueryError::Syntax(format!("empty entry in '{}' list", clause)));
    }
    Ok(entries)
}

/// Rewrite `Full Name` / `Short Name` to their one-word key spelling, outside quotes
fn normalize_spellings(body: &str) -> String {
    body.split('"')
        .enumerate()
        .map(|(i, segment)| {
            if i % 2 == 1 {
                return segment.to_string();
            }
            SPELLINGS
                .iter()
                .fold(segment.to_string(), |acc, (from, to)| acc.replace(from, to))
        })
        .collect::<Vec<_>>()
        .join("\"")
}

/// Byte offset of the first `sep` outside double quotes
pub(crate) fn find_outside_quotes(s: &str, sep: &str) -> Option<usize> {
    scan_outside_quotes(s, &[sep]).first().map(|&(at, _)| at)
}

/// Split on `sep` wherever it occurs outside double quotes
pub(crate) fn split_outside_quotes<'a>(s: &'a str, sep: &str) -> Vec<&'a str> {
    split_on_any(s, &[sep]).0
}

/// Split on any of `seps` outside double quotes.
///
/// Returns the pieces and, for each boundary between two pieces, the index into
/// `seps` of the separator found there.
pub(crate) fn split_on_any<'a>(s: &'a str, seps: &[&str]) -> (Vec<&'a str>, Vec<usize>) {
    let mut pieces = Vec::new();
    let mut found = Vec::new();
    let mut start = 0;

    for (at, which) in scan_outside_quotes(s, seps) {
        pieces.push(&s[start..at]);
        found.push(which);
        start = at + seps[which].len();
    }
    pieces.push(&s[start..]);

    (pieces, found)
}

fn scan_outside_quotes(s: &str, seps: &[&str]) -> Vec<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut hits = Vec::new();
    let mut in_quotes = false;
    let mut i = 0;

    'scan: while i < bytes.len() {
        if bytes[i] == b'"' {
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if !in_quotes {
            for (which, sep) in seps.iter().enumerate() {
                if bytes[i..].starts_with(sep.as_bytes()) {
                    hits.push((i, which));
                    i += sep.len();
                    continue 'scan;
                }
            }
        }
        i += 1;
    }

    hits
}

/// A double-quoted run; an unterminated quote runs to the end of input
fn quoted_run(input: &str) -> IResult<&str, &str> {
    recognize(tuple((char('"'), take_till(|c: char| c == '"'), opt(char('"')))))(input)
}

/// One word: bare characters and quoted runs with no whitespace between them
fn word(input: &str) -> IResult<&str, &str> {
    recognize(many1_count(alt((quoted_run, is_not(" \t\r\n\"")))))(input)
}

/// Split a clause into words, keeping each quoted run (spaces and all) inside one
/// word with its quotes still attached.
pub fn tokenize(clause: &str) -> Vec<&str> {
    match many0(preceded(multispace0, word))(clause) {
        Ok((_, words)) => words,
        Err(_) => Vec::new(),
    }
}

/// Everything after `prefix`, if the clause starts with it
pub(crate) fn after<'a>(clause: &'a str, prefix: &str) -> Option<&'a str> {
    let parsed: IResult<&str, &str> = preceded(tag(prefix), rest)(clause);
    parsed.ok().map(|(_, remainder)| remainder)
}
