//! Filter clause compiler and evaluator
//!
//! A filter is either `find all entries` or `find entries whose` followed by
//! criteria joined with `and` / `or`. Criteria are combined left to right with no
//! precedence: `and` narrows the running result, `or` appends matching records from
//! the full dataset that are not already in it.

use nom::{
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, opt, recognize},
    sequence::{pair, tuple},
    IResult,
};

use crate::dataset::{DatasetKind, Record};
use crate::query::ast::{Connector, Criterion, FilterExpr, NumericOp, StringOp};
use crate::query::error::{QueryError, QueryResult};
use crate::query::keys::{resolve_field, NumericKey, StringKey};
use crate::query::slicer::{after, split_on_any, tokenize};

const MATCH_ALL: &str = "find all entries";
const WHOSE: &str = "find entries whose ";
const CONNECTORS: [&str; 2] = [" and ", " or "];

/// Compile a filter clause into a [`FilterExpr`]
pub fn compile_filter(clause: &str) -> QueryResult<FilterExpr> {
    let clause = clause.trim();
    if clause == MATCH_ALL {
        return Ok(FilterExpr::MatchAll);
    }

    let criteria = after(clause, WHOSE).ok_or_else(|| {
        QueryError::syntax("filter must be 'find all entries' or 'find entries whose ...'")
    })?;

    let (pieces, separators) = split_on_any(criteria, &CONNECTORS);
    let mut compiled = pieces.into_iter().map(compile_criterion);

    let first = compiled
        .next()
        .ok_or_else(|| QueryError::syntax("filter has no criteria"))??;

    let mut rest = Vec::with_capacity(separators.len());
    for (separator, criterion) in separators.into_iter().zip(compiled) {
        let connector = if separator == 0 {
            Connector::And
        } else {
            Connector::Or
        };
        rest.push((connector, criterion?));
    }

    Ok(FilterExpr::Chain { first, rest })
}

/// Compile one `<key> <operator words> <operand>` criterion
fn compile_criterion(text: &str) -> QueryResult<Criterion> {
    let tokens = tokenize(text);
    if tokens.len() < 3 {
        return Err(QueryError::Syntax(format!(
            "criterion '{}' needs a key, an operator and an operand",
            text.trim()
        )));
    }

    let word = tokens[0];
    let operand = tokens[tokens.len() - 1];
    let phrase = tokens[1..tokens.len() - 1].join(" ");

    if let Some(key) = NumericKey::from_word(word) {
        let op = NumericOp::from_phrase(&phrase).ok_or_else(|| QueryError::InvalidOperator {
            key: word.to_string(),
            operator: phrase.clone(),
        })?;
        return Ok(Criterion::Numeric {
            key,
            op,
            operand: numeric_operand(operand)?,
        });
    }

    if let Some(key) = StringKey::from_word(word) {
        let op = StringOp::from_phrase(&phrase).ok_or_else(|| QueryError::InvalidOperator {
            key: word.to_string(),
            operator: phrase.clone(),
        })?;
        return Ok(Criterion::Text {
            key,
            op,
            operand: string_operand(operand)?,
        });
    }

    Err(QueryError::UnknownKey(word.to_string()))
}

/// `[+-]digits[.digits]`
fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit0)),
    )))(input)
}

fn numeric_operand(token: &str) -> QueryResult<f64> {
    all_consuming(number_literal)(token)
        .ok()
        .and_then(|(_, literal)| literal.parse::<f64>().ok())
        .ok_or_else(|| QueryError::InvalidOperand(format!("'{}' is not a number", token)))
}

/// A double-quoted literal with no inner quote or `*`
fn string_operand(token: &str) -> QueryResult<String> {
    let inner = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| QueryError::InvalidOperand(format!("{} is not a quoted string", token)))?;

    if inner.contains('"') || inner.contains('*') {
        return Err(QueryError::InvalidOperand(format!(
            "{} may not contain '\"' or '*'",
            token
        )));
    }
    Ok(inner.to_string())
}

/// Check every criterion key against the dataset kind
pub fn check_scope(filter: &FilterExpr, kind: DatasetKind) -> QueryResult<()> {
    for criterion in filter.criteria() {
        resolve_field(criterion.key(), kind)?;
    }
    Ok(())
}

/// Apply a filter to records, returning the survivors in order.
///
/// Indices into `records` track membership, so the result never holds the same
/// record twice.
pub fn apply_filter<'a, R: Record>(filter: &FilterExpr, records: &'a [R]) -> Vec<&'a R> {
    match filter {
        FilterExpr::MatchAll => records.iter().collect(),
        FilterExpr::Chain { first, rest } => fold_criteria(first, rest, records)
            .into_iter()
            .map(|i| &records[i])
            .collect(),
    }
}

fn fold_criteria<R: Record>(
    first: &Criterion,
    rest: &[(Connector, Criterion)],
    records: &[R],
) -> Vec<usize> {
    let mut current: Vec<usize> = (0..records.len())
        .filter(|&i| first.matches(&records[i]))
        .collect();

    for (connector, criterion) in rest {
        match connector {
            Connector::And => current.retain(|&i| criterion.matches(&records[i])),
            Connector::Or => {
                let mut seen = vec![false; records.len()];
                for &i in &current {
                    seen[i] = true;
                }
                current.extend(
                    (0..records.len()).filter(|&i| !seen[i] && criterion.matches(&records[i])),
                );
            }
        }
    }

    current
}
