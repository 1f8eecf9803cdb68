//! Query Parser
//!
//! Turns a query string into a validated [`QueryPlan`].
//!
//! # Supported Syntax
//!
//! ```text
//! In <kind> dataset <id>[ grouped by <keys>], find all entries | find entries whose <criteria>;
//! show <keys or aliases>[, where <alias> is the <FUNCTION> of <key> [and ...]];
//! [sort in ascending|descending order by <keys or aliases>].
//! ```
//!
//! # Examples
//!
//! ```text
//! In courses dataset courses, find entries whose Average is greater than 90; show Department and Average.
//! In rooms dataset rooms grouped by ShortName, find all entries; show ShortName and total, where total is the SUM of Seats; sort in descending order by total.
//! ```

use nom::{
    bytes::complete::{tag, take_till1},
    character::complete::{alpha1, multispace0, multispace1, not_line_ending},
    combinator::all_consuming,
    sequence::tuple,
    IResult,
};

use crate::dataset::DatasetKind;
use crate::query::ast::*;
use crate::query::error::{QueryError, QueryResult};
use crate::query::filter::{check_scope, compile_filter};
use crate::query::keys::{resolve_field, resolve_key, resolve_scoped, Key};
use crate::query::slicer::{slice_query, SlicedQuery, SortClause};

/// Parse a query string into a [`QueryPlan`]
pub fn parse_query(input: &str) -> QueryResult<QueryPlan> {
    let mut sliced = slice_query(input)?;
    let (dataset_id, kind) = parse_dataset_header(&sliced.dataset)?;

    let filter = compile_filter(&sliced.filter)?;
    check_scope(&filter, kind)?;

    match sliced.group.take() {
        Some(group) => parse_aggregate(sliced, group, dataset_id, kind, filter),
        None => parse_simple(sliced, dataset_id, kind, filter),
    }
}

/// `In <kind> dataset <id>`
fn parse_dataset_header(words: &[String]) -> QueryResult<(String, DatasetKind)> {
    let [in_word, kind, dataset_word, id] = words else {
        return Err(QueryError::syntax(
            "dataset clause must be 'In <kind> dataset <id>'",
        ));
    };

    if in_word != "In" || dataset_word != "dataset" {
        return Err(QueryError::syntax(
            "dataset clause must be 'In <kind> dataset <id>'",
        ));
    }

    let kind = DatasetKind::from_word(kind)
        .ok_or_else(|| QueryError::Syntax(format!("unsupported dataset kind '{}'", kind)))?;

    if id.contains('_') {
        return Err(QueryError::Syntax(format!(
            "dataset id '{}' must not contain '_'",
            id
        )));
    }

    Ok((id.clone(), kind))
}

fn parse_simple(
    sliced: SlicedQuery,
    dataset_id: String,
    kind: DatasetKind,
    filter: FilterExpr,
) -> QueryResult<QueryPlan> {
    if sliced.apply.is_some() {
        return Err(QueryError::syntax(
            "'where' aggregations require a 'grouped by' clause",
        ));
    }

    let projection = sliced
        .display
        .iter()
        .map(|word| resolve_scoped(word, kind).map(Column::Key))
        .collect::<QueryResult<Vec<_>>>()?;

    let sort = match sliced.sort {
        Some(SortClause { direction, entries }) => {
            let [entry] = entries.as_slice() else {
                return Err(QueryError::syntax(
                    "a query without grouping sorts by exactly one key",
                ));
            };
            let target = Column::Key(resolve_scoped(entry, kind)?);
            if !projection.contains(&target) {
                return Err(QueryError::InvalidSortTarget(entry.clone()));
            }
            Some(SortSpec {
                direction,
                targets: vec![target],
            })
        }
        None => None,
    };

    Ok(QueryPlan::new(dataset_id, kind, filter, None, projection, sort))
}

fn parse_aggregate(
    sliced: SlicedQuery,
    group: Vec<String>,
    dataset_id: String,
    kind: DatasetKind,
    filter: FilterExpr,
) -> QueryResult<QueryPlan> {
    let keys = group
        .iter()
        .map(|word| resolve_scoped(word, kind))
        .collect::<QueryResult<Vec<_>>>()?;

    let mut aggregations: Vec<Aggregation> = Vec::new();
    for entry in sliced.apply.iter().flatten() {
        let aggregation = parse_apply_entry(entry, kind)?;
        if aggregations.iter().any(|a| a.alias() == aggregation.alias()) {
            return Err(QueryError::InvalidAggregation(format!(
                "alias '{}' is declared twice",
                aggregation.alias()
            )));
        }
        aggregations.push(aggregation);
    }

    let projection = sliced
        .display
        .iter()
        .map(|word| grouped_column(word, kind, &keys, &aggregations))
        .collect::<QueryResult<Vec<_>>>()?;

    let sort = match sliced.sort {
        Some(SortClause { direction, entries }) => {
            let targets = entries
                .iter()
                .map(|word| {
                    let target = sort_column(word, &aggregations)?;
                    if projection.contains(&target) {
                        Ok(target)
                    } else {
                        Err(QueryError::InvalidSortTarget(word.clone()))
                    }
                })
                .collect::<QueryResult<Vec<_>>>()?;
            Some(SortSpec { direction, targets })
        }
        None => None,
    };

    let grouping = Grouping { keys, aggregations };
    Ok(QueryPlan::new(
        dataset_id,
        kind,
        filter,
        Some(grouping),
        projection,
        sort,
    ))
}

/// A display entry of a grouped query: a group key or a declared alias
fn grouped_column(
    word: &str,
    kind: DatasetKind,
    keys: &[Key],
    aggregations: &[Aggregation],
) -> QueryResult<Column> {
    if let Ok(key) = resolve_key(word) {
        resolve_field(key, kind)?;
        if !keys.contains(&key) {
            return Err(QueryError::UngroupedKey(word.to_string()));
        }
        return Ok(Column::Key(key));
    }

    if aggregations.iter().any(|a| a.alias() == word) {
        return Ok(Column::Alias(word.to_string()));
    }

    Err(QueryError::UnknownKey(word.to_string()))
}

fn sort_column(word: &str, aggregations: &[Aggregation]) -> QueryResult<Column> {
    if let Ok(key) = resolve_key(word) {
        return Ok(Column::Key(key));
    }
    if aggregations.iter().any(|a| a.alias() == word) {
        return Ok(Column::Alias(word.to_string()));
    }
    Err(QueryError::UnknownKey(word.to_string()))
}

/// `<alias> is the <FUNCTION> of <key>`
fn apply_entry(input: &str) -> IResult<&str, (&str, &str, &str)> {
    let (input, (alias, _, _, _, function, _, _, _, key)) = tuple((
        take_till1(char::is_whitespace),
        multispace1,
        tag("is the"),
        multispace1,
        alpha1,
        multispace1,
        tag("of"),
        multispace1,
        not_line_ending,
    ))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, (alias, function, key.trim_end())))
}

fn parse_apply_entry(entry: &str, kind: DatasetKind) -> QueryResult<Aggregation> {
    let (_, (alias, function, key_word)) = all_consuming(apply_entry)(entry).map_err(|_| {
        QueryError::InvalidAggregation(format!(
            "'{}' must read '<alias> is the <FUNCTION> of <key>'",
            entry
        ))
    })?;

    validate_alias(alias)?;

    let function = AggregateFunction::from_word(function).ok_or_else(|| {
        QueryError::InvalidAggregation(format!("unknown function '{}'", function))
    })?;
    let key = resolve_scoped(key_word, kind)?;

    Ok(Aggregation::new(alias, function.bind(key)?))
}

fn validate_alias(alias: &str) -> QueryResult<()> {
    if alias.contains('_') || alias.contains('*') {
        return Err(QueryError::InvalidAggregation(format!(
            "alias '{}' must not contain '_' or '*'",
            alias
        )));
    }
    if resolve_key(alias).is_ok() {
        return Err(QueryError::InvalidAggregation(format!(
            "alias '{}' is a key name",
            alias
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::keys::{NumericKey, StringKey};

    const DEPT: Key = Key::Text(StringKey::Department);
    const AVG: Key = Key::Numeric(NumericKey::Average);

    #[test]
    fn test_parse_simple_query() {
        let plan = parse_query(
            "In courses dataset courses, find entries whose Department is \"cpsc\" and Average is greater than 90; show Department, ID, Average; sort in descending order by Average.",
        )
        .unwrap();

        assert_eq!(plan.dataset_id(), "courses");
        assert_eq!(plan.kind(), DatasetKind::Courses);
        assert!(plan.grouping().is_none());
        assert!(plan.group_keys().is_empty());
        assert_eq!(plan.filter().criteria().len(), 2);
        assert_eq!(
            plan.projection(),
            &[
                Column::Key(DEPT),
                Column::Key(Key::Text(StringKey::Id)),
                Column::Key(AVG)
            ]
        );
        assert_eq!(plan.columns(), vec!["courses_dept", "courses_id", "courses_avg"]);

        let sort = plan.sort().unwrap();
        assert_eq!(sort.direction, SortDirection::Descending);
        assert_eq!(sort.targets, vec![Column::Key(AVG)]);
    }

    #[test]
    fn test_parse_aggregate_query() {
        let plan = parse_query(
            "In courses dataset courses grouped by Department and Title, find all entries; show Department, best and n, where best is the MAX of Average and n is the COUNT of UUID; sort in ascending order by best and Department.",
        )
        .unwrap();

        assert_eq!(plan.group_keys(), &[DEPT, Key::Text(StringKey::Title)]);
        assert_eq!(plan.filter(), &FilterExpr::MatchAll);

        let aggregations = plan.aggregations();
        assert_eq!(aggregations.len(), 2);
        assert_eq!(aggregations[0].alias(), "best");
        assert_eq!(aggregations[0].function(), AggregateFunction::Max);
        assert_eq!(aggregations[0].key(), AVG);
        assert_eq!(aggregations[1].function(), AggregateFunction::Count);

        assert_eq!(plan.columns(), vec!["courses_dept", "best", "n"]);
        assert_eq!(
            plan.sort().unwrap().targets,
            vec![Column::Alias("best".to_string()), Column::Key(DEPT)]
        );
    }

    #[test]
    fn test_dataset_header_errors() {
        let cases = [
            "In courses dataset my_courses, find all entries; show Average.",
            "In lectures dataset courses, find all entries; show Average.",
            "In courses data courses, find all entries; show Average.",
            "In courses dataset courses extra, find all entries; show Average.",
        ];
        for query in cases {
            assert!(
                matches!(parse_query(query), Err(QueryError::Syntax(_))),
                "expected syntax error for {:?}",
                query
            );
        }
    }

    #[test]
    fn test_key_dataset_mismatch() {
        let cases = [
            "In courses dataset courses, find entries whose Seats is greater than 10; show Average.",
            "In courses dataset courses, find all entries; show Seats.",
            "In rooms dataset rooms grouped by Department, find all entries; show Department.",
            "In rooms dataset rooms grouped by Name, find all entries; show Name, where x is the AVG of Average.",
        ];
        for query in cases {
            assert!(
                matches!(parse_query(query), Err(QueryError::KeyDatasetMismatch { .. })),
                "expected mismatch for {:?}",
                query
            );
        }
    }

    #[test]
    fn test_invalid_sort_target() {
        let simple = parse_query(
            "In courses dataset courses, find all entries; show Department; sort in ascending order by Average.",
        );
        assert!(matches!(simple, Err(QueryError::InvalidSortTarget(_))));

        let grouped = parse_query(
            "In courses dataset courses grouped by Department, find all entries; show Department, where best is the MAX of Average; sort in ascending order by best.",
        );
        assert!(matches!(grouped, Err(QueryError::InvalidSortTarget(_))));
    }

    #[test]
    fn test_simple_sort_takes_one_key() {
        let result = parse_query(
            "In courses dataset courses, find all entries; show Department and Average; sort in ascending order by Department and Average.",
        );
        assert!(matches!(result, Err(QueryError::Syntax(_))));
    }

    #[test]
    fn test_apply_without_grouping() {
        let result = parse_query(
            "In courses dataset courses, find all entries; show Department, where best is the MAX of Average.",
        );
        assert!(matches!(result, Err(QueryError::Syntax(_))));
    }

    #[test]
    fn test_invalid_aggregations() {
        let cases = [
            "where best is the MEDIAN of Average",
            "where best is the AVG of Title",
            "where best_avg is the MAX of Average",
            "where Average is the MAX of Average",
            "where best is MAX of Average",
            "where best is the MAX of Average and best is the MIN of Average",
        ];
        for apply in cases {
            let query = format!(
                "In courses dataset courses grouped by Department, find all entries; show Department, {}.",
                apply
            );
            assert!(
                matches!(parse_query(&query), Err(QueryError::InvalidAggregation(_))),
                "expected invalid aggregation for {:?}",
                apply
            );
        }
    }

    #[test]
    fn test_count_accepts_string_keys() {
        let plan = parse_query(
            "In courses dataset courses grouped by Department, find all entries; show Department and n, where n is the COUNT of Instructor.",
        )
        .unwrap();
        assert_eq!(
            plan.aggregations()[0].op(),
            AggregateOp::Count(Key::Text(StringKey::Instructor))
        );
    }

    #[test]
    fn test_grouped_display_rules() {
        let ungrouped = parse_query(
            "In courses dataset courses grouped by Department, find all entries; show Department and Average.",
        );
        assert!(matches!(ungrouped, Err(QueryError::UngroupedKey(_))));

        let undeclared = parse_query(
            "In courses dataset courses grouped by Department, find all entries; show Department and best.",
        );
        assert!(matches!(undeclared, Err(QueryError::UnknownKey(_))));

        let unknown_sort = parse_query(
            "In courses dataset courses grouped by Department, find all entries; show Department; sort in ascending order by nothing.",
        );
        assert!(matches!(unknown_sort, Err(QueryError::UnknownKey(_))));
    }

    #[test]
    fn test_repeated_group_keys_are_accepted() {
        let plan = parse_query(
            "In courses dataset courses grouped by Department and Department, find all entries; show Department.",
        )
        .unwrap();
        assert_eq!(plan.group_keys(), &[DEPT, DEPT]);
    }

    #[test]
    fn test_separate_filter_clause() {
        let plan = parse_query(
            "In courses dataset courses grouped by Department; find all entries; show Department, where avgScore is the AVG of Average.",
        )
        .unwrap();
        assert_eq!(plan.columns(), vec!["courses_dept", "avgScore"]);
    }

    #[test]
    fn test_two_word_room_keys() {
        let plan = parse_query(
            "In rooms dataset rooms, find entries whose Short Name is \"DMP\"; show Full Name and Seats.",
        )
        .unwrap();
        assert_eq!(plan.columns(), vec!["rooms_fullname", "rooms_seats"]);
    }
}
