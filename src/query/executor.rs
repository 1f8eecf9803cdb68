//! Query Executor
//!
//! Executes a [`QueryPlan`] against one dataset snapshot:
//! 1. Load the records from the dataset provider
//! 2. Filter with the left-to-right criteria fold
//! 3. Partition by the group keys (grouped plans only)
//! 4. Aggregate and project into rows
//! 5. Sort
//!
//! # Execution Pipeline
//!
//! ```text
//! Query → Plan → Load → Filter → Group → Aggregate/Project → Sort → Rows
//! ```
//!
//! Everything after the load is synchronous; [`run`] is the pure core and can be
//! called directly on a record snapshot.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use crate::dataset::{DatasetProvider, Record, Records};
use crate::query::ast::*;
use crate::query::error::{QueryError, QueryResult};
use crate::query::filter::apply_filter;
use crate::query::keys::Key;

/// Result of a query execution
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    /// Column names in projection order
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<ResultRow>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Number of records in the dataset
    pub records_scanned: usize,
}

impl QueryOutput {
    /// Get the number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the rows as CSV with a header line of column names
    pub fn write_csv<W: io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;

        for row in &self.rows {
            wtr.write_record(self.columns.iter().map(|column| {
                row.get(column).map(|v| v.to_string()).unwrap_or_default()
            }))?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Query executor
pub struct QueryExecutor {
    provider: Arc<dyn DatasetProvider>,
}

impl QueryExecutor {
    /// Create a new query executor
    pub fn new(provider: Arc<dyn DatasetProvider>) -> Self {
        Self { provider }
    }

    /// Execute a query string (parses and executes)
    pub async fn execute_str(&self, query_str: &str) -> QueryResult<QueryOutput> {
        let plan = crate::query::parser::parse_query(query_str)?;
        self.execute(plan).await
    }

    /// Execute a parsed plan
    pub async fn execute(&self, plan: QueryPlan) -> QueryResult<QueryOutput> {
        let start = Instant::now();

        let dataset = self
            .provider
            .load_dataset(plan.dataset_id(), plan.kind())
            .await?;

        let mut output = run(&plan, &dataset.records)?;
        output.execution_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            dataset = plan.dataset_id(),
            rows = output.len(),
            scanned = output.records_scanned,
            elapsed_ms = output.execution_time_ms,
            "query executed"
        );

        Ok(output)
    }
}

/// Run a plan against a record snapshot
pub fn run(plan: &QueryPlan, records: &Records) -> QueryResult<QueryOutput> {
    if records.kind() != plan.kind() {
        return Err(QueryError::Execution(format!(
            "plan targets a {} dataset but the records are {}",
            plan.kind(),
            records.kind()
        )));
    }

    let start = Instant::now();
    let rows = match records {
        Records::Courses(sections) => run_records(plan, sections)?,
        Records::Rooms(rooms) => run_records(plan, rooms)?,
    };

    Ok(QueryOutput {
        columns: plan.columns(),
        rows,
        execution_time_ms: start.elapsed().as_millis() as u64,
        records_scanned: records.len(),
    })
}

fn run_records<R: Record>(plan: &QueryPlan, records: &[R]) -> QueryResult<Vec<ResultRow>> {
    // 1. Filter
    let matched = apply_filter(plan.filter(), records);

    // 2. Group, aggregate and project
    let mut rows = match plan.grouping() {
        None => matched
            .into_iter()
            .map(|record| project_record(plan.projection(), record))
            .collect::<QueryResult<Vec<_>>>()?,
        Some(grouping) => partition(matched, &grouping.keys)
            .iter()
            .map(|group| project_group(plan.projection(), &grouping.aggregations, group))
            .collect::<QueryResult<Vec<_>>>()?,
    };

    // 3. Sort
    if let Some(sort) = plan.sort() {
        sort_rows(&mut rows, sort);
    }

    Ok(rows)
}

fn key_value<R: Record>(record: &R, key: Key) -> QueryResult<FieldValue> {
    record
        .field(key)
        .map(FieldValue::from)
        .ok_or_else(|| QueryError::Execution(format!("record has no {} field", key.field_name())))
}

fn project_record<R: Record>(projection: &[Column], record: &R) -> QueryResult<ResultRow> {
    let mut row = ResultRow::default();
    for column in projection {
        match column {
            Column::Key(key) => row.push(column.name(), key_value(record, *key)?),
            Column::Alias(alias) => {
                return Err(QueryError::Execution(format!(
                    "alias '{}' in a plan without grouping",
                    alias
                )))
            }
        }
    }
    Ok(row)
}

fn project_group<R: Record>(
    projection: &[Column],
    aggregations: &[Aggregation],
    group: &[&R],
) -> QueryResult<ResultRow> {
    let first = group
        .first()
        .ok_or_else(|| QueryError::Execution("empty group".to_string()))?;

    let mut row = ResultRow::default();
    for column in projection {
        let value = match column {
            // Every member shares the group key values
            Column::Key(key) => key_value(*first, *key)?,
            Column::Alias(alias) => {
                let aggregation = aggregations
                    .iter()
                    .find(|a| a.alias() == alias)
                    .ok_or_else(|| QueryError::Execution(format!("undeclared alias '{}'", alias)))?;
                FieldValue::Number(aggregation.op().apply(group)?)
            }
        };
        row.push(column.name(), value);
    }
    Ok(row)
}

/// Split records into groups sharing every key's value.
///
/// Refines one key at a time; groups keep first-seen order within their parent.
fn partition<'a, R: Record>(records: Vec<&'a R>, keys: &[Key]) -> Vec<Vec<&'a R>> {
    if records.is_empty() {
        return Vec::new();
    }

    let mut groups = vec![records];
    for key in keys {
        groups = groups
            .into_iter()
            .flat_map(|group| split_by(group, *key))
            .collect();
    }
    groups
}

fn split_by<'a, R: Record>(group: Vec<&'a R>, key: Key) -> Vec<Vec<&'a R>> {
    let mut slots: HashMap<Option<ValueKey<'a>>, usize> = HashMap::new();
    let mut split: Vec<Vec<&'a R>> = Vec::new();

    for record in group {
        let value = record.field(key).map(ValueKey::from);
        let slot = *slots.entry(value).or_insert_with(|| {
            split.push(Vec::new());
            split.len() - 1
        });
        split[slot].push(record);
    }

    split
}

/// Stable lexicographic sort; descending reverses the ascending order
fn sort_rows(rows: &mut [ResultRow], sort: &SortSpec) {
    let names: Vec<String> = sort.targets.iter().map(Column::name).collect();

    rows.sort_by(|a, b| {
        names
            .iter()
            .map(|name| compare_values(a.get(name), b.get(name)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    if sort.direction == SortDirection::Descending {
        rows.reverse();
    }
}

fn compare_values(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    match (a, b) {
        (Some(FieldValue::Number(x)), Some(FieldValue::Number(y))) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Some(FieldValue::Text(x)), Some(FieldValue::Text(y))) => x.cmp(y),
        (Some(FieldValue::Number(_)), Some(FieldValue::Text(_))) => Ordering::Less,
        (Some(FieldValue::Text(_)), Some(FieldValue::Number(_))) => Ordering::Greater,
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::{courses_dataset, rooms_dataset, sample_sections, section};
    use crate::dataset::{DatasetKind, MemoryProvider};
    use crate::query::parser::parse_query;

    async fn create_test_executor() -> QueryExecutor {
        let provider = MemoryProvider::new();
        provider.insert(courses_dataset("courses")).await;
        provider.insert(rooms_dataset("rooms")).await;
        QueryExecutor::new(Arc::new(provider))
    }

    fn run_str(query: &str, records: &Records) -> QueryOutput {
        run(&parse_query(query).unwrap(), records).unwrap()
    }

    fn numbers(output: &QueryOutput, column: &str) -> Vec<f64> {
        output
            .rows
            .iter()
            .filter_map(|row| row.get(column).and_then(FieldValue::as_f64))
            .collect()
    }

    fn texts(output: &QueryOutput, column: &str) -> Vec<String> {
        output
            .rows
            .iter()
            .filter_map(|row| row.get(column).and_then(FieldValue::as_str))
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_filtered_sorted_courses() {
        let executor = create_test_executor().await;

        let output = executor
            .execute_str(
                "In courses dataset courses, find entries whose Department is \"cpsc\" and Average is greater than 90; show Department, ID, Average; sort in descending order by Average.",
            )
            .await
            .unwrap();

        assert_eq!(output.columns, vec!["courses_dept", "courses_id", "courses_avg"]);
        assert_eq!(output.len(), 2);
        assert_eq!(numbers(&output, "courses_avg"), vec![95.0, 92.0]);
        assert_eq!(output.records_scanned, 5);
    }

    #[tokio::test]
    async fn test_grouped_average() {
        let executor = create_test_executor().await;

        let output = executor
            .execute_str(
                "In courses dataset courses grouped by Department; find all entries; show Department, where avgScore is the AVG of Average.",
            )
            .await
            .unwrap();

        assert_eq!(output.len(), 3);
        assert_eq!(texts(&output, "courses_dept"), vec!["cpsc", "math", "eece"]);
        assert_eq!(numbers(&output, "avgScore"), vec![89.0, 99.0, 91.0]);
    }

    #[tokio::test]
    async fn test_rooms_filter_keeps_dataset_order() {
        let executor = create_test_executor().await;

        let output = executor
            .execute_str(
                "In rooms dataset rooms, find entries whose Seats is greater than 350; show Name and Seats.",
            )
            .await
            .unwrap();

        assert_eq!(output.columns, vec!["rooms_name", "rooms_seats"]);
        assert_eq!(numbers(&output, "rooms_seats"), vec![426.0, 375.0, 503.0]);
        assert_eq!(texts(&output, "rooms_name"), vec!["WOOD_2", "HEBB_100", "CIRS_1250"]);
    }

    #[tokio::test]
    async fn test_missing_dataset() {
        let executor = create_test_executor().await;

        let result = executor
            .execute_str("In courses dataset other, find all entries; show Average.")
            .await;
        assert!(matches!(result, Err(QueryError::DatasetNotFound(ref id)) if id == "other"));

        // A dataset registered under the other kind is not visible
        let result = executor
            .execute_str("In courses dataset rooms, find all entries; show Average.")
            .await;
        assert!(matches!(result, Err(QueryError::DatasetNotFound(_))));
    }

    #[test]
    fn test_match_all_keeps_every_record() {
        let records = Records::Courses(sample_sections());
        let output = run_str(
            "In courses dataset courses, find all entries; show UUID.",
            &records,
        );
        assert_eq!(output.len(), records.len());
    }

    #[test]
    fn test_count_distinct_per_group() {
        let records = Records::Courses(vec![
            section("cpsc", "310", 80.0),
            section("cpsc", "310", 85.0),
            section("cpsc", "310", 90.0),
            section("math", "100", 70.0),
        ]);
        let output = run_str(
            "In courses dataset courses grouped by Department, find all entries; show Department, courses and sections, where courses is the COUNT of ID and sections is the COUNT of UUID.",
            &records,
        );

        assert_eq!(numbers(&output, "courses"), vec![1.0, 1.0]);
        assert_eq!(numbers(&output, "sections"), vec![3.0, 1.0]);
    }

    #[test]
    fn test_average_rounding_is_exact() {
        let records = Records::Courses(vec![
            section("cpsc", "310", 1.005),
            section("cpsc", "311", 1.005),
            section("cpsc", "312", 1.005),
        ]);
        let output = run_str(
            "In courses dataset courses grouped by Department, find all entries; show avg, where avg is the AVG of Average.",
            &records,
        );
        assert_eq!(numbers(&output, "avg"), vec![1.01]);
    }

    #[test]
    fn test_composite_groups() {
        let records = Records::Courses(vec![
            section("cpsc", "310", 80.0),
            section("math", "100", 70.0),
            section("cpsc", "210", 60.0),
            section("cpsc", "310", 90.0),
        ]);
        let output = run_str(
            "In courses dataset courses grouped by Department and ID, find all entries; show Department, ID, lo and hi, where lo is the MIN of Average and hi is the MAX of Average.",
            &records,
        );

        assert_eq!(texts(&output, "courses_id"), vec!["310", "210", "100"]);
        assert_eq!(numbers(&output, "lo"), vec![80.0, 60.0, 70.0]);
        assert_eq!(numbers(&output, "hi"), vec![90.0, 60.0, 70.0]);
    }

    #[test]
    fn test_empty_filter_yields_no_groups() {
        let records = Records::Courses(sample_sections());
        let output = run_str(
            "In courses dataset courses grouped by Department, find entries whose Average is greater than 100; show Department, where n is the COUNT of UUID.",
            &records,
        );
        assert!(output.is_empty());
        assert_eq!(output.records_scanned, 5);
    }

    #[test]
    fn test_multi_key_sort() {
        let records = Records::Courses(vec![
            section("math", "100", 70.0),
            section("cpsc", "310", 90.0),
            section("cpsc", "210", 90.0),
            section("eece", "100", 80.0),
        ]);
        let output = run_str(
            "In courses dataset courses grouped by Department and ID, find all entries; show Department, ID and best, where best is the MAX of Average; sort in descending order by best and ID.",
            &records,
        );

        assert_eq!(numbers(&output, "best"), vec![90.0, 90.0, 80.0, 70.0]);
        assert_eq!(texts(&output, "courses_id"), vec!["310", "210", "100", "100"]);
    }

    #[test]
    fn test_sum_is_rounded() {
        let records = Records::Courses(vec![
            section("cpsc", "310", 0.1),
            section("cpsc", "311", 0.2),
        ]);
        let output = run_str(
            "In courses dataset courses grouped by Department, find all entries; show total, where total is the SUM of Average.",
            &records,
        );
        assert_eq!(numbers(&output, "total"), vec![0.3]);
    }

    #[test]
    fn test_write_csv() {
        let records = Records::Rooms(crate::dataset::fixtures::sample_rooms());
        let output = run_str(
            "In rooms dataset rooms, find entries whose Seats is less than 400; show Short Name and Seats; sort in ascending order by Seats.",
            &records,
        );

        let mut buf = Vec::new();
        output.write_csv(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "rooms_shortname,rooms_seats\nDMP,100\nHEBB,375\n"
        );
    }

    #[test]
    fn test_run_rejects_other_kind() {
        let plan = parse_query("In courses dataset courses, find all entries; show Average.").unwrap();
        assert_eq!(plan.kind(), DatasetKind::Courses);
        let rooms = rooms_dataset("rooms").records;
        assert!(matches!(run(&plan, &rooms), Err(QueryError::Execution(_))));
    }
}
