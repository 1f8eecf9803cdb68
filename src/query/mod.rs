//! Insight Query Engine
//!
//! Compiles restricted-English queries over course and room datasets and runs
//! them against an immutable record snapshot:
//!
//! - **Slicer**: Cut a query string into clauses
//! - **Keys**: The closed key vocabulary and its dataset scoping
//! - **Filter**: Compile and evaluate `find ...` clauses
//! - **Parser**: Build a validated [`QueryPlan`]
//! - **Executor**: Filter, group, aggregate, project and sort
//!
//! # Query Language
//!
//! ```text
//! In <kind> dataset <id>[ grouped by <keys>], find all entries | find entries whose <criteria>;
//! show <keys or aliases>[, where <alias> is the <FUNCTION> of <key> ...];
//! [sort in ascending|descending order by <keys or aliases>].
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use insight::query::{parse_query, run};
//!
//! let plan = parse_query(
//!     "In courses dataset courses, find entries whose Average is greater than 90; show Department and Average.",
//! )?;
//! let output = run(&plan, &dataset.records)?;
//! ```
//!
//! ## Through a provider
//!
//! ```rust,ignore
//! let executor = QueryExecutor::new(Arc::new(store));
//! let output = executor.execute_str(
//!     "In rooms dataset rooms grouped by ShortName, find all entries; show ShortName and seats, where seats is the SUM of Seats.",
//! ).await?;
//! ```

mod ast;
mod error;
mod executor;
mod filter;
mod keys;
mod parser;
mod slicer;

pub use ast::{
    round2, AggregateFunction, AggregateOp, Aggregation, Column, Connector, Criterion,
    FieldValue, FilterExpr, Grouping, NumericOp, QueryPlan, ResultRow, SortDirection, SortSpec,
    StringOp,
};
pub use error::{QueryError, QueryResult};
pub use executor::{run, QueryExecutor, QueryOutput};
pub use filter::{apply_filter, check_scope, compile_filter};
pub use keys::{resolve_field, resolve_key, Key, NumericKey, StringKey};
pub use parser::parse_query;
pub use slicer::{slice_query, tokenize, SlicedQuery, SortClause};
