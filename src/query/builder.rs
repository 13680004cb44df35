//! Compiles condition lists into SQL and materializes results into
//! positionally addressable temp tables.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use super::condition::{Condition, HiddenTag, QueryCondition};
use crate::db::Database;
use crate::model::TagId;

/// Non-empty WHERE fragments of `conditions`, in order.
///
/// When no hidden-tag condition is present, the default "hide the hidden
/// tag" fragment is appended.
pub fn where_clauses(conditions: &[Condition], hidden_tag: Option<TagId>) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut hidden_contained = false;
    for condition in conditions {
        if matches!(condition, Condition::HiddenTag(_)) {
            hidden_contained = true;
        }
        if condition.is_order() {
            continue;
        }
        let clause = condition.sql_clause();
        if clause.trim().is_empty() {
            continue;
        }
        clauses.push(clause);
    }
    if !hidden_contained {
        let clause = HiddenTag::hide(hidden_tag).sql_clause();
        if !clause.is_empty() {
            clauses.push(clause);
        }
    }
    clauses
}

/// ` WHERE a AND b`, or an empty string.
pub fn where_sql(conditions: &[Condition], hidden_tag: Option<TagId>) -> String {
    let clauses = where_clauses(conditions, hidden_tag);
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

pub fn build_query(conditions: &[Condition], hidden_tag: Option<TagId>) -> String {
    let mut query = format!("SELECT * FROM photos{}", where_sql(conditions, hidden_tag));

    let order: Vec<String> = conditions
        .iter()
        .filter(|c| c.is_order())
        .map(QueryCondition::sql_clause)
        .filter(|c| !c.trim().is_empty())
        .collect();
    if !order.is_empty() {
        query.push_str(" ORDER BY ");
        query.push_str(&order.join(", "));
    }
    query
}

/// Replace `table_name` with the result of `query`, atomically.
///
/// Row `n` of the result lands at ROWID `n + 1`.
pub fn materialize(db: &Database, table_name: &str, query: &str) -> Result<()> {
    let start = Instant::now();
    let tx = db.transaction().context("begin materialize")?;
    db.execute(&format!("DROP TABLE IF EXISTS {}", table_name), [])?;
    db.execute(&format!("CREATE TEMPORARY TABLE {} AS {}", table_name, query), [])?;
    tx.commit()?;
    debug!(table = table_name, elapsed = ?start.elapsed(), "materialized query");
    Ok(())
}
