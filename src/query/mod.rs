//! Query compiler: tag terms, typed conditions and SQL assembly.

pub mod builder;
pub mod condition;
pub mod term;

pub use builder::{build_query, materialize, where_clauses, where_sql};
pub use condition::{
    Condition, ConditionKind, ConditionSet, ConditionWrapper, DateRange, HiddenPolicy, HiddenTag,
    OrderByTime, QueryCondition, RatingRange, RollSet, Untagged,
};
pub use term::{TagRequirement, Term, TermError};
