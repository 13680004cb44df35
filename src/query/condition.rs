//! Filter and ordering conditions.
//!
//! Each condition renders one SQL fragment over the `photos` columns. A
//! `ConditionSet` holds at most one condition per kind; setting a condition
//! of a kind already present replaces it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::TagId;

pub trait QueryCondition {
    /// WHERE fragment, or ORDER BY fragment for order conditions.
    /// Empty means "no restriction".
    fn sql_clause(&self) -> String;

    fn is_order(&self) -> bool {
        false
    }
}

/// Photos taken within `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

impl QueryCondition for DateRange {
    fn sql_clause(&self) -> String {
        format!("time >= {} AND time <= {}", self.start.timestamp(), self.end.timestamp())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingRange {
    pub min: u32,
    pub max: Option<u32>,
}

impl RatingRange {
    pub fn at_least(min: u32) -> Self {
        Self { min, max: None }
    }

    pub fn between(min: u32, max: u32) -> Self {
        Self { min, max: Some(max) }
    }
}

impl QueryCondition for RatingRange {
    fn sql_clause(&self) -> String {
        match self.max {
            Some(max) => format!("rating >= {} AND rating <= {}", self.min, max),
            None => format!("rating >= {}", self.min),
        }
    }
}

/// Photos belonging to any of the given import rolls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollSet {
    pub rolls: Vec<i64>,
}

impl RollSet {
    pub fn new(rolls: &[i64]) -> Self {
        Self { rolls: rolls.to_vec() }
    }
}

impl QueryCondition for RollSet {
    fn sql_clause(&self) -> String {
        if self.rolls.is_empty() {
            return String::new();
        }
        let ids: Vec<String> = self.rolls.iter().map(|r| r.to_string()).collect();
        format!("roll_id IN ({})", ids.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenPolicy {
    Show,
    Hide,
    Only,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiddenTag {
    pub policy: HiddenPolicy,
    pub tag: Option<TagId>,
}

impl HiddenTag {
    pub fn show(tag: Option<TagId>) -> Self {
        Self { policy: HiddenPolicy::Show, tag }
    }

    pub fn hide(tag: Option<TagId>) -> Self {
        Self { policy: HiddenPolicy::Hide, tag }
    }

    pub fn only(tag: Option<TagId>) -> Self {
        Self { policy: HiddenPolicy::Only, tag }
    }
}

impl QueryCondition for HiddenTag {
    fn sql_clause(&self) -> String {
        let Some(tag) = self.tag else {
            return String::new();
        };
        let membership = format!("(SELECT photo_id FROM photo_tags WHERE tag_id = {})", tag);
        match self.policy {
            HiddenPolicy::Show => String::new(),
            HiddenPolicy::Hide => format!("id NOT IN {}", membership),
            HiddenPolicy::Only => format!("id IN {}", membership),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderByTime {
    pub ascending: bool,
}

impl OrderByTime {
    pub const ASCENDING: Self = Self { ascending: true };
    pub const DESCENDING: Self = Self { ascending: false };
}

impl QueryCondition for OrderByTime {
    fn sql_clause(&self) -> String {
        format!("time {}", if self.ascending { "ASC" } else { "DESC" })
    }

    fn is_order(&self) -> bool {
        true
    }
}

/// Photos without any tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Untagged;

impl QueryCondition for Untagged {
    fn sql_clause(&self) -> String {
        "id NOT IN (SELECT DISTINCT photo_id FROM photo_tags)".to_string()
    }
}

/// A pre-rendered fragment, typically a compiled `Term`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionWrapper(pub String);

impl QueryCondition for ConditionWrapper {
    fn sql_clause(&self) -> String {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    DateRange(DateRange),
    RatingRange(RatingRange),
    RollSet(RollSet),
    HiddenTag(HiddenTag),
    Untagged(Untagged),
    Wrapper(ConditionWrapper),
    OrderByTime(OrderByTime),
}

/// Key a `ConditionSet` stores conditions under. Declaration order is the
/// order fragments are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionKind {
    DateRange,
    RatingRange,
    RollSet,
    HiddenTag,
    Untagged,
    Wrapper,
    OrderByTime,
}

impl Condition {
    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::DateRange(_) => ConditionKind::DateRange,
            Condition::RatingRange(_) => ConditionKind::RatingRange,
            Condition::RollSet(_) => ConditionKind::RollSet,
            Condition::HiddenTag(_) => ConditionKind::HiddenTag,
            Condition::Untagged(_) => ConditionKind::Untagged,
            Condition::Wrapper(_) => ConditionKind::Wrapper,
            Condition::OrderByTime(_) => ConditionKind::OrderByTime,
        }
    }

    fn inner(&self) -> &dyn QueryCondition {
        match self {
            Condition::DateRange(c) => c,
            Condition::RatingRange(c) => c,
            Condition::RollSet(c) => c,
            Condition::HiddenTag(c) => c,
            Condition::Untagged(c) => c,
            Condition::Wrapper(c) => c,
            Condition::OrderByTime(c) => c,
        }
    }
}

impl QueryCondition for Condition {
    fn sql_clause(&self) -> String {
        self.inner().sql_clause()
    }

    fn is_order(&self) -> bool {
        self.inner().is_order()
    }
}

macro_rules! impl_from_condition {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Condition {
                fn from(c: $variant) -> Self {
                    Condition::$variant(c)
                }
            }
        )+
    };
}

impl_from_condition!(DateRange, RatingRange, RollSet, HiddenTag, Untagged, OrderByTime);

impl From<ConditionWrapper> for Condition {
    fn from(c: ConditionWrapper) -> Self {
        Condition::Wrapper(c)
    }
}

/// At most one condition per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSet {
    conditions: BTreeMap<ConditionKind, Condition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace the condition of this kind. Returns `false` when an
    /// equal condition was already present.
    pub fn set(&mut self, condition: impl Into<Condition>) -> bool {
        let condition = condition.into();
        let kind = condition.kind();
        if self.conditions.get(&kind) == Some(&condition) {
            return false;
        }
        self.conditions.insert(kind, condition);
        true
    }

    pub fn remove(&mut self, kind: ConditionKind) -> bool {
        self.conditions.remove(&kind).is_some()
    }

    pub fn get(&self, kind: ConditionKind) -> Option<&Condition> {
        self.conditions.get(&kind)
    }

    pub fn contains(&self, kind: ConditionKind) -> bool {
        self.conditions.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.values()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Condition> {
        self.iter().cloned().collect()
    }
}
