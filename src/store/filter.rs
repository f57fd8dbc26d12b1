//! The filter grammar every query across `MessageStore`, `EventLog`, and
//! the event subscription broker shares, grounded in the teacher's
//! orphaned `dwn/index.rs` (`Filter::{HasField,StartsWith,Equal,OneOf,Cmp,
//! And,Or}`, `PropertyFilter`) and `dwn/query-types.rs`'s
//! `EqualFilter`/`OneOfFilter`/`RangeFilter`/`StartsWithFilter` names.
//!
//! A top-level query is a disjunction of filter maps (`Filters`); within
//! one map every property condition must hold (conjunction). This is the
//! disjunctive-normal-form reading, the one the query grammar's own
//! open question resolves to.
use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Error;

/// A single indexed property value. Numbers are compared numerically,
/// everything else lexicographically; when two values of different kinds
/// are compared the ordering is stable but otherwise arbitrary, since a
/// well-formed index never mixes kinds under one property name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IndexValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl IndexValue {
    fn rank(&self) -> u8 {
        match self {
            IndexValue::Number(_) => 0,
            IndexValue::Bool(_) => 1,
            IndexValue::Text(_) => 2,
        }
    }

    fn starts_with(&self, prefix: &str) -> bool {
        matches!(self, IndexValue::Text(s) if s.starts_with(prefix))
    }
}

impl Eq for IndexValue {}

impl PartialOrd for IndexValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexValue::Number(a), IndexValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (IndexValue::Bool(a), IndexValue::Bool(b)) => a.cmp(b),
            (IndexValue::Text(a), IndexValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// An indexed-property to filter-condition map; every condition in the map
/// must hold for a record to match (conjunction).
pub type Filter = BTreeMap<String, FilterValue>;

/// A top-level query: matches any record that matches at least one of
/// these filter maps (disjunction).
pub type Filters = Vec<Filter>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum FilterValue {
    Equal(IndexValue),
    OneOf(Vec<IndexValue>),
    Range(RangeFilter),
    StartsWith(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct RangeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<IndexValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<IndexValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<IndexValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<IndexValue>,
}

impl RangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.gt.is_some() && self.gte.is_some() {
            return Err(Error::RangeFilterMutuallyExclusive);
        }
        if self.lt.is_some() && self.lte.is_some() {
            return Err(Error::RangeFilterMutuallyExclusive);
        }
        Ok(())
    }

    fn matches(&self, value: &IndexValue) -> bool {
        if let Some(gt) = &self.gt {
            if value <= gt {
                return false;
            }
        }
        if let Some(gte) = &self.gte {
            if value < gte {
                return false;
            }
        }
        if let Some(lt) = &self.lt {
            if value >= lt {
                return false;
            }
        }
        if let Some(lte) = &self.lte {
            if value > lte {
                return false;
            }
        }
        true
    }
}

impl FilterValue {
    fn matches(&self, value: &IndexValue) -> bool {
        match self {
            FilterValue::Equal(expected) => expected == value,
            FilterValue::OneOf(options) => options.contains(value),
            FilterValue::Range(range) => range.matches(value),
            FilterValue::StartsWith(prefix) => value.starts_with(prefix),
        }
    }
}

/// Does `indexes` satisfy every condition in `filter`?
pub fn matches_filter(filter: &Filter, indexes: &BTreeMap<String, IndexValue>) -> bool {
    filter.iter().all(|(property, condition)| match indexes.get(property) {
        Some(value) => condition.matches(value),
        None => false,
    })
}

/// Does `indexes` satisfy at least one filter map in `filters`? An empty
/// filter list matches everything, the same as an unfiltered query.
pub fn matches_any(filters: &Filters, indexes: &BTreeMap<String, IndexValue>) -> bool {
    filters.is_empty() || filters.iter().any(|filter| matches_filter(filter, indexes))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// The pagination boundary: the `(value, messageCid)` pair of the last
/// item the caller already saw, giving a strict total order independent
/// of how many records share the same sort-property value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Cursor {
    pub value: IndexValue,
    pub message_cid: String,
}

#[derive(Clone, Debug)]
pub struct QueryOptions {
    pub sort_property: String,
    pub sort_direction: SortDirection,
    pub limit: Option<usize>,
    pub cursor: Option<Cursor>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            sort_property: "messageTimestamp".to_string(),
            sort_direction: SortDirection::Ascending,
            limit: None,
            cursor: None,
        }
    }
}

/// Total order used for sorted, paginated query results: by the sort
/// property's value, then by CID as a tiebreak, matching the "newest
/// wins" ordering used for conflict resolution elsewhere.
pub fn total_order(
    a: (&IndexValue, &str),
    b: (&IndexValue, &str),
    direction: SortDirection,
) -> Ordering {
    let ordering = a.0.cmp(b.0).then_with(|| a.1.cmp(b.1));
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}
