//! Session queries: filters, ordering and the result limit
//!
//! Filters compare a session field against a string value. When both sides
//! parse as integers the comparison is numeric, otherwise lexicographic.
//! Only public attributes are visible to queries.

use crate::session::SessionRecord;
use crate::types::Visibility;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default number of results per query
pub const DEFAULT_QUERY_COUNT: usize = 25;

/// Upper bound on a single page
pub const MAX_QUERY_COUNT: usize = 100;

/// Field a filter or ordering refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryField {
    AvailableSlots,
    MaxMembers,
    Name,
    Created,
    /// A public session attribute by key
    Attribute(String),
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

/// A single filter; all filters of a query must match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub field: QueryField,
    pub op: FilterOp,
    pub value: String,
}

impl QueryFilter {
    pub fn new(field: QueryField, op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            field,
            op,
            value: value.into(),
        }
    }

    /// Sessions with at least one open slot
    pub fn has_open_slots() -> Self {
        Self::new(QueryField::AvailableSlots, FilterOp::Gt, "0")
    }

    /// Public attribute equal to a value
    pub fn attribute_eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(QueryField::Attribute(key.into()), FilterOp::Eq, value)
    }

    /// Whether the record satisfies this filter
    pub fn matches(&self, record: &SessionRecord) -> bool {
        let Some(actual) = field_value(record, &self.field) else {
            // Missing attributes only satisfy "not equal"
            return self.op == FilterOp::Ne;
        };

        let ordering = || compare(&actual, &self.value);
        match self.op {
            FilterOp::Contains => actual.contains(self.value.as_str()),
            FilterOp::Eq => ordering() == Ordering::Equal,
            FilterOp::Ne => ordering() != Ordering::Equal,
            FilterOp::Lt => ordering() == Ordering::Less,
            FilterOp::Le => ordering() != Ordering::Greater,
            FilterOp::Gt => ordering() == Ordering::Greater,
            FilterOp::Ge => ordering() != Ordering::Less,
        }
    }
}

/// Result ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOrder {
    pub field: QueryField,
    pub ascending: bool,
}

impl QueryOrder {
    /// Newest sessions first
    pub fn newest_first() -> Self {
        Self {
            field: QueryField::Created,
            ascending: false,
        }
    }

    fn compare(&self, a: &SessionRecord, b: &SessionRecord) -> Ordering {
        let ordering = match self.field {
            QueryField::Created => a.created().cmp(&b.created()),
            QueryField::AvailableSlots => a.available_slots().cmp(&b.available_slots()),
            QueryField::MaxMembers => a.max_members().cmp(&b.max_members()),
            _ => {
                let left = field_value(a, &self.field).unwrap_or_default();
                let right = field_value(b, &self.field).unwrap_or_default();
                compare(&left, &right)
            }
        };

        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// A query against the lobby directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionQuery {
    pub filters: Vec<QueryFilter>,
    pub order: Vec<QueryOrder>,
    pub count: usize,
}

impl Default for SessionQuery {
    /// Up to 25 sessions with open slots, newest first
    fn default() -> Self {
        Self {
            filters: vec![QueryFilter::has_open_slots()],
            order: vec![QueryOrder::newest_first()],
            count: DEFAULT_QUERY_COUNT,
        }
    }
}

impl SessionQuery {
    /// An unfiltered, unordered query
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order: Vec::new(),
            count: DEFAULT_QUERY_COUNT,
        }
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order: QueryOrder) -> Self {
        self.order.push(order);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Whether a record passes every filter
    pub fn matches(&self, record: &SessionRecord) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Filter, order and truncate a set of records
    pub fn apply<'a, I>(&self, records: I) -> Vec<SessionRecord>
    where
        I: IntoIterator<Item = &'a SessionRecord>,
    {
        let mut matched: Vec<&SessionRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();

        matched.sort_by(|a, b| {
            self.order
                .iter()
                .map(|o| o.compare(a, b))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        matched
            .into_iter()
            .take(self.count)
            .cloned()
            .collect()
    }
}

fn field_value(record: &SessionRecord, field: &QueryField) -> Option<String> {
    match field {
        QueryField::AvailableSlots => Some(record.available_slots().to_string()),
        QueryField::MaxMembers => Some(record.max_members().to_string()),
        QueryField::Name => Some(record.name().to_string()),
        QueryField::Created => Some(record.created().to_rfc3339()),
        QueryField::Attribute(key) => record
            .data()
            .get(key)
            .filter(|d| d.visibility == Visibility::Public)
            .map(|d| d.value.clone()),
    }
}

fn compare(actual: &str, expected: &str) -> Ordering {
    match (actual.parse::<i64>(), expected.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => actual.cmp(expected),
    }
}
