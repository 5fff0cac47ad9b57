//! Query utilities for the CMDB API
//!
//! Provides the `filter` expression used by every `findmany` call, a local
//! evaluator for that expression (used by the mirror and the mock), and the
//! page loop shared by all resource kinds.

use crate::models::FindResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use tracing::debug;

/// Fixed page size for every listing call
pub const PAGE_SIZE: u64 = 100;

/// Page window of a `findmany` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub start: u64,
    pub limit: u64,
}

impl Page {
    pub fn first() -> Self {
        Self { start: 0, limit: PAGE_SIZE }
    }

    pub fn next(self) -> Self {
        Self { start: self.start + self.limit, limit: self.limit }
    }
}

/// Logical connective of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Condition {
    And,
    Or,
}

/// Rule operators understood by the CMDB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    In,
    NotIn,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
    Exist,
}

/// Single `field operator value` rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRule {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

/// A rule is either an atom or a nested filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    Atom(AtomRule),
    Combined(Filter),
}

impl Rule {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Rule::atom(field, Operator::Equal, value.into())
    }

    pub fn not_equal(field: &str, value: impl Into<Value>) -> Self {
        Rule::atom(field, Operator::NotEqual, value.into())
    }

    pub fn is_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Rule::atom(field, Operator::In, Value::Array(values))
    }

    fn atom(field: &str, operator: Operator, value: Value) -> Self {
        Rule::Atom(AtomRule { field: field.to_string(), operator, value })
    }

    fn matches(&self, record: &Value) -> bool {
        match self {
            Rule::Atom(atom) => atom.matches(record),
            Rule::Combined(filter) => filter.matches(record),
        }
    }
}

/// CMDB `filter` expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub condition: Condition,
    pub rules: Vec<Rule>,
}

impl Filter {
    pub fn and(rules: Vec<Rule>) -> Self {
        Self { condition: Condition::And, rules }
    }

    pub fn or(rules: Vec<Rule>) -> Self {
        Self { condition: Condition::Or, rules }
    }

    /// Filter that matches every record
    pub fn all() -> Self {
        Self::and(Vec::new())
    }

    /// Records whose CMDB id is one of `ids`
    pub fn ids(ids: &[i64]) -> Self {
        Self::and(vec![Rule::is_in("id", ids.iter().copied())])
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate the filter against a JSON record the way the CMDB would.
    pub fn matches(&self, record: &Value) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        match self.condition {
            Condition::And => self.rules.iter().all(|r| r.matches(record)),
            Condition::Or => self.rules.iter().any(|r| r.matches(record)),
        }
    }
}

impl AtomRule {
    fn matches(&self, record: &Value) -> bool {
        let actual = lookup(record, &self.field);
        match self.operator {
            Operator::Exist => {
                let wanted = self.value.as_bool().unwrap_or(true);
                actual.is_some_and(|v| !v.is_null()) == wanted
            }
            Operator::Equal => actual.is_some_and(|v| values_equal(v, &self.value)),
            Operator::NotEqual => !actual.is_some_and(|v| values_equal(v, &self.value)),
            Operator::In => match (&self.value, actual) {
                (Value::Array(options), Some(v)) => options.iter().any(|o| values_equal(v, o)),
                _ => false,
            },
            Operator::NotIn => match (&self.value, actual) {
                (Value::Array(options), Some(v)) => !options.iter().any(|o| values_equal(v, o)),
                (Value::Array(_), None) => true,
                _ => false,
            },
            Operator::Less => compare(actual, &self.value).is_some_and(|o| o.is_lt()),
            Operator::LessOrEqual => compare(actual, &self.value).is_some_and(|o| o.is_le()),
            Operator::Greater => compare(actual, &self.value).is_some_and(|o| o.is_gt()),
            Operator::GreaterOrEqual => compare(actual, &self.value).is_some_and(|o| o.is_ge()),
            Operator::Contains => match actual {
                Some(Value::String(s)) => self.value.as_str().is_some_and(|needle| s.contains(needle)),
                Some(Value::Array(items)) => items.iter().any(|i| values_equal(i, &self.value)),
                _ => false,
            },
        }
    }
}

/// Resolve a dotted field path (`ref.id`) inside a record.
fn lookup<'a>(record: &'a Value, field: &str) -> Option<&'a Value> {
    field.split('.').try_fold(record, |current, segment| current.get(segment))
}

/// Numbers compare by value regardless of integer/float representation.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let actual = actual?;
    if let (Some(x), Some(y)) = (actual.as_f64(), expected.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (actual.as_str(), expected.as_str()) {
        (Some(x), Some(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Fetch every page of a listing.
///
/// Pages are requested with the fixed [`PAGE_SIZE`], advancing the start
/// offset until a page comes back shorter than the page size or the total
/// `count` reported by the CMDB has been received.
pub async fn fetch_all_pages<T, E, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(Page) -> Fut,
    Fut: Future<Output = Result<FindResult<T>, E>>,
{
    let mut all_results = Vec::new();
    let mut page = Page::first();

    loop {
        debug!("Fetching page: start={} limit={}", page.start, page.limit);
        let result = fetch_page(page).await?;
        let received = result.info.len() as u64;
        all_results.extend(result.info);

        let reached_count = result.count > 0 && all_results.len() as u64 >= result.count;
        if received < page.limit || reached_count {
            break;
        }
        page = page.next();
    }

    Ok(all_results)
}
