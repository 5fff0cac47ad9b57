//! Field comparators.
//!
//! One comparator per record family. Each compares only the fields the CMDB
//! mirrors for that family and returns the minimal update payload, or `None`
//! when nothing drifted. Absent collections are treated as empty, and an
//! emptied collection is reported as a change to the empty value.

pub mod cluster;
pub mod namespace;
pub mod node;
pub mod pod;
pub mod workload;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Changed fields of one record, as sent in the `updatemany` `data` object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDelta(Map<String, Value>);

impl FieldDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.0.insert(field.to_string(), value);
            }
            Err(e) => warn!("Cannot encode field {} for update: {}", field, e),
        }
    }

    /// Record `desired` under `field` when it differs from `current`
    pub fn track<T: PartialEq + Serialize + ?Sized>(&mut self, field: &str, current: &T, desired: &T) {
        if current != desired {
            self.set(field, desired);
        }
    }

    /// Like [`track`](Self::track), but only when the desired side carries a value
    pub fn track_some<T: PartialEq + Serialize>(&mut self, field: &str, current: &Option<T>, desired: &Option<T>) {
        if let Some(value) = desired {
            if current.as_ref() != Some(value) {
                self.set(field, value);
            }
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// `None` when no field changed
    pub fn into_change(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}
