//! Collaborator traits
//!
//! The key-value store, message sinks and secret lookup are injected into
//! [`crate::CommonOperations`] as trait objects; provider crates implement
//! them on top of the vendor SDKs.

use crate::error::Result;
use crate::record::{AttributeValue, ProviderRecord};
use async_trait::async_trait;

/// Key-value store holding provider records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record; `Ok(None)` when no record has this key
    async fn get_record(&self, table: &str, key: &ProviderRecord) -> Result<Option<ProviderRecord>>;

    /// Write a whole record, replacing any record with the same key
    async fn put_record(&self, table: &str, record: &ProviderRecord) -> Result<()>;

    /// Every record of `table`, reduced to `attributes` (all attributes when empty)
    async fn scan_records(&self, table: &str, attributes: &[String]) -> Result<Vec<ProviderRecord>>;

    /// Records matching a key condition, optionally through a secondary index
    async fn query_records(&self, table: &str, query: &RecordQuery) -> Result<Vec<ProviderRecord>>;

    /// Apply field updates, returning the updated attributes
    async fn update_record(
        &self,
        table: &str,
        key: &ProviderRecord,
        updates: &FieldUpdates,
    ) -> Result<ProviderRecord>;
}

/// Queue or notification topic accepting JSON payloads
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver `payload` to `destination` (queue URL, topic ARN), returning the message id
    async fn send(&self, destination: &str, payload: &serde_json::Value) -> Result<String>;
}

/// Secret / parameter lookup
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// Replace the value of `field` if present, append it otherwise
fn upsert(entries: &mut Vec<(String, AttributeValue)>, field: String, value: AttributeValue) {
    match entries.iter_mut().find(|(f, _)| *f == field) {
        Some(entry) => entry.1 = value,
        None => entries.push((field, value)),
    }
}

/// Distinct field names, in first-use order; `#n{i}` names the i-th one
fn distinct<'a>(fields: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
    let mut names: Vec<&str> = Vec::new();
    for field in fields {
        if !names.contains(&field.as_str()) {
            names.push(field);
        }
    }
    names
}

fn name_placeholder(names: &[&str], field: &str) -> String {
    let index = names.iter().position(|n| *n == field).unwrap_or_default();
    format!("#n{index}")
}

fn numbered_names(names: &[&str]) -> Vec<(String, String)> {
    names
        .iter()
        .enumerate()
        .map(|(i, field)| (format!("#n{i}"), field.to_string()))
        .collect()
}

/// Named field updates with optional preconditions
///
/// Renders to the store's placeholder form: `SET #n0 = :v0` with
/// `{"#n0": "status"}` names and `{":v0": ...}` values. Placeholders are
/// numbered, so any attribute name can be used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates {
    sets: Vec<(String, AttributeValue)>,
    expected: Vec<(String, AttributeValue)>,
    must_exist: Option<String>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`; setting the same field twice keeps the last value
    pub fn set(mut self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        upsert(&mut self.sets, field.into(), value.into());
        self
    }

    /// Only apply when `field` currently equals `value`; a later expectation
    /// on the same field replaces the earlier one
    pub fn expect(mut self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        upsert(&mut self.expected, field.into(), value.into());
        self
    }

    /// Only apply when the record already exists (`field` is its key attribute)
    pub fn require_existing(mut self, key_field: impl Into<String>) -> Self {
        self.must_exist = Some(key_field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn has_expectations(&self) -> bool {
        !self.expected.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.sets.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn expectations(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.expected.iter().map(|(f, v)| (f.as_str(), v))
    }

    /// Key attribute that must exist for the update to apply
    pub fn required_key(&self) -> Option<&str> {
        self.must_exist.as_deref()
    }

    fn names(&self) -> Vec<&str> {
        distinct(
            self.sets
                .iter()
                .chain(self.expected.iter())
                .map(|(f, _)| f)
                .chain(self.must_exist.iter()),
        )
    }

    pub fn update_expression(&self) -> String {
        let names = self.names();
        let assignments: Vec<String> = self
            .sets
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = :v{i}", name_placeholder(&names, field)))
            .collect();
        format!("SET {}", assignments.join(", "))
    }

    /// Condition expression, if any precondition was given
    pub fn condition_expression(&self) -> Option<String> {
        let names = self.names();
        let mut clauses = Vec::new();
        if let Some(key) = &self.must_exist {
            clauses.push(format!("attribute_exists({})", name_placeholder(&names, key)));
        }
        for (i, (field, _)) in self.expected.iter().enumerate() {
            clauses.push(format!("{} = :e{i}", name_placeholder(&names, field)));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    pub fn attribute_names(&self) -> Vec<(String, String)> {
        numbered_names(&self.names())
    }

    pub fn attribute_values(&self) -> Vec<(String, AttributeValue)> {
        self.sets
            .iter()
            .enumerate()
            .map(|(i, (_, value))| (format!(":v{i}"), value.clone()))
            .chain(
                self.expected
                    .iter()
                    .enumerate()
                    .map(|(i, (_, value))| (format!(":e{i}"), value.clone())),
            )
            .collect()
    }
}

/// Equality key condition, e.g. all clusters of one user through a `user_id` index
///
/// Renders to `#n0 = :k0 AND #n1 = :k1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    index_name: Option<String>,
    keys: Vec<(String, AttributeValue)>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query through a secondary index instead of the table's primary key
    pub fn index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Match records whose `field` equals `value`; repeating a field keeps the last value
    pub fn key_equals(mut self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        upsert(&mut self.keys, field.into(), value.into());
        self
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn keys(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.keys.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn matches(&self, record: &ProviderRecord) -> bool {
        self.keys.iter().all(|(field, value)| record.get(field) == Some(value))
    }

    pub fn key_condition_expression(&self) -> String {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, _)| format!("#n{i} = :k{i}"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub fn attribute_names(&self) -> Vec<(String, String)> {
        numbered_names(&distinct(self.keys.iter().map(|(f, _)| f)))
    }

    pub fn attribute_values(&self) -> Vec<(String, AttributeValue)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, (_, value))| (format!(":k{i}"), value.clone()))
            .collect()
    }
}
