//! Cluster records and their provider representation
//!
//! The key-value store keeps clusters as sparse, attribute-typed maps
//! (`{"vcpus": {"N": "2"}, "env_variables": {"SS": ["A=1"]}}`). This module
//! turns such a map into a [`ClusterRecord`] and back for the env field.

use crate::error::{CloudError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single typed attribute as stored by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Numbers travel as decimal text
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
}

impl AttributeValue {
    pub fn s(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    pub fn n(value: impl ToString) -> Self {
        AttributeValue::N(value.to_string())
    }

    /// Provider type tag, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Ss(_) => "SS",
        }
    }
}

/// Field name to typed value; absent fields are simply missing
pub type ProviderRecord = HashMap<String, AttributeValue>;

/// Lifecycle of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    Pending,
    Completed,
    Failed,
}

impl ClusterStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ClusterStatus> for AttributeValue {
    fn from(status: ClusterStatus) -> Self {
        AttributeValue::s(status.as_str())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Normalized view of a cluster record
///
/// Produced only by [`normalize`]; changes go through the store's
/// update-by-fields operation, never through this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub user_id: String,

    pub region: String,
    #[serde(rename = "type")]
    pub cluster_type: String,
    pub project: Option<String>,

    pub vcpus: u32,
    pub memory: u32,

    pub port: u16,
    pub has_ip: bool,
    pub endpoint: Option<String>,
    pub ip_address: Option<String>,
    pub subnetwork: Option<String>,

    pub status: ClusterStatus,
    /// ISO-8601 timestamp, kept as stored
    pub creation_date: String,

    pub username: Option<String>,
    pub password: Option<String>,

    pub env_variables: HashMap<String, String>,
    pub error_message: Option<String>,
}

impl ClusterRecord {
    /// Parse `creation_date`, accepting RFC 3339 or a naive timestamp taken as UTC
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.creation_date) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.creation_date, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Convert a provider record into a [`ClusterRecord`]
///
/// Fails with [`CloudError::MalformedRecord`] when a required field is
/// missing, carries the wrong attribute type, or holds a value outside the
/// target type.
pub fn normalize(raw: &ProviderRecord) -> Result<ClusterRecord> {
    let id = required_string(raw, "id")?;
    let status_raw = required_string(raw, "status")?;
    let status = ClusterStatus::parse(&status_raw)
        .ok_or_else(|| CloudError::malformed("status", format!("has unknown value '{status_raw}'")))?;

    let env_variables = match raw.get("env_variables") {
        None => HashMap::new(),
        Some(AttributeValue::Ss(entries)) => decode_env(entries)?,
        Some(other) => return Err(type_mismatch("env_variables", "SS", other)),
    };

    Ok(ClusterRecord {
        name: id.clone(),
        id,
        image_url: required_string(raw, "image_url")?,
        user_id: required_string(raw, "user_id")?,
        region: required_string(raw, "region")?,
        cluster_type: required_string(raw, "type")?,
        project: optional_string(raw, "gcp_project")?,
        vcpus: required_number(raw, "vcpus")?,
        memory: required_number(raw, "memory")?,
        port: required_number(raw, "port")?,
        has_ip: required_bool(raw, "has_ip")?,
        endpoint: optional_string(raw, "endpoint")?,
        ip_address: optional_string(raw, "ip_address")?,
        subnetwork: optional_string(raw, "subnetwork")?,
        status,
        creation_date: required_string(raw, "creation_date")?,
        username: optional_string(raw, "username")?,
        password: optional_string(raw, "password")?,
        env_variables,
        error_message: optional_string(raw, "error_message")?,
    })
}

/// Decode `KEY=VALUE` entries into a map, splitting on the first `=`
///
/// Entries without `=` are rejected. Later duplicates win.
pub fn decode_env<S: AsRef<str>>(entries: &[S]) -> Result<HashMap<String, String>> {
    let mut env = HashMap::with_capacity(entries.len());
    for entry in entries {
        let entry = entry.as_ref();
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            CloudError::malformed("env_variables", format!("entry '{entry}' has no '='"))
        })?;
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}

/// Encode a mapping as `KEY=VALUE` entries, in the mapping's iteration order
///
/// Keys must not contain `=` and neither keys nor values may contain a
/// newline; under that precondition `decode_env(&encode_env(m)) == m`.
pub fn encode_env<I, K, V>(env: I) -> Vec<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    env.into_iter()
        .map(|(key, value)| format!("{}={}", key.as_ref(), value.as_ref()))
        .collect()
}

fn type_mismatch(field: &str, expected: &str, found: &AttributeValue) -> CloudError {
    CloudError::malformed(
        field,
        format!("expected type {expected}, found {}", found.type_name()),
    )
}

fn required<'a>(raw: &'a ProviderRecord, field: &str) -> Result<&'a AttributeValue> {
    raw.get(field)
        .ok_or_else(|| CloudError::malformed(field, "is missing"))
}

fn required_string(raw: &ProviderRecord, field: &str) -> Result<String> {
    match required(raw, field)? {
        AttributeValue::S(s) => Ok(s.clone()),
        other => Err(type_mismatch(field, "S", other)),
    }
}

fn optional_string(raw: &ProviderRecord, field: &str) -> Result<Option<String>> {
    match raw.get(field) {
        None => Ok(None),
        Some(AttributeValue::S(s)) => Ok(Some(s.clone())),
        Some(other) => Err(type_mismatch(field, "S", other)),
    }
}

fn required_bool(raw: &ProviderRecord, field: &str) -> Result<bool> {
    match required(raw, field)? {
        AttributeValue::Bool(b) => Ok(*b),
        other => Err(type_mismatch(field, "BOOL", other)),
    }
}

fn required_number<T>(raw: &ProviderRecord, field: &str) -> Result<T>
where
    T: TryFrom<i64>,
{
    let text = match required(raw, field)? {
        AttributeValue::N(n) => n,
        other => return Err(type_mismatch(field, "N", other)),
    };
    let value: i64 = text
        .trim()
        .parse()
        .map_err(|_| CloudError::malformed(field, format!("'{text}' is not an integer")))?;
    T::try_from(value)
        .map_err(|_| CloudError::malformed(field, format!("{value} is out of range")))
}
