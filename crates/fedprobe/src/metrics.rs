//! Metric names, values and the per-round result records.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

/// A reported metric. Each one is owned by exactly one check.
///
/// Declaration order is column order in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    SyncConnection,
    CreatedRooms,
    CreatedUsers,
    EmbedAccessible,
    CorsHeaders,
    HydraAlive,
    Oauth,
    Ssh,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::SyncConnection,
        Metric::CreatedRooms,
        Metric::CreatedUsers,
        Metric::EmbedAccessible,
        Metric::CorsHeaders,
        Metric::HydraAlive,
        Metric::Oauth,
        Metric::Ssh,
    ];

    /// Column name used in reports
    pub fn name(&self) -> &'static str {
        match self {
            Metric::SyncConnection => "syncConnection",
            Metric::CreatedRooms => "createdRooms",
            Metric::CreatedUsers => "createdUsers",
            Metric::EmbedAccessible => "embedAccessible",
            Metric::CorsHeaders => "corsHeaders",
            Metric::HydraAlive => "hydraAlive",
            Metric::Oauth => "oauth",
            Metric::Ssh => "ssh",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    Bool(bool),
    Count(u64),
    Text(String),
    /// The probed feature is intentionally switched off
    Disabled,
    /// The check ran and could not evaluate the metric
    Failed,
    /// The check never produced a value
    NotAvailable,
}

impl MetricValue {
    pub fn is_failed(&self) -> bool {
        matches!(self, MetricValue::Failed)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Bool(value) => write!(f, "{value}"),
            MetricValue::Count(value) => write!(f, "{value}"),
            MetricValue::Text(value) => f.write_str(value),
            MetricValue::Disabled => f.write_str("DISABLED"),
            MetricValue::Failed => f.write_str("FAILED"),
            MetricValue::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Bool(value) => serializer.serialize_bool(*value),
            MetricValue::Count(value) => serializer.serialize_u64(*value),
            other => serializer.collect_str(other),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Count(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// Metrics reported by a single check invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialResult {
    values: BTreeMap<Metric, MetricValue>,
}

impl PartialResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`PartialResult::set`]
    pub fn with(mut self, metric: Metric, value: impl Into<MetricValue>) -> Self {
        self.set(metric, value);
        self
    }

    pub fn set(&mut self, metric: Metric, value: impl Into<MetricValue>) {
        self.values.insert(metric, value.into());
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.values.get(&metric)
    }

}

impl IntoIterator for PartialResult {
    type Item = (Metric, MetricValue);
    type IntoIter = std::collections::btree_map::IntoIter<Metric, MetricValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// All metrics of one instance for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceResult {
    #[serde(skip)]
    key: String,
    #[serde(flatten)]
    values: BTreeMap<Metric, MetricValue>,
}

impl InstanceResult {
    /// Record with every metric set to `N/A`
    pub fn pending(key: impl Into<String>, metrics: &[Metric]) -> Self {
        let values = metrics.iter().map(|metric| (*metric, MetricValue::NotAvailable)).collect();
        Self { key: key.into(), values }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.values.get(&metric)
    }

    /// Key-wise overwrite with the values of `partial`
    pub fn merge(&mut self, partial: PartialResult) {
        self.values.extend(partial);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &MetricValue)> {
        self.values.iter().map(|(metric, value)| (*metric, value))
    }
}

/// A completed probing round.
#[derive(Debug, Clone)]
pub struct Round {
    /// Local time the round was started
    pub started_at: DateTime<Local>,
    /// Wall-clock duration of the round
    pub elapsed: Duration,
    /// Metric columns, in report order
    pub metrics: Vec<Metric>,
    /// One record per probed instance, in configuration order
    pub instances: Vec<InstanceResult>,
}

impl Round {
    pub fn get(&self, key: &str) -> Option<&InstanceResult> {
        self.instances.iter().find(|result| result.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.instances.iter().map(|result| result.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
