//! Probe variants: build the query for a metric kind and package results.
//!
//! Each variant of [`Probe`] knows how to construct its InfluxDB 0.8 query
//! and what metric name, unit, and context key its result is reported
//! under. Dispatch is a closed enum match decided at CLI parse time.

use std::fmt;

use thiserror::Error;

use crate::client::{ClientError, QuerySource};

/// A single measurement produced by a probe.
///
/// Immutable: created once per probe run and consumed exactly once by the
/// context named in `context`. A `None` value means the store had the
/// series but no recent points.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: Option<f64>,
    pub unit: Option<&'static str>,
    pub context: String,
}

/// A malformed time-window specification.
#[derive(Debug, Error, PartialEq)]
#[error("invalid time range '{0}' (expected digits followed by s, m, h or d)")]
pub struct TimeRangeError(pub String);

/// A validated query time window like `1s`, `15m`, `2h` or `3d`.
///
/// Validated before any query string is constructed, so a bad window is a
/// startup error rather than a confusing store-side failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange(String);

impl TimeRange {
    pub fn parse(s: &str) -> Result<Self, TimeRangeError> {
        let s = s.trim();
        let valid = s
            .strip_suffix(['s', 'm', 'h', 'd'])
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
        if !valid {
            return Err(TimeRangeError(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// CPU time buckets reported by collectd-style series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Idle,
    Wait,
    System,
    User,
}

impl CpuState {
    fn series_key(&self) -> &'static str {
        match self {
            CpuState::Idle => "idle",
            CpuState::Wait => "wait",
            CpuState::System => "system",
            CpuState::User => "user",
        }
    }

    fn metric_name(&self) -> &'static str {
        match self {
            CpuState::Idle => "cpu_idle",
            CpuState::Wait => "cpu_wait",
            CpuState::System => "cpu_system",
            CpuState::User => "cpu_user",
        }
    }
}

/// A strategy for producing one or more metrics from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// Run a user-supplied query verbatim; one metric named by the user,
    /// evaluated under a context of the same name.
    RawQuery { query: String, metric: String },
    /// Free-memory percentage for a node, computed server-side as
    /// `100 * free / (free + used)`.
    Memory { node: String, range: TimeRange },
    /// Mean of one CPU state across all CPUs of a node.
    Cpu {
        node: String,
        range: TimeRange,
        state: CpuState,
    },
    /// The user, system and wait CPU states in one run; all three metrics
    /// share the `cpu` context.
    CpuAggregate { node: String, range: TimeRange },
    /// Latest status code of a named service.
    ServiceStatus { service: String },
}

impl Probe {
    /// Query the source and package the results.
    ///
    /// Errors propagate to the check, which downgrades this probe's
    /// contribution to UNKNOWN.
    pub async fn probe(&self, source: &dyn QuerySource) -> Result<Vec<Metric>, ClientError> {
        match self {
            Probe::RawQuery { query, metric } => {
                let value = source.fetch_scalar(query).await?;
                Ok(vec![Metric {
                    name: metric.clone(),
                    value,
                    unit: None,
                    context: metric.clone(),
                }])
            }
            Probe::Memory { node, range } => {
                let value = source.fetch_scalar(&memory_query(node, range)).await?;
                Ok(vec![Metric {
                    name: "mem".to_string(),
                    value,
                    unit: Some("%"),
                    context: "memory".to_string(),
                }])
            }
            Probe::Cpu { node, range, state } => {
                Ok(vec![cpu_metric(source, node, range, *state).await?])
            }
            Probe::CpuAggregate { node, range } => {
                let mut metrics = Vec::with_capacity(3);
                for state in [CpuState::User, CpuState::System, CpuState::Wait] {
                    metrics.push(cpu_metric(source, node, range, state).await?);
                }
                Ok(metrics)
            }
            Probe::ServiceStatus { service } => {
                let value = source.fetch_scalar(&status_query(service)).await?;
                Ok(vec![Metric {
                    name: service.clone(),
                    value,
                    unit: None,
                    context: "status".to_string(),
                }])
            }
        }
    }
}

async fn cpu_metric(
    source: &dyn QuerySource,
    node: &str,
    range: &TimeRange,
    state: CpuState,
) -> Result<Metric, ClientError> {
    let value = source.fetch_scalar(&cpu_query(node, range, state)).await?;
    Ok(Metric {
        name: state.metric_name().to_string(),
        value,
        unit: Some("%"),
        context: "cpu".to_string(),
    })
}

fn memory_query(node: &str, range: &TimeRange) -> String {
    format!(
        "select last(100.0*free.value/(used.value + free.value)) \
         from \"{node}.memory.free\" as free \
         inner join \"{node}.memory.used\" as used \
         where time > now() - {range} group by time({range}) order asc"
    )
}

fn cpu_query(node: &str, range: &TimeRange, state: CpuState) -> String {
    let state = state.series_key();
    format!(
        "select mean(value) from merge(/{node}.cpu.\\d+.{state}$/) \
         where time > now() - {range} group by time({range})"
    )
}

fn status_query(service: &str) -> String {
    format!(
        "select last(value) from /openstack.{service}.status/ \
         where time > now() - 30s group by time(15s) order asc"
    )
}
