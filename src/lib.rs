//! # check-influxdb
//!
//! A Nagios-style monitoring plugin that queries InfluxDB 0.8 for recent
//! metric values, evaluates them against threshold ranges, and emits one
//! summary line plus perfdata with the matching exit code.
//!
//! ## Architecture
//!
//! ```text
//! CLI ──▶ Check ──▶ Probe ──▶ QuerySource (InfluxClient) ──▶ Metric(s)
//!           │                                                   │
//!           └──────────── Context.evaluate ◀────────────────────┘
//!                               │
//!                     worst-state-wins ──▶ report line + exit code
//! ```
//!
//! - **[`range`]**: threshold range grammar (`10:20`, `@5:95`, `~:10`, ...)
//!   and breach evaluation
//! - **[`client`]**: the InfluxDB 0.8 HTTP adapter behind the
//!   [`QuerySource`] seam
//! - **[`probe`]**: probe variants (raw query, memory, per-state CPU,
//!   aggregate CPU, service status) and their query templates
//! - **[`context`]**: evaluation strategies mapping metric values to
//!   severity states
//! - **[`check`]**: orchestration, worst-state aggregation, and report
//!   rendering
//!
//! ## Usage
//!
//! ```bash
//! check_influxdb -H influx.local -u nagios -p secret -d metrics \
//!     -w 80 -c 90 custom --metric cpu --node web1 --time-range 5m
//! ```

pub mod check;
pub mod client;
pub mod context;
pub mod probe;
pub mod range;
pub mod state;

// Re-export main types for convenience
pub use check::{Check, Report};
pub use client::{ClientError, InfluxClient, QuerySource, ServerVersion};
pub use context::{Context, EvalError, Evaluation};
pub use probe::{CpuState, Metric, Probe, TimeRange, TimeRangeError};
pub use range::{RangeParseError, ThresholdRange};
pub use state::State;
