//! Evaluation strategies: turn a metric into a severity and description.

use thiserror::Error;

use crate::probe::Metric;
use crate::range::ThresholdRange;
use crate::state::State;

/// The outcome of evaluating one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: State,
    pub description: String,
}

impl Evaluation {
    pub fn unknown(description: impl Into<String>) -> Self {
        Self {
            state: State::Unknown,
            description: description.into(),
        }
    }
}

/// An evaluation that could not produce a state.
///
/// The check catches this and records an UNKNOWN result; it never escapes
/// the process boundary.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unknown status code {value:?} for {metric}")]
    UnknownStatus { metric: String, value: Option<f64> },
}

/// How a metric value maps to a severity state.
///
/// One context may serve several metrics: all CPU sub-metrics share a
/// single `cpu` scalar context with the same thresholds.
#[derive(Debug, Clone, PartialEq)]
pub enum Context {
    /// Threshold evaluation: critical breach wins over warning breach; a
    /// metric without a value is UNKNOWN, never passed to the ranges.
    Scalar {
        warning: ThresholdRange,
        critical: ThresholdRange,
    },
    /// Discrete service status codes: 0 OK, 1 WARNING, 2 CRITICAL; any
    /// other value (or none) fails with [`EvalError::UnknownStatus`].
    Status,
}

impl Context {
    pub fn evaluate(&self, metric: &Metric) -> Result<Evaluation, EvalError> {
        match self {
            Context::Scalar { warning, critical } => Ok(evaluate_scalar(metric, warning, critical)),
            Context::Status => evaluate_status(metric),
        }
    }

    /// Perfdata sample for this metric, if the context produces one.
    pub fn perfdata(&self, metric: &Metric) -> Option<String> {
        match self {
            Context::Scalar { warning, critical } => {
                let value = metric.value?;
                Some(format!(
                    "{}={}{};{};{}",
                    metric.name,
                    value,
                    metric.unit.unwrap_or(""),
                    warning.spec(),
                    critical.spec()
                ))
            }
            Context::Status => None,
        }
    }
}

fn evaluate_scalar(
    metric: &Metric,
    warning: &ThresholdRange,
    critical: &ThresholdRange,
) -> Evaluation {
    let Some(value) = metric.value else {
        return Evaluation::unknown(format!("no data for {}", metric.name));
    };

    let state = if critical.breaches(value) {
        State::Critical
    } else if warning.breaches(value) {
        State::Warning
    } else {
        State::Ok
    };

    Evaluation {
        state,
        description: format!("{} is {}{}", metric.name, value, metric.unit.unwrap_or("")),
    }
}

fn evaluate_status(metric: &Metric) -> Result<Evaluation, EvalError> {
    let state = match metric.value {
        Some(v) if v == 0.0 => State::Ok,
        Some(v) if v == 1.0 => State::Warning,
        Some(v) if v == 2.0 => State::Critical,
        other => {
            return Err(EvalError::UnknownStatus {
                metric: metric.name.clone(),
                value: other,
            })
        }
    };

    Ok(Evaluation {
        state,
        description: format!("Service status {}", metric.name),
    })
}
