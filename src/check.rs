//! Check orchestration: run probes, evaluate metrics, render the report.

use std::collections::BTreeMap;

use tracing::warn;

use crate::client::QuerySource;
use crate::context::{Context, Evaluation};
use crate::probe::Probe;
use crate::state::State;

/// One check invocation: an ordered set of probes plus the contexts that
/// evaluate their metrics, keyed by context name.
///
/// Built once from the CLI, run once, then discarded.
#[derive(Debug)]
pub struct Check {
    probes: Vec<Probe>,
    contexts: BTreeMap<String, Context>,
}

impl Check {
    pub fn new(probe: Probe) -> Self {
        Self {
            probes: vec![probe],
            contexts: BTreeMap::new(),
        }
    }

    pub fn add_probe(&mut self, probe: Probe) {
        self.probes.push(probe);
    }

    pub fn add_context(&mut self, name: impl Into<String>, context: Context) {
        self.contexts.insert(name.into(), context);
    }

    /// Run every probe in registration order and evaluate the results.
    ///
    /// A failing probe records an UNKNOWN result and the run continues to
    /// the next probe; nothing short-circuits and nothing is silently
    /// swallowed into OK.
    pub async fn run(&self, source: &dyn QuerySource) -> Report {
        let mut results = Vec::new();
        let mut perfdata = Vec::new();

        for probe in &self.probes {
            let metrics = match probe.probe(source).await {
                Ok(metrics) => metrics,
                Err(err) => {
                    warn!("probe failed: {err}");
                    results.push(Evaluation::unknown(err.to_string()));
                    continue;
                }
            };

            for metric in metrics {
                let Some(context) = self.contexts.get(&metric.context) else {
                    results.push(Evaluation::unknown(format!(
                        "no context registered for '{}'",
                        metric.context
                    )));
                    continue;
                };

                match context.evaluate(&metric) {
                    Ok(eval) => {
                        if let Some(sample) = context.perfdata(&metric) {
                            perfdata.push(sample);
                        }
                        results.push(eval);
                    }
                    Err(err) => {
                        warn!("evaluation failed: {err}");
                        results.push(Evaluation::unknown(err.to_string()));
                    }
                }
            }
        }

        let state = State::worst(results.iter().map(|r| r.state));
        Report {
            state,
            results,
            perfdata,
        }
    }
}

/// The final result of a check run.
#[derive(Debug)]
pub struct Report {
    pub state: State,
    results: Vec<Evaluation>,
    perfdata: Vec<String>,
}

impl Report {
    /// A whole-run UNKNOWN, used when nothing was evaluated (timeout).
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            state: State::Unknown,
            results: vec![Evaluation::unknown(message)],
            perfdata: Vec::new(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }

    /// The single summary line the monitoring host consumes:
    /// `<STATE> - <descriptions> | <perfdata>`.
    pub fn render(&self) -> String {
        let descriptions: Vec<&str> = self.results.iter().map(|r| r.description.as_str()).collect();
        let summary = format!("{} - {}", self.state.label(), descriptions.join(", "));
        if self.perfdata.is_empty() {
            summary
        } else {
            format!("{} | {}", summary, self.perfdata.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::probe::{CpuState, TimeRange};
    use crate::range::ThresholdRange;
    use async_trait::async_trait;

    /// Stub source answering each query with the next canned result.
    #[derive(Debug)]
    struct StubSource {
        replies: std::sync::Mutex<Vec<Result<Option<f64>, ClientError>>>,
    }

    impl StubSource {
        fn new(replies: Vec<Result<Option<f64>, ClientError>>) -> Self {
            Self {
                replies: std::sync::Mutex::new(replies),
            }
        }

        fn value(value: f64) -> Self {
            Self::new(vec![Ok(Some(value))])
        }
    }

    #[async_trait]
    impl QuerySource for StubSource {
        async fn fetch_scalar(&self, _query: &str) -> Result<Option<f64>, ClientError> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok(None)
            } else {
                replies.remove(0)
            }
        }
    }

    fn scalar(warning: &str, critical: &str) -> Context {
        Context::Scalar {
            warning: ThresholdRange::parse(warning).unwrap(),
            critical: ThresholdRange::parse(critical).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_raw_query_without_thresholds_is_ok() {
        let mut check = Check::new(Probe::RawQuery {
            query: "select max(value) from series".to_string(),
            metric: "default".to_string(),
        });
        check.add_context("default", scalar("", ""));

        let report = check.run(&StubSource::value(42.0)).await;
        assert_eq!(report.state, State::Ok);
        assert_eq!(report.exit_code(), 0);

        let line = report.render();
        assert!(line.starts_with("OK - "));
        assert!(line.contains("default"));
        assert!(line.contains("42"));
        assert!(line.contains("default=42;;"));
    }

    #[tokio::test]
    async fn test_low_memory_ratio_is_critical() {
        // Low free-memory is alerted with lower-bound ranges: breach when
        // the ratio drops below the bound.
        let mut check = Check::new(Probe::Memory {
            node: "node1".to_string(),
            range: TimeRange::parse("1m").unwrap(),
        });
        check.add_context("memory", scalar("10:", "5:"));

        let report = check.run(&StubSource::value(4.0)).await;
        assert_eq!(report.state, State::Critical);
        assert_eq!(report.exit_code(), 2);
        assert!(report.render().contains("mem is 4%"));
    }

    #[tokio::test]
    async fn test_cpu_aggregate_worst_state_wins() {
        let mut check = Check::new(Probe::CpuAggregate {
            node: "node1".to_string(),
            range: TimeRange::parse("1m").unwrap(),
        });
        check.add_context("cpu", scalar("50", "90"));

        // user, system, wait
        let source = StubSource::new(vec![Ok(Some(30.0)), Ok(Some(60.0)), Ok(Some(5.0))]);
        let report = check.run(&source).await;
        assert_eq!(report.state, State::Warning);

        let line = report.render();
        assert!(line.contains("cpu_user is 30"));
        assert!(line.contains("cpu_system is 60"));
        assert!(line.contains("cpu_wait is 5"));
        assert!(line.contains(" | "));
    }

    #[tokio::test]
    async fn test_probe_failure_downgrades_to_unknown() {
        let mut check = Check::new(Probe::RawQuery {
            query: "select 1".to_string(),
            metric: "default".to_string(),
        });
        check.add_context("default", scalar("", ""));

        let source = StubSource::new(vec![Err(ClientError::EmptyResult {
            query: "select 1".to_string(),
        })]);
        let report = check.run(&source).await;
        assert_eq!(report.state, State::Unknown);
        assert_eq!(report.exit_code(), 3);
        assert!(report.render().contains("empty response"));
    }

    #[tokio::test]
    async fn test_unknown_status_code_is_caught() {
        let mut check = Check::new(Probe::ServiceStatus {
            service: "nova".to_string(),
        });
        check.add_context("status", Context::Status);

        let report = check.run(&StubSource::value(3.0)).await;
        assert_eq!(report.state, State::Unknown);
        assert!(report.render().contains("nova"));
    }

    #[tokio::test]
    async fn test_service_status_ok() {
        let mut check = Check::new(Probe::ServiceStatus {
            service: "nova".to_string(),
        });
        check.add_context("status", Context::Status);

        let report = check.run(&StubSource::value(0.0)).await;
        assert_eq!(report.state, State::Ok);
        assert_eq!(report.render(), "OK - Service status nova");
    }

    #[tokio::test]
    async fn test_unknown_overrides_critical_across_probes() {
        let mut check = Check::new(Probe::RawQuery {
            query: "q1".to_string(),
            metric: "a".to_string(),
        });
        check.add_probe(Probe::RawQuery {
            query: "q2".to_string(),
            metric: "b".to_string(),
        });
        check.add_context("a", scalar("", "0:1"));
        check.add_context("b", scalar("", ""));

        // First metric breaches critical, second probe fails.
        let source = StubSource::new(vec![
            Ok(Some(9.0)),
            Err(ClientError::Connection("refused".to_string())),
        ]);
        let report = check.run(&source).await;
        assert_eq!(report.state, State::Unknown);
    }

    #[tokio::test]
    async fn test_missing_context_is_unknown_not_panic() {
        let check = Check::new(Probe::RawQuery {
            query: "q".to_string(),
            metric: "orphan".to_string(),
        });

        let report = check.run(&StubSource::value(1.0)).await;
        assert_eq!(report.state, State::Unknown);
        assert!(report.render().contains("no context registered for 'orphan'"));
    }

    #[test]
    fn test_timeout_report() {
        let report = Report::unknown("timed out after 10s");
        assert_eq!(report.state, State::Unknown);
        assert_eq!(report.exit_code(), 3);
        assert_eq!(report.render(), "UNKNOWN - timed out after 10s");
    }
}
