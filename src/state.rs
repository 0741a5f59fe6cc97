//! Severity states and worst-state aggregation.

/// Outcome severity of a check result, ordered for worst-state-wins
/// aggregation.
///
/// `Unknown` sorts above `Critical`: not being able to determine the state
/// is treated as the most severe reporting signal. Its exit code (3) is
/// also used for argument and startup errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl State {
    /// Process exit code expected by the monitoring host.
    pub fn exit_code(&self) -> i32 {
        match self {
            State::Ok => 0,
            State::Warning => 1,
            State::Critical => 2,
            State::Unknown => 3,
        }
    }

    /// Uppercase label used in the report line.
    pub fn label(&self) -> &'static str {
        match self {
            State::Ok => "OK",
            State::Warning => "WARNING",
            State::Critical => "CRITICAL",
            State::Unknown => "UNKNOWN",
        }
    }

    /// Worst state across an iterator, `Ok` when empty.
    pub fn worst(states: impl IntoIterator<Item = State>) -> State {
        states.into_iter().max().unwrap_or(State::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(State::Ok < State::Warning);
        assert!(State::Warning < State::Critical);
        assert!(State::Critical < State::Unknown);
    }

    #[test]
    fn test_worst_picks_most_severe() {
        let overall = State::worst([State::Ok, State::Warning, State::Ok]);
        assert_eq!(overall, State::Warning);
    }

    #[test]
    fn test_unknown_dominates_critical() {
        let overall = State::worst([State::Ok, State::Unknown, State::Critical]);
        assert_eq!(overall, State::Unknown);
    }

    #[test]
    fn test_worst_of_empty_is_ok() {
        assert_eq!(State::worst([]), State::Ok);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(State::Ok.exit_code(), 0);
        assert_eq!(State::Warning.exit_code(), 1);
        assert_eq!(State::Critical.exit_code(), 2);
        assert_eq!(State::Unknown.exit_code(), 3);
    }
}
