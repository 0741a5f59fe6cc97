//! Threshold range grammar and breach evaluation.
//!
//! Ranges follow the standard monitoring-plugin syntax: `start:end` where
//! either side may be empty, `~` for negative infinity, and a leading `@`
//! to alert when the value falls *inside* the range instead of outside it.
//! A bare number `N` is shorthand for `0:N` (breach when value < 0 or
//! value > N), matching the de-facto monitoring-plugins convention.

use thiserror::Error;

/// A malformed threshold range specification.
#[derive(Debug, Error, PartialEq)]
#[error("invalid threshold range '{spec}': {reason}")]
pub struct RangeParseError {
    pub spec: String,
    pub reason: String,
}

/// A parsed monitoring threshold range.
///
/// An empty spec means no threshold is configured: it never breaches.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRange {
    start: f64,
    end: f64,
    inside: bool,
    spec: String,
}

impl ThresholdRange {
    /// Parse a range spec string.
    ///
    /// Fails on non-numeric bounds and on `start > end`; the offending
    /// spec is named in the error so the user can fix the flag.
    pub fn parse(spec: &str) -> Result<Self, RangeParseError> {
        let spec = spec.trim();
        let (inside, body) = match spec.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (start, end) = if body.is_empty() {
            (f64::NEG_INFINITY, f64::INFINITY)
        } else if let Some((start_s, end_s)) = body.split_once(':') {
            (parse_bound(spec, start_s, f64::NEG_INFINITY)?, parse_bound(spec, end_s, f64::INFINITY)?)
        } else {
            // Bare number N is 0:N
            (0.0, parse_bound(spec, body, f64::INFINITY)?)
        };

        if start > end {
            return Err(RangeParseError {
                spec: spec.to_string(),
                reason: format!("start {} is greater than end {}", start, end),
            });
        }

        Ok(Self {
            start,
            end,
            inside,
            spec: spec.to_string(),
        })
    }

    /// True when `value` is in alert territory.
    ///
    /// Non-inverted ranges breach when the value falls outside
    /// `[start, end]`; `@`-prefixed ranges breach when it falls inside.
    pub fn breaches(&self, value: f64) -> bool {
        let outside = value < self.start || value > self.end;
        if self.inside {
            !outside
        } else {
            outside
        }
    }

    /// The original spec text, as it appears in perfdata fields.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Whether a threshold was actually configured.
    pub fn is_set(&self) -> bool {
        !self.spec.is_empty()
    }
}

fn parse_bound(spec: &str, s: &str, empty_default: f64) -> Result<f64, RangeParseError> {
    if s.is_empty() {
        return Ok(empty_default);
    }
    if s == "~" {
        return Ok(f64::NEG_INFINITY);
    }
    s.parse().map_err(|_| RangeParseError {
        spec: spec.to_string(),
        reason: format!("'{}' is not a number", s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_range_breaches_outside() {
        let range = ThresholdRange::parse("10:20").unwrap();
        assert!(range.breaches(9.9));
        assert!(range.breaches(20.1));
        assert!(!range.breaches(10.0));
        assert!(!range.breaches(15.0));
        assert!(!range.breaches(20.0));
    }

    #[test]
    fn test_inverted_range_breaches_inside() {
        let range = ThresholdRange::parse("@10:20").unwrap();
        assert!(range.breaches(10.0));
        assert!(range.breaches(15.0));
        assert!(range.breaches(20.0));
        assert!(!range.breaches(9.9));
        assert!(!range.breaches(20.1));
    }

    #[test]
    fn test_empty_spec_never_breaches() {
        let range = ThresholdRange::parse("").unwrap();
        assert!(!range.breaches(f64::MIN));
        assert!(!range.breaches(0.0));
        assert!(!range.breaches(f64::MAX));
        assert!(!range.is_set());
    }

    #[test]
    fn test_bare_number_means_zero_to_n() {
        let range = ThresholdRange::parse("10").unwrap();
        assert!(range.breaches(-0.1));
        assert!(range.breaches(10.1));
        assert!(!range.breaches(0.0));
        assert!(!range.breaches(5.0));
        assert!(!range.breaches(10.0));
    }

    #[test]
    fn test_open_ended_ranges() {
        let lower_only = ThresholdRange::parse("10:").unwrap();
        assert!(lower_only.breaches(9.0));
        assert!(!lower_only.breaches(10.0));
        assert!(!lower_only.breaches(1e12));

        let upper_only = ThresholdRange::parse("~:10").unwrap();
        assert!(!upper_only.breaches(-1e12));
        assert!(!upper_only.breaches(10.0));
        assert!(upper_only.breaches(10.5));

        let unbounded = ThresholdRange::parse(":").unwrap();
        assert!(!unbounded.breaches(-1e12));
        assert!(!unbounded.breaches(1e12));
    }

    #[test]
    fn test_malformed_specs_fail() {
        let err = ThresholdRange::parse("abc").unwrap_err();
        assert!(err.to_string().contains("abc"));

        let err = ThresholdRange::parse("10:x").unwrap_err();
        assert!(err.to_string().contains("10:x"));

        let err = ThresholdRange::parse("20:10").unwrap_err();
        assert!(err.to_string().contains("greater than"));
    }

    #[test]
    fn test_spec_round_trips() {
        let range = ThresholdRange::parse("@5:95").unwrap();
        assert_eq!(range.spec(), "@5:95");
        assert!(range.is_set());
    }
}
